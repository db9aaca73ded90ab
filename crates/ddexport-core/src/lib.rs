//! ddexport core - streaming export pipeline primitives
//!
//! Pulls paginated records from a remote API and persists them to a local
//! file or stdout through a bounded producer/writer handoff, and reduces
//! bounded metric queries into sorted CSV.

pub mod aggregate;
pub mod error;
pub mod http;
pub mod logging;
pub mod paginate;
pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod stats;
pub mod timerange;

// Re-exports for convenience
pub use aggregate::{
    AggregationSummary, Aggregator, METRIC_COLUMNS, MetricPoint, RawPoint, Series, SeriesSource,
    run_aggregation, write_csv,
};
pub use error::{ExportError, ParseError, TransportError};
pub use http::{HttpConfig, SHARED_RUNTIME, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use paginate::{Cursor, Page, PageSource, Paginator, Record};
pub use pipeline::{ExportOptions, ExportSummary, Projection, run_export};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use sink::{Destination, DurableWrite, RecordWriter};
pub use stats::{ExportStats, Throughput};
pub use timerange::TimeRange;
