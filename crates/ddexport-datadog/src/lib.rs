//! Datadog API adapters for ddexport
//!
//! Each listing endpoint is exposed as a [`ddexport_core::PageSource`] and
//! the timeseries query endpoint as a [`ddexport_core::SeriesSource`].

pub mod client;
pub mod containers;
pub mod hosts;
pub mod metrics;

pub use client::{
    API_KEY_VAR, APP_KEY_VAR, Credentials, DEFAULT_SITE, DatadogClient, SITE_VAR, site_base_url,
};
pub use containers::{
    CONTAINERS_PATH, ContainerSource, DEFAULT_GROUPING_KEY, DEFAULT_PAGE_SIZE, Grouping,
    MAX_PAGE_SIZE, parse_containers_page,
};
pub use hosts::{HOSTS_PATH, HostSource, MAX_HOSTS_PER_PAGE, parse_hosts_page};
pub use metrics::{DEFAULT_METRICS_QUERY, MetricsApi, QUERY_PATH, parse_query_response};
