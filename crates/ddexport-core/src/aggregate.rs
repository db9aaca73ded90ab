//! Batch aggregation: one bounded query, grouped sum by scope, sorted CSV.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;

use crate::error::{ExportError, TransportError};
use crate::sink::DurableWrite;
use crate::timerange::TimeRange;

/// CSV columns for aggregated metric output, in row order
pub const METRIC_COLUMNS: &[&str] = &["scope", "timestamp", "value"];

/// One raw `[timestamp, value]` sample as the remote returns it; either may be null
pub type RawPoint = Vec<Option<f64>>;

/// One named series from a bounded metrics query
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub scope: String,
    pub points: Vec<RawPoint>,
}

/// Remote metrics query: `query(from, to, query) -> series`.
pub trait SeriesSource {
    fn query(
        &self,
        range: TimeRange,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Series>, TransportError>> + Send;
}

/// Accumulated sample for one scope
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub scope: String,
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy)]
struct Accumulated {
    timestamp: f64,
    value: f64,
}

/// Grouped sum keyed by scope.
///
/// The first point seen for a scope fixes its timestamp; later points only
/// add to the value.
#[derive(Debug, Default)]
pub struct Aggregator {
    sums: BTreeMap<String, Accumulated>,
    skipped: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, scope: &str, timestamp: f64, value: f64) {
        match self.sums.get_mut(scope) {
            Some(acc) => acc.value += value,
            None => {
                self.sums
                    .insert(scope.to_string(), Accumulated { timestamp, value });
            }
        }
    }

    /// Add every usable point of a series. Points missing a timestamp or
    /// value are skipped and counted.
    pub fn add_series(&mut self, series: &Series) {
        for point in &series.points {
            match point.as_slice() {
                [Some(ts), Some(value), ..] => self.add(&series.scope, *ts, *value),
                _ => self.skipped += 1,
            }
        }
    }

    /// Number of distinct scopes
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Points dropped for missing fields
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Accumulated points in ascending scope order.
    pub fn into_points(self) -> Vec<MetricPoint> {
        self.sums
            .into_iter()
            .map(|(scope, acc)| MetricPoint {
                scope,
                timestamp: acc.timestamp,
                value: acc.value,
            })
            .collect()
    }
}

/// Write the header and one `scope,timestamp,value` row per point, then sync.
///
/// Fields are not quoted; a scope containing a comma yields a malformed row.
pub fn write_csv<W: DurableWrite>(out: &mut W, points: &[MetricPoint]) -> io::Result<()> {
    writeln!(out, "{}", METRIC_COLUMNS.join(","))?;
    for p in points {
        writeln!(out, "{},{:.6},{:.6}", p.scope, p.timestamp, p.value)?;
    }
    out.flush()?;
    out.sync()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationSummary {
    pub series: usize,
    pub scopes: usize,
    pub skipped_points: u64,
}

/// Fetch one bounded response, reduce it, and write sorted CSV to `out`.
///
/// A failed query fails the whole run; there is nothing smaller to skip.
pub async fn run_aggregation<S, W>(
    source: &S,
    range: TimeRange,
    query: &str,
    out: &mut W,
) -> Result<AggregationSummary, ExportError>
where
    S: SeriesSource,
    W: DurableWrite,
{
    log::info!("querying {query} from {} to {}", range.from, range.to);
    let series = source.query(range, query).await?;

    let mut agg = Aggregator::new();
    for s in &series {
        agg.add_series(s);
    }
    let summary = AggregationSummary {
        series: series.len(),
        scopes: agg.len(),
        skipped_points: agg.skipped(),
    };
    if summary.skipped_points > 0 {
        log::debug!("skipped {} points with null values", summary.skipped_points);
    }

    write_csv(out, &agg.into_points()).map_err(ExportError::Sink)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(scope: &str, points: &[(Option<f64>, Option<f64>)]) -> Series {
        Series {
            scope: scope.to_string(),
            points: points.iter().map(|(t, v)| vec![*t, *v]).collect(),
        }
    }

    #[test]
    fn sums_and_keeps_first_timestamp() {
        let mut agg = Aggregator::new();
        agg.add_series(&series(
            "project_id:b",
            &[(Some(200.0), Some(1.5)), (Some(100.0), Some(2.5))],
        ));
        let points = agg.into_points();
        assert_eq!(
            points,
            vec![MetricPoint {
                scope: "project_id:b".to_string(),
                timestamp: 200.0,
                value: 4.0,
            }]
        );
    }

    #[test]
    fn scopes_sorted_ascending() {
        let mut agg = Aggregator::new();
        agg.add("zeta", 1.0, 1.0);
        agg.add("alpha", 2.0, 1.0);
        agg.add("Mid", 3.0, 1.0);
        let scopes: Vec<_> = agg.into_points().into_iter().map(|p| p.scope).collect();
        assert_eq!(scopes, vec!["Mid", "alpha", "zeta"]);
    }

    #[test]
    fn null_values_skipped() {
        let mut agg = Aggregator::new();
        agg.add_series(&series(
            "s",
            &[(Some(1.0), None), (None, Some(3.0)), (Some(2.0), Some(5.0))],
        ));
        agg.add_series(&Series {
            scope: "s".to_string(),
            points: vec![vec![], vec![Some(9.0)]],
        });
        assert_eq!(agg.skipped(), 4);
        let points = agg.into_points();
        assert_eq!(points[0].timestamp, 2.0);
        assert_eq!(points[0].value, 5.0);
    }

    #[test]
    fn same_scope_across_series_merges() {
        let mut agg = Aggregator::new();
        agg.add_series(&series("x", &[(Some(10.0), Some(1.0))]));
        agg.add_series(&series("x", &[(Some(5.0), Some(2.0))]));
        assert_eq!(agg.len(), 1);
        let points = agg.into_points();
        let p = &points[0];
        assert_eq!((p.timestamp, p.value), (10.0, 3.0));
    }

    #[test]
    fn csv_format() {
        let mut out = Vec::new();
        write_csv(
            &mut out,
            &[MetricPoint {
                scope: "project_id:a".to_string(),
                timestamp: 1_700_000_000_000.0,
                value: 0.5,
            }],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "scope,timestamp,value\nproject_id:a,1700000000000.000000,0.500000\n"
        );
    }

    #[test]
    fn csv_empty_is_header_only() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();
        assert_eq!(out, b"scope,timestamp,value\n");
    }
}
