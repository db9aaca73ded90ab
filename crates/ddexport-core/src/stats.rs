//! Record counter and throughput sampling for streaming exports

use std::fmt;
use std::time::{Duration, Instant};

use crate::progress::fmt_num;

/// Default sampling interval (records between throughput samples)
pub const DEFAULT_REPORT_EVERY: u64 = 10_000;

/// One throughput sample: records since start and the time it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub records: u64,
    pub elapsed: Duration,
}

impl Throughput {
    pub fn per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} records at {:.2} records/second",
            fmt_num(self.records),
            self.per_second()
        )
    }
}

/// Counters for one export run.
///
/// Owned and mutated by the producer alone; nothing else holds a reference
/// while the export runs.
#[derive(Debug)]
pub struct ExportStats {
    records_processed: u64,
    start: Instant,
    report_every: u64,
}

impl ExportStats {
    /// Start counting now. An interval of 0 is treated as 1.
    pub fn new(report_every: u64) -> Self {
        Self {
            records_processed: 0,
            start: Instant::now(),
            report_every: report_every.max(1),
        }
    }

    /// Count one record; returns a sample every `report_every` records.
    pub fn record(&mut self) -> Option<Throughput> {
        self.records_processed += 1;
        if self.records_processed % self.report_every == 0 {
            Some(self.throughput())
        } else {
            None
        }
    }

    pub fn throughput(&self) -> Throughput {
        Throughput {
            records: self.records_processed,
            elapsed: self.start.elapsed(),
        }
    }

    pub fn records_processed(&self) -> u64 {
        self.records_processed
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for ExportStats {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_EVERY)
    }
}
