//! Streaming export: paginator → producer → bounded channel → writer.
//!
//! Exactly two tasks run per export. The producer runs on the caller's
//! task, fetching pages strictly in sequence and sending serialized records
//! into a bounded channel. The writer runs on a blocking thread and owns
//! the destination. The producer owns the only sender; dropping it when
//! production ends is what closes the channel, so nothing can be sent after
//! close and the writer always sees end-of-stream.

use std::io;
use std::time::Duration;

use indicatif::ProgressBar;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, Sender};
use tokio_util::sync::CancellationToken;

use crate::error::ExportError;
use crate::paginate::{PageSource, Paginator, Record};
use crate::sink::{DurableWrite, RecordWriter};
use crate::stats::{DEFAULT_REPORT_EVERY, ExportStats};

/// Default bound of the producer → writer channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Tuning for one streaming export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Payloads buffered between producer and writer (minimum 1)
    pub channel_capacity: usize,
    /// Records between throughput samples
    pub report_every: u64,
    pub projection: Option<Projection>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            report_every: DEFAULT_REPORT_EVERY,
            projection: None,
        }
    }
}

/// Keeps only selected fields of each record.
///
/// Fields are JSON pointers (`/attributes/name`) or dotted paths
/// (`attributes.name`). The output is a flat object keyed by the dotted
/// path; fields missing from a record are left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<(String, String)>,
}

impl Projection {
    pub fn new<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let fields = fields
            .into_iter()
            .filter(|f| !f.as_ref().is_empty())
            .map(|f| {
                let f = f.as_ref();
                let pointer = if f.starts_with('/') {
                    f.to_string()
                } else {
                    format!("/{}", f.replace('.', "/"))
                };
                let key = pointer[1..]
                    .split('/')
                    .map(|token| token.replace("~1", "/").replace("~0", "~"))
                    .collect::<Vec<_>>()
                    .join(".");
                (key, pointer)
            })
            .collect();
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn apply(&self, record: &Record) -> Record {
        let mut out = Map::with_capacity(self.fields.len());
        for (key, pointer) in &self.fields {
            if let Some(v) = record.pointer(pointer) {
                out.insert(key.clone(), v.clone());
            }
        }
        Value::Object(out)
    }
}

/// Outcome of a streaming export that was not aborted by a fatal error
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub records_sent: u64,
    pub records_written: u64,
    pub pages: u64,
    pub failed_pages: u64,
    /// Stopped early by the cancellation token
    pub cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProduceEnd {
    Exhausted,
    Cancelled,
    /// The receiver was dropped, i.e. the writer failed
    WriterGone,
}

struct ProduceOutcome {
    end: ProduceEnd,
    pages: u64,
    failed_pages: u64,
}

/// Pull every page and push each record into the channel.
///
/// Takes the sender by value; it is dropped on return, closing the channel.
async fn produce<S: PageSource>(
    mut paginator: Paginator<S>,
    tx: Sender<Vec<u8>>,
    stats: &mut ExportStats,
    projection: Option<&Projection>,
    cancel: &CancellationToken,
    pb: &ProgressBar,
) -> ProduceOutcome {
    let name = paginator.source().name().to_string();

    let end = 'pages: loop {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ProduceEnd::Cancelled,
            page = paginator.next_page() => page,
        };
        let Some(page) = page else {
            break ProduceEnd::Exhausted;
        };
        if let Some(err) = &page.error {
            log::warn!("{name}: page {} failed, skipping: {err}", paginator.pages());
        }

        for record in page.records {
            let record = match projection {
                Some(p) => p.apply(&record),
                None => record,
            };
            let payload = match serde_json::to_vec(&record) {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!("{name}: cannot serialize record, skipping: {e}");
                    continue;
                }
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'pages ProduceEnd::Cancelled,
                sent = tx.send(payload) => {
                    if sent.is_err() {
                        break 'pages ProduceEnd::WriterGone;
                    }
                }
            }
            pb.inc(1);
            if let Some(sample) = stats.record() {
                log::info!("{name}: {sample}");
                pb.set_message(format!("{:.0} records/s", sample.per_second()));
            }
        }
    };
    drop(tx);

    ProduceOutcome {
        end,
        pages: paginator.pages(),
        failed_pages: paginator.failed_pages(),
    }
}

/// Run one streaming export from `source` into `out`.
///
/// Per-page remote errors are logged and skipped. A writer failure aborts
/// the export with [`ExportError::Sink`]; bytes already written stay in the
/// destination. Cancellation is not an error: the summary reports it.
pub async fn run_export<S, W>(
    source: S,
    out: W,
    options: &ExportOptions,
    cancel: &CancellationToken,
    pb: &ProgressBar,
) -> Result<ExportSummary, ExportError>
where
    S: PageSource,
    W: DurableWrite + Send + 'static,
{
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let writer = tokio::task::spawn_blocking(move || RecordWriter::new(out).drain(rx));

    let mut stats = ExportStats::new(options.report_every);
    let projection = options.projection.as_ref().filter(|p| !p.is_empty());
    let outcome = produce(
        Paginator::new(source),
        tx,
        &mut stats,
        projection,
        cancel,
        pb,
    )
    .await;

    let written = match writer.await {
        Ok(result) => result,
        Err(e) => Err(ExportError::Sink(io::Error::other(format!(
            "writer task failed: {e}"
        )))),
    };
    // cleared on failure too
    pb.finish_and_clear();
    let written = written?;
    if outcome.end == ProduceEnd::WriterGone {
        return Err(ExportError::Sink(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "writer stopped before end of stream",
        )));
    }

    let summary = ExportSummary {
        records_sent: stats.records_processed(),
        records_written: written,
        pages: outcome.pages,
        failed_pages: outcome.failed_pages,
        cancelled: outcome.end == ProduceEnd::Cancelled,
        elapsed: stats.elapsed(),
    };
    log::info!(
        "export finished: {} records from {} pages ({} failed){}",
        summary.records_written,
        summary.pages,
        summary.failed_pages,
        if summary.cancelled { ", cancelled" } else { "" }
    );
    Ok(summary)
}
