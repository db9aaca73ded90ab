//! End-to-end tests of the streaming export pipeline against scripted sources

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ddexport_core::{
    Cursor, Destination, DurableWrite, ExportError, ExportOptions, Page, PageSource, Projection,
    TransportError, run_export,
};
use indicatif::ProgressBar;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

enum Scripted {
    Records(Vec<Value>),
    Error,
}

/// Serves a fixed list of pages; cursor "i" addresses page i.
struct ScriptedSource {
    pages: Vec<Scripted>,
    /// Records handed to the producer so far
    emitted: Arc<AtomicU64>,
}

impl ScriptedSource {
    fn new(pages: Vec<Scripted>) -> Self {
        Self {
            pages,
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Pages of sequentially numbered records
    fn numbered(page_sizes: &[usize]) -> Self {
        let mut id = 0u64;
        let pages = page_sizes
            .iter()
            .map(|&n| {
                Scripted::Records(
                    (0..n)
                        .map(|_| {
                            id += 1;
                            json!({ "id": id - 1, "type": "container" })
                        })
                        .collect(),
                )
            })
            .collect();
        Self::new(pages)
    }
}

impl PageSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_page(&self, cursor: Option<&Cursor>) -> Page {
        let idx: usize = cursor.map_or(0, |c| c.as_str().parse().unwrap());
        let next = (idx + 1 < self.pages.len()).then(|| Cursor::new((idx + 1).to_string()));
        match &self.pages[idx] {
            Scripted::Records(records) => {
                self.emitted
                    .fetch_add(records.len() as u64, Ordering::SeqCst);
                Page::ok(records.clone(), next)
            }
            Scripted::Error => Page::failed(
                TransportError::Http {
                    status: Some(500),
                    message: "internal error".to_string(),
                },
                next,
            ),
        }
    }
}

/// Endless pages of `page_size` numbered records, slightly delayed.
struct EndlessSource {
    page_size: u64,
}

impl PageSource for EndlessSource {
    fn name(&self) -> &str {
        "endless"
    }

    async fn list_page(&self, cursor: Option<&Cursor>) -> Page {
        tokio::time::sleep(Duration::from_millis(2)).await;
        let idx: u64 = cursor.map_or(0, |c| c.as_str().parse().unwrap());
        let records = (0..self.page_size)
            .map(|i| json!({ "id": idx * self.page_size + i }))
            .collect();
        Page::ok(records, Some(Cursor::new((idx + 1).to_string())))
    }
}

fn read_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn ids(records: &[Value]) -> Vec<u64> {
    records.iter().map(|r| r["id"].as_u64().unwrap()).collect()
}

async fn export_to_file(
    source: impl PageSource,
    path: &Path,
    options: &ExportOptions,
) -> Result<ddexport_core::ExportSummary, ExportError> {
    let dest = Destination::open(Some(path))?;
    run_export(
        source,
        dest,
        options,
        &CancellationToken::new(),
        &ProgressBar::hidden(),
    )
    .await
}

#[tokio::test]
async fn clean_pages_are_concatenated_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.jsonl");

    let summary = export_to_file(
        ScriptedSource::numbered(&[3, 0, 4, 1, 2]),
        &path,
        &ExportOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.records_sent, 10);
    assert_eq!(summary.records_written, 10);
    assert_eq!(summary.pages, 5);
    assert_eq!(summary.failed_pages, 0);
    assert!(!summary.cancelled);
    assert_eq!(ids(&read_lines(&path)), (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn output_is_newline_terminated_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.jsonl");

    export_to_file(ScriptedSource::numbered(&[2]), &path, &ExportOptions::default())
        .await
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "{\"id\":0,\"type\":\"container\"}\n{\"id\":1,\"type\":\"container\"}\n"
    );
}

#[tokio::test]
async fn error_page_in_the_middle_is_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.jsonl");
    let source = ScriptedSource::new(vec![
        Scripted::Records(vec![json!({ "id": 0 }), json!({ "id": 1 })]),
        Scripted::Error,
        Scripted::Records(vec![json!({ "id": 2 }), json!({ "id": 3 }), json!({ "id": 4 })]),
    ]);

    let summary = export_to_file(source, &path, &ExportOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.failed_pages, 1);
    assert_eq!(ids(&read_lines(&path)), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn zero_records_gives_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.jsonl");

    let summary = export_to_file(
        ScriptedSource::numbered(&[0]),
        &path,
        &ExportOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.records_written, 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[tokio::test]
async fn projection_applies_to_every_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.jsonl");
    let options = ExportOptions {
        projection: Some(Projection::new(["id"])),
        ..Default::default()
    };

    export_to_file(ScriptedSource::numbered(&[2, 1]), &path, &options)
        .await
        .unwrap();

    let lines = read_lines(&path);
    assert_eq!(lines, vec![json!({"id": 0}), json!({"id": 1}), json!({"id": 2})]);
}

#[tokio::test]
async fn cancellation_stops_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.jsonl");
    let dest = Destination::open(Some(&path)).unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        run_export(
            EndlessSource { page_size: 7 },
            dest,
            &ExportOptions::default(),
            &cancel,
            &ProgressBar::hidden(),
        ),
    )
    .await
    .expect("cancelled export must terminate")
    .unwrap();

    assert!(summary.cancelled);
    assert!(summary.records_written > 0);
    assert_eq!(summary.records_written, summary.records_sent);

    let got = ids(&read_lines(&path));
    assert_eq!(got.len() as u64, summary.records_written);
    assert_eq!(got, (0..got.len() as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn cancelled_before_start_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.jsonl");
    let dest = Destination::open(Some(&path)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_export(
        EndlessSource { page_size: 5 },
        dest,
        &ExportOptions::default(),
        &cancel,
        &ProgressBar::hidden(),
    )
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.pages, 0);
    assert_eq!(summary.records_written, 0);
}

/// Sink that sleeps on every sync and records how far the producer got ahead.
struct SlowSink {
    emitted: Arc<AtomicU64>,
    received: u64,
    max_ahead: Arc<AtomicU64>,
}

impl Write for SlowSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DurableWrite for SlowSink {
    fn sync(&mut self) -> io::Result<()> {
        self.received += 1;
        let ahead = self
            .emitted
            .load(Ordering::SeqCst)
            .saturating_sub(self.received);
        self.max_ahead.fetch_max(ahead, Ordering::SeqCst);
        std::thread::sleep(Duration::from_micros(50));
        Ok(())
    }
}

#[tokio::test]
async fn slow_writer_applies_backpressure() {
    const PAGE_SIZE: usize = 100;
    const CAPACITY: usize = 4;

    let source = ScriptedSource::numbered(&[PAGE_SIZE; 250]);
    let max_ahead = Arc::new(AtomicU64::new(0));
    let sink = SlowSink {
        emitted: source.emitted.clone(),
        received: 0,
        max_ahead: max_ahead.clone(),
    };
    let options = ExportOptions {
        channel_capacity: CAPACITY,
        ..Default::default()
    };

    let summary = run_export(
        source,
        sink,
        &options,
        &CancellationToken::new(),
        &ProgressBar::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(summary.records_sent, 25_000);
    assert_eq!(summary.records_written, 25_000);
    // fetched-but-unwritten records stay bounded by one page plus the channel
    let bound = (PAGE_SIZE + CAPACITY + 1) as u64;
    assert!(
        max_ahead.load(Ordering::SeqCst) <= bound,
        "producer ran {} records ahead (bound {bound})",
        max_ahead.load(Ordering::SeqCst)
    );
}

/// Sink that fails after a fixed number of records.
struct FailingSink {
    inner: Vec<u8>,
    remaining: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DurableWrite for FailingSink {
    fn sync(&mut self) -> io::Result<()> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        }
        self.remaining -= 1;
        Ok(())
    }
}

#[tokio::test]
async fn writer_failure_aborts_export() {
    let sink = FailingSink {
        inner: Vec::new(),
        remaining: 3,
    };

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        run_export(
            ScriptedSource::numbered(&[50, 50, 50]),
            sink,
            &ExportOptions {
                channel_capacity: 1,
                ..Default::default()
            },
            &CancellationToken::new(),
            &ProgressBar::hidden(),
        ),
    )
    .await
    .expect("failed export must terminate");

    match result {
        Err(ExportError::Sink(e)) => assert_eq!(e.kind(), io::ErrorKind::StorageFull),
        other => panic!("expected sink error, got {other:?}"),
    }
}

/// File sink whose sync starts failing after a fixed number of records.
struct FlakyFile {
    file: std::fs::File,
    durable: usize,
}

impl Write for FlakyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl DurableWrite for FlakyFile {
    fn sync(&mut self) -> io::Result<()> {
        if self.durable == 0 {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        }
        self.durable -= 1;
        self.file.sync_data()
    }
}

#[tokio::test]
async fn records_written_before_sink_failure_survive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.jsonl");
    let sink = FlakyFile {
        file: std::fs::File::create(&path).unwrap(),
        durable: 5,
    };
    let pb = ProgressBar::hidden();

    let result = run_export(
        ScriptedSource::numbered(&[4, 4, 4]),
        sink,
        &ExportOptions {
            channel_capacity: 1,
            ..Default::default()
        },
        &CancellationToken::new(),
        &pb,
    )
    .await;

    match result {
        Err(ExportError::Sink(e)) => assert_eq!(e.kind(), io::ErrorKind::StorageFull),
        other => panic!("expected sink error, got {other:?}"),
    }
    assert!(pb.is_finished());

    // the failing record's bytes reach the file before its sync fails
    let got = ids(&read_lines(&path));
    assert!(got.len() >= 5, "only {} records kept", got.len());
    assert_eq!(got[..5], [0, 1, 2, 3, 4]);
    assert_eq!(got, (0..got.len() as u64).collect::<Vec<_>>());
}
