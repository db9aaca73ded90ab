//! Output destinations and the record writer that drains the export channel

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc::Receiver;

use crate::error::ExportError;

/// Separator written after every record payload
pub const RECORD_SEPARATOR: &[u8] = b"\n";

/// A writer that can force written bytes to stable storage.
pub trait DurableWrite: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl DurableWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl DurableWrite for Vec<u8> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where export output goes: a created (truncated) file, or stdout.
#[derive(Debug)]
pub enum Destination {
    File { file: File, path: PathBuf },
    Stdout(io::Stdout),
}

impl Destination {
    /// Open the destination. `None` or an empty path selects stdout.
    ///
    /// A file that cannot be created is a fatal [`ExportError::Sink`].
    pub fn open(path: Option<&Path>) -> Result<Self, ExportError> {
        let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(Self::Stdout(io::stdout()));
        };
        let file = File::create(path).map_err(|e| {
            ExportError::Sink(io::Error::new(
                e.kind(),
                format!("cannot create {}: {e}", path.display()),
            ))
        })?;
        log::info!("Writing output to {}", path.display());
        Ok(Self::File {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Display form for logs and summaries
    pub fn describe(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Stdout(_) => "stdout".to_string(),
        }
    }
}

impl Write for Destination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File { file, .. } => file.write(buf),
            Self::Stdout(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File { file, .. } => file.flush(),
            Self::Stdout(out) => out.flush(),
        }
    }
}

impl DurableWrite for Destination {
    fn sync(&mut self) -> io::Result<()> {
        match self {
            Self::File { file, .. } => file.sync_data(),
            // stdout may be a pipe or tty; flushing is the strongest guarantee
            Self::Stdout(out) => out.flush(),
        }
    }
}

/// Consumer side of a streaming export.
///
/// Owns the destination exclusively. Each payload is written, followed by
/// [`RECORD_SEPARATOR`], and synced before the next one is taken.
pub struct RecordWriter<W> {
    out: W,
    written: u64,
}

impl<W: DurableWrite> RecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Write one payload and force it to storage.
    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        self.out.write_all(payload)?;
        self.out.write_all(RECORD_SEPARATOR)?;
        self.out.sync()?;
        self.written += 1;
        Ok(())
    }

    /// Receive until the channel is closed and empty. Blocking; run it on a
    /// dedicated thread (`spawn_blocking`), never on an async worker.
    ///
    /// Returns the number of records written. On error the receiver is
    /// dropped, which makes the producer's next send fail.
    pub fn drain(mut self, mut rx: Receiver<Vec<u8>>) -> Result<u64, ExportError> {
        while let Some(payload) = rx.blocking_recv() {
            self.write_record(&payload).map_err(ExportError::Sink)?;
        }
        self.out.flush().map_err(ExportError::Sink)?;
        log::debug!("writer finished after {} records", self.written);
        Ok(self.written)
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_path_is_stdout() {
        let dest = Destination::open(Some(Path::new(""))).unwrap();
        assert_eq!(dest.describe(), "stdout");
        let dest = Destination::open(None).unwrap();
        assert!(matches!(dest, Destination::Stdout(_)));
    }

    #[test]
    fn open_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(&path, b"stale contents\n").unwrap();

        let dest = Destination::open(Some(&path)).unwrap();
        drop(dest);
        assert_eq!(std::fs::read(&path).unwrap().len(), 0);
    }

    #[test]
    fn open_missing_directory_is_sink_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no/such/dir/out.jsonl");
        let err = Destination::open(Some(&path)).unwrap_err();
        assert!(matches!(err, ExportError::Sink(_)));
        assert!(err.to_string().contains("out.jsonl"));
    }

    #[test]
    fn write_record_appends_separator() {
        let mut w = RecordWriter::new(Vec::new());
        w.write_record(br#"{"a":1}"#).unwrap();
        w.write_record(br#"{"b":2}"#).unwrap();
        assert_eq!(w.written(), 2);
        assert_eq!(w.into_inner(), b"{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn drain_writes_until_closed() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let handle = std::thread::spawn(move || RecordWriter::new(Vec::new()).drain(rx));
        for i in 0..10 {
            tx.blocking_send(format!("{i}").into_bytes()).unwrap();
        }
        drop(tx);
        assert_eq!(handle.join().unwrap().unwrap(), 10);
    }

    #[test]
    fn drain_closed_empty_channel() {
        let (tx, rx) = tokio::sync::mpsc::channel::<Vec<u8>>(1);
        drop(tx);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.jsonl");
        let dest = Destination::open(Some(&path)).unwrap();
        assert_eq!(RecordWriter::new(dest).drain(rx).unwrap(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
