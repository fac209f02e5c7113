use serde::Serialize;
use std::fs::{self, File};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use crate::error::{AipDriftError, Result};

/// A row type with a fixed header, written in header order.
pub trait LedgerRow: Serialize {
    const HEADERS: &'static [&'static str];
}

/// Append-only CSV ledger. The header is written on creation so an empty
/// run still leaves a well-formed file.
pub struct LedgerWriter<R: LedgerRow> {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
    _row: PhantomData<R>,
}

impl<R: LedgerRow> LedgerWriter<R> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(R::HEADERS)?;

        Ok(Self {
            writer,
            path,
            rows: 0,
            _row: PhantomData,
        })
    }

    pub fn append(&mut self, row: &R) -> Result<()> {
        self.writer.serialize(row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered rows and fsync the file. Returns the row count.
    pub fn finish(self) -> Result<usize> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| AipDriftError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(self.rows)
    }
}

/// A ledger shared between workers; appends are serialized by the lock.
pub struct SharedLedger<R: LedgerRow> {
    inner: Arc<Mutex<LedgerWriter<R>>>,
}

impl<R: LedgerRow> Clone for SharedLedger<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: LedgerRow> SharedLedger<R> {
    pub fn new(writer: LedgerWriter<R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn append(&self, row: &R) -> Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| AipDriftError::Config("ledger lock poisoned".to_string()))?;
        writer.append(row)
    }

    /// Finish the ledger once every other handle has been dropped.
    pub fn finish(self) -> Result<usize> {
        let mutex = Arc::try_unwrap(self.inner)
            .map_err(|_| AipDriftError::Config("ledger still shared at finish".to_string()))?;
        let writer = mutex
            .into_inner()
            .map_err(|_| AipDriftError::Config("ledger lock poisoned".to_string()))?;
        writer.finish()
    }
}

/// Destination for per-item records. Implemented by both ledger handles so
/// the engines do not care which one they write to.
pub trait LedgerSink<R> {
    fn record(&mut self, row: &R) -> Result<()>;
}

impl<R: LedgerRow> LedgerSink<R> for LedgerWriter<R> {
    fn record(&mut self, row: &R) -> Result<()> {
        self.append(row)
    }
}

impl<R: LedgerRow> LedgerSink<R> for SharedLedger<R> {
    fn record(&mut self, row: &R) -> Result<()> {
        self.append(row)
    }
}

impl<R: Clone> LedgerSink<R> for Vec<R> {
    fn record(&mut self, row: &R) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct TestRow {
        id: String,
        note: String,
    }

    impl LedgerRow for TestRow {
        const HEADERS: &'static [&'static str] = &["id", "note"];
    }

    #[test]
    fn test_header_written_without_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/ledger.csv");

        let writer = LedgerWriter::<TestRow>::create(&path).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);

        assert_eq!(fs::read_to_string(&path).unwrap(), "id,note\n");
    }

    #[test]
    fn test_rows_follow_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut writer = LedgerWriter::<TestRow>::create(&path).unwrap();
        writer.append(&TestRow { id: "1".into(), note: "".into() }).unwrap();
        writer.append(&TestRow { id: "2".into(), note: "has, comma".into() }).unwrap();
        assert_eq!(writer.rows(), 2);
        writer.finish().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,note\n1,\n2,\"has, comma\"\n");
    }

    #[test]
    fn test_shared_ledger_serializes_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.csv");
        let shared = SharedLedger::new(LedgerWriter::<TestRow>::create(&path).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ledger = shared.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        ledger.append(&TestRow { id: format!("{}-{}", i, j), note: String::new() }).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.finish().unwrap(), 40);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 41);
    }

    #[test]
    fn test_shared_ledger_finish_fails_while_cloned() {
        let dir = TempDir::new().unwrap();
        let shared = SharedLedger::new(LedgerWriter::<TestRow>::create(dir.path().join("x.csv")).unwrap());
        let _other = shared.clone();
        assert!(shared.finish().is_err());
    }
}
