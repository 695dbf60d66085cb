use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A flat row type with a fixed, ordered field list.
///
/// `FIELDS` is the header; `values()` must return exactly one value per field
/// in the same order.
pub trait LogRecord {
    const SCHEMA: &'static str;
    const VERSION: u32;
    const FIELDS: &'static [&'static str];

    fn values(&self) -> Vec<String>;
}

/// Header row for a record type
pub fn header_line<R: LogRecord>() -> String {
    R::FIELDS.join(",")
}

/// Values joined into one CSV line. Commas are replaced with `_` and line
/// breaks with spaces so every record stays on one line.
pub fn value_line<R: LogRecord>(record: &R) -> String {
    let values = record.values();
    debug_assert_eq!(values.len(), R::FIELDS.len(), "{} field count", R::SCHEMA);
    values
        .iter()
        .map(|v| v.replace(',', "_").replace(['\n', '\r'], " "))
        .collect::<Vec<_>>()
        .join(",")
}

/// Write one record, preceded by the header when the destination is empty.
pub fn write_record<R: LogRecord, W: Write>(
    writer: &mut W,
    destination_is_empty: bool,
    record: &R,
) -> io::Result<()> {
    if destination_is_empty {
        writeln!(writer, "{}", header_line::<R>())?;
    }
    writeln!(writer, "{}", value_line(record))?;
    writer.flush()
}

/// Append-only CSV log of one record type.
///
/// Opening an existing file appends to it; the header is only written when
/// the file had no bytes. Each row is flushed as it is written.
pub struct CsvLog<R: LogRecord, W: Write = File> {
    writer: Option<W>,
    path: Option<PathBuf>,
    bytes: u64,
    rows_written: usize,
    _record: PhantomData<fn(&R)>,
}

impl<R: LogRecord> CsvLog<R, File> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let existing = file.metadata()?.len();

        info!(
            "Opened {} v{} log {} ({} existing bytes)",
            R::SCHEMA,
            R::VERSION,
            path.display(),
            existing
        );

        let mut log = Self::from_writer(file, existing);
        log.path = Some(path.to_path_buf());
        Ok(log)
    }
}

impl<R: LogRecord, W: Write> CsvLog<R, W> {
    /// Wrap any writer; `existing_len` is how many bytes the destination already holds
    pub fn from_writer(writer: W, existing_len: u64) -> Self {
        Self {
            writer: Some(writer),
            path: None,
            bytes: existing_len,
            rows_written: 0,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn write(&mut self, record: &R) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, format!("{} log is closed", R::SCHEMA)))?;

        let mut line = Vec::new();
        write_record(&mut line, self.bytes == 0, record)?;
        writer.write_all(&line)?;
        writer.flush()?;

        self.bytes += line.len() as u64;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and release the writer. Closing twice is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            debug!("Closed {} log after {} rows", R::SCHEMA, self.rows_written);
        }
        Ok(())
    }

    /// Give back the writer (in-memory logs in tests)
    pub fn into_inner(mut self) -> Option<W> {
        self.writer.take()
    }
}
