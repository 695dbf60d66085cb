use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::bus::EventBus;
use super::csv::CsvLog;
use super::records::{local_timestamp, TelemetryRecord, TelemetryRow};
use crate::clock::Clock;

pub const STARTED_MARKER: &str = "Started pupilometry log";
pub const ENDED_MARKER: &str = "Ended pupilometry log";

/// Columns shared by every row of one telemetry log
#[derive(Clone)]
pub struct TelemetryContext {
    pub clock: Arc<dyn Clock>,
    /// Clock reading that `SessionTime` is measured from
    pub session_started_at: f64,
    pub configuration: String,
    pub challenge_number: Option<usize>,
}

impl TelemetryContext {
    fn record(&self, event_name: &str, row: TelemetryRow) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: local_timestamp(),
            session_time: self.clock.now() - self.session_started_at,
            configuration: self.configuration.clone(),
            event_name: event_name.to_string(),
            challenge_number: self.challenge_number,
            row,
        }
    }
}

type SharedLog = Arc<Mutex<CsvLog<TelemetryRecord>>>;

fn write_row(log: &SharedLog, record: &TelemetryRecord) {
    let mut log = log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Err(e) = log.write(record) {
        warn!("Failed to write telemetry row: {}", e);
    }
}

/// Telemetry log that lives for the duration of one challenge.
///
/// Writes a start marker when opened. While open, every event published on a
/// subscribed bus becomes one row. `close()` (or drop) unsubscribes from every
/// bus, writes the end marker and closes the file, once.
pub struct ScopedTelemetryLogger {
    log: SharedLog,
    context: TelemetryContext,
    path: PathBuf,
    unsubscribes: Vec<Box<dyn FnOnce() + Send>>,
    closed: bool,
}

impl ScopedTelemetryLogger {
    pub fn open(path: impl AsRef<Path>, context: TelemetryContext) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let log = Arc::new(Mutex::new(CsvLog::open(&path)?));

        write_row(&log, &context.record(STARTED_MARKER, TelemetryRow::Marker));
        info!("Telemetry scope opened: {}", path.display());

        Ok(Self {
            log,
            context,
            path,
            unsubscribes: Vec::new(),
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn subscription_count(&self) -> usize {
        self.unsubscribes.len()
    }

    /// Log one row named `event_name` for every event published on `bus`
    pub fn subscribe<T>(&mut self, bus: &Arc<EventBus<T>>, event_name: &'static str)
    where
        T: Clone + Into<TelemetryRow> + 'static,
    {
        if self.closed {
            return;
        }

        let log = Arc::clone(&self.log);
        let context = self.context.clone();
        let id = bus.subscribe(move |event: &T| {
            write_row(&log, &context.record(event_name, event.clone().into()));
        });

        let bus = Arc::clone(bus);
        self.unsubscribes.push(Box::new(move || {
            bus.unsubscribe(id);
        }));
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for unsubscribe in self.unsubscribes.drain(..) {
            unsubscribe();
        }

        write_row(&self.log, &self.context.record(ENDED_MARKER, TelemetryRow::Marker));

        let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let rows = log.rows_written();
        if let Err(e) = log.close() {
            warn!("Failed to close telemetry log {}: {}", self.path.display(), e);
        }
        info!("Telemetry scope closed: {} ({} rows)", self.path.display(), rows);
    }
}

impl Drop for ScopedTelemetryLogger {
    fn drop(&mut self) {
        self.close();
    }
}
