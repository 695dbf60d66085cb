//! Structured logging
//!
//! - `csv`: append-safe, self-describing CSV logs with a fixed field list
//! - `records`: the event log and telemetry row schemas
//! - `bus`: pub/sub channel for eye-tracker and head-pose sources
//! - `scope`: per-challenge telemetry log bound to those sources
//! - `synthetic`: stand-in tracker for headless runs

pub mod bus;
pub mod csv;
pub mod records;
pub mod scope;
pub mod synthetic;

pub use bus::{EventBus, SubscriptionId};
pub use csv::{header_line, value_line, write_record, CsvLog, LogRecord};
pub use records::{
    format_timestamp, local_timestamp, EventLogRecord, EyeSample, GazeRay, HeadRotation,
    PupilometrySample, TelemetryRecord, TelemetryRow, TelemetryValue,
};
pub use scope::{ScopedTelemetryLogger, TelemetryContext, ENDED_MARKER, STARTED_MARKER};
pub use synthetic::SyntheticTracker;
