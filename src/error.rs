use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Errors raised while loading and validating a session script.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("failed to read session script {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse session script: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid session script: {}", .problems.join("; "))]
    Invalid { problems: Vec<String> },

    #[error("the following videos are missing from the catalogue: {}", .names.join(", "))]
    MissingVideos { names: Vec<String> },
}

/// Capture device errors.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no capture device is available")]
    NoCaptureDevice,

    #[error("no recording is in progress")]
    NotRecording,

    #[error("capture backend {backend} failed: {message}")]
    Backend { backend: String, message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
}

/// Malformed inbound remote-control traffic.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("packet truncated")]
    Truncated,

    #[error("packet is not an OSC message or bundle")]
    NotOsc,

    #[error("unsupported OSC type tag '{0}'")]
    UnsupportedTag(char),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("bundles nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TranscriptionError {
    #[error("transcription is disabled")]
    Disabled,

    #[error("transcription backend failed: {0}")]
    Backend(String),

    #[error("transcription timed out after {0:.1}s")]
    TimedOut(f64),

    #[error("transcription task ended without a result")]
    Cancelled,
}

/// An illegal state transition request.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("illegal transition from {from:?} to {to:?} ({context})")]
pub struct InvariantViolation {
    pub from: SessionState,
    pub to: SessionState,
    pub context: String,
}

/// Errors surfaced through the orchestrator's public error channel.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("invariant: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("session io: {0}")]
    Io(#[from] std::io::Error),

    #[error("session interrupted by the operator")]
    Interrupted,
}
