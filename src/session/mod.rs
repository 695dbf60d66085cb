//! Trial session orchestration
//!
//! This module provides the `SessionOrchestrator` state machine and the
//! collaborators it drives:
//! - `Stage`: video players, spatial audio and headset view
//! - `Transcriber`: speech-to-text for recorded responses
//! - `SessionState`: the states and their transition table
//! - `SessionStatus`: snapshot for the operator console

mod orchestrator;
mod stage;
mod state;
mod stats;
mod transcribe;

pub use orchestrator::{
    Collaborators, OrchestratorSettings, SessionOrchestrator, CALIBRATION_LABEL, EVENT_ABORTED,
    EVENT_CALIBRATION_FINISHED, EVENT_CALIBRATION_FULL, EVENT_CALIBRATION_STARTED,
    EVENT_DELAY_AFTER, EVENT_DELAY_BEFORE, EVENT_PLAYING, EVENT_RECORDING, EVENT_RESPONSE,
    EVENT_TRIAL_COMPLETED, EVENT_TRIAL_STARTED,
};
pub use stage::{HeadlessStage, Stage, StageCall, StageEvent, BACKGROUND_PLAYER, SCREEN_PLAYERS};
pub use state::SessionState;
pub use stats::SessionStatus;
pub use transcribe::{DisabledTranscriber, NatsTranscriber, Transcriber, TRANSCRIPTION_FAILED};
