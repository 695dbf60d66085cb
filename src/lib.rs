pub mod audio;
pub mod catalogue;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod postprocess;
pub mod prefs;
pub mod remote;
pub mod runner;
pub mod script;
pub mod session;
pub mod telemetry;

pub use audio::{AudioCaptureService, AudioClip, CaptureDevice, RecordingFinished, SyntheticMicrophone};
pub use catalogue::{VideoCatalogue, VideoEntry, VideoKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{
    CaptureError, InvariantViolation, ProtocolError, SessionError, TranscriptionError,
    ValidationError,
};
pub use http::{create_router, AppState, OperatorCommand};
pub use nats::{AudioFrameMessage, NatsClient, TranscriptMessage};
pub use postprocess::{transcribe_session, PostprocessSummary, TranscriptionRecord};
pub use prefs::PreferenceStore;
pub use remote::{OscMessage, OscSender, RemoteController};
pub use runner::{Runner, RunnerChannels};
pub use script::SessionDescription;
pub use session::{
    HeadlessStage, SessionOrchestrator, SessionState, SessionStatus, Stage, Transcriber,
};
