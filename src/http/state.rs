use tokio::sync::{mpsc, watch};

use crate::session::SessionStatus;

/// Operator input forwarded to the tick loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Ready,
    StopRecording,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Commands for the tick loop
    pub commands: mpsc::Sender<OperatorCommand>,
    /// Latest orchestrator snapshot, published every tick
    pub status: watch::Receiver<SessionStatus>,
}

impl AppState {
    pub fn new(
        commands: mpsc::Sender<OperatorCommand>,
        status: watch::Receiver<SessionStatus>,
    ) -> Self {
        Self { commands, status }
    }
}
