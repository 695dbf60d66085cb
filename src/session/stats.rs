use serde::Serialize;

use super::state::SessionState;

/// Snapshot of the orchestrator, published to the operator console
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionStatus {
    /// Current state
    pub state: SessionState,

    /// `<date>_<script>[_<subject>]`, once a session has loaded
    pub session_label: Option<String>,

    /// 1-based number of the challenge in progress
    pub challenge_number: Option<usize>,

    /// Number of challenges in the script
    pub challenge_total: usize,

    /// Videos of the challenge in progress, left to right
    pub videos: Option<[String; 3]>,

    /// Screens that have not yet finished playing
    pub videos_playing: usize,

    /// Whether a response recording is running
    pub is_recording: bool,

    /// Error that aborted the session, if any
    pub last_error: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Inactive,
            session_label: None,
            challenge_number: None,
            challenge_total: 0,
            videos: None,
            videos_playing: 0,
            is_recording: false,
            last_error: None,
        }
    }
}
