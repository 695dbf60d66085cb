use serde::Serialize;
use std::fmt;

/// Trial sequence states.
///
/// `Aborted` is the fault state entered on an invalid script or an illegal
/// transition request; it is outside the normal sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Inactive,
    LoadingSession,
    WaitingForBrightnessCalibration,
    PerformingBrightnessCalibration,
    WaitingForChallenges,
    UserReadyToStartChallenges,
    DelayBeforePlayingVideo,
    PlayingVideo,
    DelayAfterPlayingVideos,
    RecordingResponse,
    RecordingComplete,
    Completed,
    Aborted,
}

impl SessionState {
    /// States reachable in one step
    pub fn allowed_successors(self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Inactive => &[LoadingSession],
            LoadingSession => &[WaitingForBrightnessCalibration, WaitingForChallenges],
            WaitingForBrightnessCalibration => &[PerformingBrightnessCalibration],
            PerformingBrightnessCalibration => &[WaitingForChallenges],
            WaitingForChallenges => &[UserReadyToStartChallenges],
            UserReadyToStartChallenges => &[DelayBeforePlayingVideo],
            DelayBeforePlayingVideo => &[PlayingVideo],
            PlayingVideo => &[DelayAfterPlayingVideos],
            DelayAfterPlayingVideos => &[RecordingResponse],
            RecordingResponse => &[RecordingComplete],
            RecordingComplete => &[DelayBeforePlayingVideo, Completed],
            Completed => &[],
            Aborted => &[],
        }
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        self.allowed_successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }

    /// A session is in progress between loading and completion
    pub fn is_active(self) -> bool {
        !matches!(self, SessionState::Inactive) && !self.is_terminal()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
