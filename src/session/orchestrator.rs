use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::stage::{Stage, StageEvent, BACKGROUND_PLAYER, SCREEN_PLAYERS};
use super::state::SessionState;
use super::stats::SessionStatus;
use super::transcribe::{Transcriber, TRANSCRIPTION_FAILED};
use crate::audio::{AudioCaptureService, RecordingFinished};
use crate::catalogue::VideoCatalogue;
use crate::clock::Clock;
use crate::error::{InvariantViolation, SessionError, TranscriptionError};
use crate::script::SessionDescription;
use crate::telemetry::{
    local_timestamp, CsvLog, EventBus, EventLogRecord, HeadRotation, PupilometrySample,
    ScopedTelemetryLogger, TelemetryContext,
};

pub const EVENT_TRIAL_STARTED: &str = "Trial started";
pub const EVENT_CALIBRATION_STARTED: &str = "Brightness calibration started";
pub const EVENT_CALIBRATION_FULL: &str = "Brightness calibration reached full brightness";
pub const EVENT_CALIBRATION_FINISHED: &str = "Brightness calibration finished";
pub const EVENT_DELAY_BEFORE: &str = "Delaying before playing videos";
pub const EVENT_PLAYING: &str = "Playing videos";
pub const EVENT_DELAY_AFTER: &str = "Delaying after playing videos";
pub const EVENT_RECORDING: &str = "Recording response";
pub const EVENT_RESPONSE: &str = "Response received";
pub const EVENT_TRIAL_COMPLETED: &str = "Trial completed";
pub const EVENT_ABORTED: &str = "Session aborted";

/// Telemetry file label used while calibrating
pub const CALIBRATION_LABEL: &str = "brightness_calibration";

/// Where sessions are written and who is being tested
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Sessions go to `<data_dir>/RecordedSessions/`
    pub data_dir: PathBuf,
    pub subject_label: Option<String>,
}

/// Everything that exists only while a script is loaded
struct ActiveSession {
    description: SessionDescription,
    label: String,
    folder: PathBuf,
    started_at: f64,
    event_log: CsvLog<EventLogRecord>,
}

/// Transcription in flight for the response just recorded
struct PendingResponse {
    audio_file: String,
    requested_at: f64,
    result: Option<oneshot::Receiver<Result<String, TranscriptionError>>>,
}

/// The external collaborators an orchestrator drives
pub struct Collaborators<S: Stage> {
    pub stage: S,
    pub capture: AudioCaptureService,
    pub transcriber: Arc<dyn Transcriber>,
    pub pupilometry: Arc<EventBus<PupilometrySample>>,
    pub head_rotation: Arc<EventBus<HeadRotation>>,
}

/// Runs one trial script as an explicit state machine.
///
/// Nothing happens on its own: the caller calls `tick()` once per frame and
/// forwards operator input through `signal_ready` / `signal_stop_recording`.
/// Any request the transition table does not allow aborts the session.
pub struct SessionOrchestrator<S: Stage> {
    clock: Arc<dyn Clock>,
    catalogue: Arc<VideoCatalogue>,
    settings: OrchestratorSettings,
    stage: S,
    capture: AudioCaptureService,
    transcriber: Arc<dyn Transcriber>,
    pupilometry: Arc<EventBus<PupilometrySample>>,
    head_rotation: Arc<EventBus<HeadRotation>>,

    state: SessionState,
    history: Vec<SessionState>,
    state_entered_at: f64,
    session: Option<ActiveSession>,
    challenge_index: usize,
    videos_playing: usize,
    recording_started: bool,
    stop_requested: bool,
    full_brightness_logged: bool,
    telemetry: Option<ScopedTelemetryLogger>,
    response: Option<PendingResponse>,
    last_error: Option<String>,
}

impl<S: Stage> SessionOrchestrator<S> {
    pub fn new(
        clock: Arc<dyn Clock>,
        catalogue: Arc<VideoCatalogue>,
        settings: OrchestratorSettings,
        collaborators: Collaborators<S>,
    ) -> Self {
        let now = clock.now();
        Self {
            clock,
            catalogue,
            settings,
            stage: collaborators.stage,
            capture: collaborators.capture,
            transcriber: collaborators.transcriber,
            pupilometry: collaborators.pupilometry,
            head_rotation: collaborators.head_rotation,
            state: SessionState::Inactive,
            history: vec![SessionState::Inactive],
            state_entered_at: now,
            session: None,
            challenge_index: 0,
            videos_playing: 0,
            recording_started: false,
            stop_requested: false,
            full_brightness_logged: false,
            telemetry: None,
            response: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with `Inactive`
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn description(&self) -> Option<&SessionDescription> {
        self.session.as_ref().map(|s| &s.description)
    }

    /// Folder the current (or last) session writes to
    pub fn session_folder(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.folder.as_path())
    }

    pub fn session_label(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.label.as_str())
    }

    pub fn videos_playing(&self) -> usize {
        self.videos_playing
    }

    fn in_challenge_loop(&self) -> bool {
        use SessionState::*;
        matches!(
            self.state,
            DelayBeforePlayingVideo
                | PlayingVideo
                | DelayAfterPlayingVideos
                | RecordingResponse
                | RecordingComplete
        )
    }

    fn current_challenge(&self) -> Option<&[String; 3]> {
        let session = self.session.as_ref()?;
        if !self.in_challenge_loop() {
            return None;
        }
        session.description.challenges.get(self.challenge_index)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            session_label: self.session.as_ref().map(|s| s.label.clone()),
            challenge_number: self
                .in_challenge_loop()
                .then_some(self.challenge_index + 1),
            challenge_total: self
                .session
                .as_ref()
                .map(|s| s.description.challenges.len())
                .unwrap_or(0),
            videos: self.current_challenge().cloned(),
            videos_playing: self.videos_playing,
            is_recording: self.capture.is_recording(),
            last_error: self.last_error.clone(),
        }
    }

    // ------------------------------------------------------------------
    // External inputs
    // ------------------------------------------------------------------

    /// Load a script and begin a session.
    ///
    /// A script that fails validation aborts before any file is created.
    pub fn start_session(&mut self, script: impl AsRef<Path>) -> Result<(), SessionError> {
        let script = script.as_ref();

        if self.state.is_active() {
            return Err(self.violation(SessionState::LoadingSession, "a session is already running"));
        }

        // A finished or aborted session may be followed by a new one
        self.reset();
        self.transition(SessionState::LoadingSession)?;

        let description = match SessionDescription::load(script, &self.catalogue) {
            Ok(description) => description,
            Err(e) => return Err(self.abort(e.into())),
        };

        if let Err(e) = self.open_session(description) {
            return Err(self.abort(e));
        }

        let next = if self.description().and_then(|d| d.brightness_calibration).is_some() {
            SessionState::WaitingForBrightnessCalibration
        } else {
            SessionState::WaitingForChallenges
        };
        self.transition(next)
    }

    /// Operator or subject says they are ready to go on
    pub fn signal_ready(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::WaitingForBrightnessCalibration => {
                self.transition(SessionState::PerformingBrightnessCalibration)
            }
            SessionState::WaitingForChallenges => {
                self.transition(SessionState::UserReadyToStartChallenges)
            }
            other => Err(self.violation(
                SessionState::UserReadyToStartChallenges,
                &format!("ready signal while {}", other),
            )),
        }
    }

    /// Subject finished answering
    pub fn signal_stop_recording(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::RecordingResponse {
            return Err(self.violation(
                SessionState::RecordingComplete,
                &format!("stop-recording signal while {}", self.state),
            ));
        }

        if self.capture.is_recording() {
            if let Err(e) = self.capture.stop_recording() {
                error!("Failed to stop response recording: {}", e);
                self.recording_started = false;
            }
        }
        self.stop_requested = true;
        self.poll_recording()
    }

    /// Shut down mid-session, releasing the recording and the open logs.
    ///
    /// Does nothing when no session is running.
    pub fn interrupt(&mut self) {
        if self.state.is_active() {
            self.abort(SessionError::Interrupted);
        }
    }

    /// Completion callback from a screen's video player
    pub fn on_playback_finished(&mut self, player: usize) {
        if self.state == SessionState::PlayingVideo && SCREEN_PLAYERS.contains(&player) {
            self.videos_playing = self.videos_playing.saturating_sub(1);
            debug!(
                "Player {} finished, {} videos still playing",
                player, self.videos_playing
            );
        }
    }

    /// Advance the session by one frame.
    ///
    /// Returns the stage events seen this tick so the caller can forward them.
    pub fn tick(&mut self) -> Result<Vec<StageEvent>, SessionError> {
        let events = self.stage.poll_events();
        for event in &events {
            if let StageEvent::PlaybackFinished { player } = event {
                self.on_playback_finished(*player);
            }
        }

        if let Err(e) = self.capture.poll_watchdog() {
            error!("Response recording watchdog failed: {}", e);
            self.recording_started = false;
        }

        let elapsed = self.clock.now() - self.state_entered_at;

        match self.state {
            SessionState::PerformingBrightnessCalibration => self.step_calibration(elapsed)?,
            SessionState::DelayBeforePlayingVideo => {
                if elapsed >= self.script_delay_before() {
                    self.transition(SessionState::PlayingVideo)?;
                }
            }
            SessionState::PlayingVideo => {
                if self.videos_playing == 0 {
                    self.transition(SessionState::DelayAfterPlayingVideos)?;
                }
            }
            SessionState::DelayAfterPlayingVideos => {
                if elapsed >= self.script_delay_after() {
                    self.transition(SessionState::RecordingResponse)?;
                }
            }
            SessionState::RecordingResponse => self.poll_recording()?,
            SessionState::RecordingComplete => self.poll_response()?,
            _ => {}
        }

        Ok(events)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(self.violation(next, "not in the transition table"));
        }

        debug!("{} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
        self.state_entered_at = self.clock.now();

        if let Err(e) = self.enter(next) {
            // A nested transition may already have aborted
            if self.state == SessionState::Aborted {
                return Err(e);
            }
            return Err(self.abort(e));
        }
        Ok(())
    }

    fn enter(&mut self, state: SessionState) -> Result<(), SessionError> {
        match state {
            SessionState::WaitingForBrightnessCalibration => {
                let text = self.ui_text("waiting for brightness calibration", "Press ready to calibrate");
                self.stage.show_prompt(Some(&text));
            }
            SessionState::PerformingBrightnessCalibration => {
                self.stage.show_prompt(None);
                self.full_brightness_logged = false;
                self.stage.show_calibration_view(true, 0.0);
                self.open_telemetry_scope(CALIBRATION_LABEL, None)?;
                self.log_event(EVENT_CALIBRATION_STARTED)?;
            }
            SessionState::WaitingForChallenges => {
                let text = self.ui_text("waiting for challenges", "Press ready to start");
                self.stage.show_prompt(Some(&text));
            }
            SessionState::UserReadyToStartChallenges => {
                self.stage.show_prompt(None);
                for player in SCREEN_PLAYERS {
                    self.stage.start_idle(player);
                }
                return self.transition(SessionState::DelayBeforePlayingVideo);
            }
            SessionState::DelayBeforePlayingVideo => {
                let number = self.challenge_index + 1;
                self.open_telemetry_scope(&format!("{:03}", number), Some(number))?;
                if !self.maskers_continuous() {
                    self.stage.set_maskers_paused(false);
                }
                self.log_event(EVENT_DELAY_BEFORE)?;
            }
            SessionState::PlayingVideo => self.play_challenge()?,
            SessionState::DelayAfterPlayingVideos => {
                if !self.maskers_continuous() {
                    self.stage.set_maskers_paused(true);
                }
                self.log_event(EVENT_DELAY_AFTER)?;
            }
            SessionState::RecordingResponse => {
                if self.recording_started {
                    if let Err(e) = self.capture.mark_recording_in_point() {
                        warn!("Could not mark response in-point: {}", e);
                    }
                }
                self.stop_requested = false;
                let text = self.ui_text("recording", "Please answer now");
                self.stage.show_prompt(Some(&text));
                self.log_event(EVENT_RECORDING)?;
            }
            SessionState::RecordingComplete => self.stage.show_prompt(None),
            SessionState::Completed => {
                self.log_event(EVENT_TRIAL_COMPLETED)?;
                let text = self.ui_text("completed", "Thank you");
                self.stage.show_prompt(Some(&text));
                if let Some(session) = self.session.as_mut() {
                    session.event_log.close()?;
                    info!("Session {} completed", session.label);
                }
            }
            SessionState::Inactive | SessionState::LoadingSession | SessionState::Aborted => {}
        }
        Ok(())
    }

    fn violation(&mut self, to: SessionState, context: &str) -> SessionError {
        let violation = InvariantViolation {
            from: self.state,
            to,
            context: context.to_string(),
        };
        self.abort(violation.into())
    }

    /// Move to `Aborted`, releasing everything the session holds
    fn abort(&mut self, error: SessionError) -> SessionError {
        error!("Session aborted in {}: {}", self.state, error);

        self.close_telemetry_scope();
        if let Err(e) = self.capture.stop_recording() {
            warn!("Failed to stop recording while aborting: {}", e);
        }
        while self.capture.take_finished().is_some() {}
        self.response = None;
        self.recording_started = false;

        if self.session.is_some() {
            if let Err(e) = self.log_event(EVENT_ABORTED) {
                warn!("Failed to log abort: {}", e);
            }
            if let Some(session) = self.session.as_mut() {
                if let Err(e) = session.event_log.close() {
                    warn!("Failed to close event log: {}", e);
                }
            }
        }

        self.state = SessionState::Aborted;
        self.history.push(SessionState::Aborted);
        self.state_entered_at = self.clock.now();
        self.last_error = Some(error.to_string());
        error
    }

    fn reset(&mut self) {
        self.state = SessionState::Inactive;
        self.history = vec![SessionState::Inactive];
        self.session = None;
        self.challenge_index = 0;
        self.videos_playing = 0;
        self.recording_started = false;
        self.stop_requested = false;
        self.telemetry = None;
        self.response = None;
        self.last_error = None;
    }

    // ------------------------------------------------------------------
    // State actions
    // ------------------------------------------------------------------

    fn open_session(&mut self, description: SessionDescription) -> Result<(), SessionError> {
        let mut label = format!(
            "{}_{}",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"),
            description.name
        );
        if let Some(subject) = self.settings.subject_label.as_deref().filter(|s| !s.is_empty()) {
            label.push('_');
            label.push_str(subject);
        }

        let folder = self.settings.data_dir.join("RecordedSessions").join(&label);
        fs::create_dir_all(&folder)?;
        fs::write(folder.join(format!("{}.yaml", description.name)), &description.source)?;

        let event_log = CsvLog::open(folder.join(format!("{}_events.csv", label)))?;
        self.capture.set_save_directory(&folder);

        info!("Session {} recording to {}", label, folder.display());

        self.stage.set_speaker_amplitude(description.speaker_amplitude);
        self.stage.set_masking_video(&description.masking_video);
        self.stage.play_video(BACKGROUND_PLAYER, &description.masking_video);
        self.stage.configure_maskers(&description.maskers);
        self.stage.set_maskers_paused(!description.play_maskers_continuously);
        for (screen, player) in description.video_screens.iter().zip(SCREEN_PLAYERS) {
            self.stage.set_screen_transform(player, &screen.transform);
            self.stage.set_idle_video(player, &screen.idle_video);
        }

        self.session = Some(ActiveSession {
            description,
            label,
            folder,
            started_at: self.clock.now(),
            event_log,
        });

        self.log_event(EVENT_TRIAL_STARTED)?;
        Ok(())
    }

    fn step_calibration(&mut self, elapsed: f64) -> Result<(), SessionError> {
        let Some(calibration) = self.description().and_then(|d| d.brightness_calibration) else {
            return self.transition(SessionState::WaitingForChallenges);
        };
        let ramp = calibration.duration_black_to_white as f64;
        let hold = calibration.duration_hold_on_white as f64;

        if elapsed < ramp {
            self.stage
                .show_calibration_view(true, (elapsed / ramp).clamp(0.0, 1.0) as f32);
            return Ok(());
        }

        if !self.full_brightness_logged {
            self.full_brightness_logged = true;
            self.stage.show_calibration_view(true, 1.0);
            self.log_event(EVENT_CALIBRATION_FULL)?;
        }

        if elapsed >= ramp + hold {
            self.stage.show_calibration_view(false, 0.0);
            self.log_event(EVENT_CALIBRATION_FINISHED)?;
            self.close_telemetry_scope();
            self.transition(SessionState::WaitingForChallenges)?;
        }
        Ok(())
    }

    /// Start `<session>_pupilometry_<label>.csv`, replacing any scope still open
    fn open_telemetry_scope(
        &mut self,
        label: &str,
        challenge_number: Option<usize>,
    ) -> Result<(), SessionError> {
        self.close_telemetry_scope();
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };

        let path = session
            .folder
            .join(format!("{}_pupilometry_{}.csv", session.label, label));
        let context = TelemetryContext {
            clock: Arc::clone(&self.clock),
            session_started_at: session.started_at,
            configuration: session.description.name.clone(),
            challenge_number,
        };

        let mut scope = ScopedTelemetryLogger::open(path, context)?;
        scope.subscribe(&self.pupilometry, "Pupilometry");
        scope.subscribe(&self.head_rotation, "HeadRotation");
        self.telemetry = Some(scope);
        Ok(())
    }

    fn close_telemetry_scope(&mut self) {
        if let Some(mut scope) = self.telemetry.take() {
            scope.close();
        }
    }

    fn play_challenge(&mut self) -> Result<(), SessionError> {
        let Some(videos) = self.current_challenge().cloned() else {
            return Err(self.invariant(SessionState::PlayingVideo, "no challenge to play"));
        };
        let Some(session) = self.session.as_ref() else {
            return Err(self.invariant(SessionState::PlayingVideo, "no session loaded"));
        };

        let longest_video = videos
            .iter()
            .filter_map(|v| self.stage.expected_duration(v))
            .fold(0.0_f64, f64::max);
        let description = &session.description;
        let max_duration = (description.recording_duration as f64
            + longest_video
            + description.delay_after_playing_videos as f64)
            .ceil();
        let filename = format!("{}_response_{:03}.wav", session.label, self.challenge_index + 1);

        // Capture first: some headsets lose the opening seconds of a recording
        self.recording_started = match self.capture.start_recording(&filename, max_duration) {
            Ok(()) => true,
            Err(e) => {
                error!("Continuing challenge {} without audio: {}", self.challenge_index + 1, e);
                false
            }
        };

        for (video, player) in videos.iter().zip(SCREEN_PLAYERS) {
            self.stage.play_video(player, video);
            self.videos_playing += 1;
        }

        self.log_event(EVENT_PLAYING)
    }

    fn invariant(&self, to: SessionState, context: &str) -> SessionError {
        InvariantViolation {
            from: self.state,
            to,
            context: context.to_string(),
        }
        .into()
    }

    /// In `RecordingResponse`: move on once the recording is saved, or, with no
    /// microphone, once the subject stops or the nominal duration passes.
    fn poll_recording(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::RecordingResponse {
            return Ok(());
        }

        if let Some(finished) = self.capture.take_finished() {
            self.transition(SessionState::RecordingComplete)?;
            self.request_transcription(Some(finished));
            return Ok(());
        }

        if !self.recording_started {
            let elapsed = self.clock.now() - self.state_entered_at;
            let nominal = self
                .description()
                .map(|d| d.recording_duration as f64)
                .unwrap_or(0.0);
            if self.stop_requested || elapsed >= nominal {
                self.transition(SessionState::RecordingComplete)?;
                self.request_transcription(None);
            }
        }
        Ok(())
    }

    fn request_transcription(&mut self, recording: Option<RecordingFinished>) {
        let requested_at = self.clock.now();
        let Some(recording) = recording else {
            self.response = Some(PendingResponse {
                audio_file: String::new(),
                requested_at,
                result: None,
            });
            return;
        };

        let audio_file = recording
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = oneshot::channel();
                let transcriber = Arc::clone(&self.transcriber);
                let clip = recording.clip;
                handle.spawn(async move {
                    let _ = tx.send(transcriber.transcribe(clip).await);
                });
                Some(rx)
            }
            Err(e) => {
                error!("No async runtime for transcription: {}", e);
                None
            }
        };

        self.response = Some(PendingResponse {
            audio_file,
            requested_at,
            result,
        });
    }

    /// In `RecordingComplete`: write the response row once transcription settles
    fn poll_response(&mut self) -> Result<(), SessionError> {
        let Some(pending) = self.response.as_mut() else {
            return Err(self.violation(SessionState::RecordingComplete, "no response pending"));
        };

        let outcome = match pending.result.as_mut() {
            None => Err(TranscriptionError::Cancelled),
            Some(rx) => match rx.try_recv() {
                Ok(outcome) => outcome,
                Err(oneshot::error::TryRecvError::Empty) => return Ok(()),
                Err(oneshot::error::TryRecvError::Closed) => Err(TranscriptionError::Cancelled),
            },
        };

        let Some(pending) = self.response.take() else {
            return Ok(());
        };
        let processing = self.clock.now() - pending.requested_at;
        let transcription = match outcome {
            Ok(text) => {
                info!("Response transcribed in {:.2}s: {}", processing, text);
                text
            }
            Err(e) => {
                if !pending.audio_file.is_empty() {
                    error!("Transcription failed: {}", e);
                }
                TRANSCRIPTION_FAILED.to_string()
            }
        };

        self.write_event(EVENT_RESPONSE, pending.audio_file, transcription, Some(processing))?;

        self.close_telemetry_scope();

        self.challenge_index += 1;
        let total = self
            .description()
            .map(|d| d.challenges.len())
            .unwrap_or(0);
        if self.challenge_index < total {
            self.transition(SessionState::DelayBeforePlayingVideo)
        } else {
            self.transition(SessionState::Completed)
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn log_event(&mut self, event_name: &str) -> Result<(), SessionError> {
        self.write_event(event_name, String::new(), String::new(), None)
    }

    fn write_event(
        &mut self,
        event_name: &str,
        response_audio_file: String,
        transcription: String,
        transcription_duration_secs: Option<f64>,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let in_loop = self.in_challenge_loop();
        let challenge_number = in_loop.then_some(self.challenge_index + 1);
        let videos = self.current_challenge().cloned().unwrap_or_default();

        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if !session.event_log.is_open() {
            return Ok(());
        }

        let record = EventLogRecord {
            timestamp: local_timestamp(),
            session_time: now - session.started_at,
            configuration: session.description.name.clone(),
            event_name: event_name.to_string(),
            challenge_number,
            videos,
            response_audio_file,
            transcription,
            transcription_duration_secs,
        };
        session.event_log.write(&record)?;
        info!("{}", event_name);
        Ok(())
    }

    fn ui_text(&self, key: &str, fallback: &str) -> String {
        self.description()
            .map(|d| d.ui_text(key, fallback).to_string())
            .unwrap_or_else(|| fallback.to_string())
    }

    fn maskers_continuous(&self) -> bool {
        self.description()
            .map(|d| d.play_maskers_continuously)
            .unwrap_or(false)
    }

    fn script_delay_before(&self) -> f64 {
        self.description()
            .map(|d| d.delay_before_playing_videos as f64)
            .unwrap_or(0.0)
    }

    fn script_delay_after(&self) -> f64 {
        self.description()
            .map(|d| d.delay_after_playing_videos as f64)
            .unwrap_or(0.0)
    }
}
