use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::catalogue::VideoCatalogue;
use crate::clock::Clock;
use crate::script::{Masker, ScreenTransform};

/// Player 0 shows the masking video behind the screens
pub const BACKGROUND_PLAYER: usize = 0;

/// Players 1..=3 are the screens, left to right
pub const SCREEN_PLAYERS: std::ops::RangeInclusive<usize> = 1..=3;

/// Notifications from the presentation layer, drained once per tick
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// A non-idle video reached its end
    PlaybackFinished { player: usize },
    /// A video is loaded and ready to show its first frame
    Prepared { player: usize, video: String, idle: bool },
    /// A video put its first frame on screen
    FirstFrame { player: usize, video: String, idle: bool },
}

/// Presentation collaborator: video players, spatial audio and the headset view.
///
/// Implementations:
/// - `HeadlessStage`: clock-driven simulation used without a renderer and in tests
pub trait Stage {
    fn set_speaker_amplitude(&mut self, amplitude: f32);
    fn set_masking_video(&mut self, video: &str);
    fn configure_maskers(&mut self, maskers: &[Masker]);
    fn set_maskers_paused(&mut self, paused: bool);

    fn set_screen_transform(&mut self, player: usize, transform: &ScreenTransform);
    fn set_idle_video(&mut self, player: usize, video: &str);
    fn start_idle(&mut self, player: usize);
    fn play_video(&mut self, player: usize, video: &str);
    fn stop_video(&mut self, player: usize);

    /// Playback length of a video, when known
    fn expected_duration(&self, video: &str) -> Option<f64>;

    /// Full-sphere overlay used for brightness calibration
    fn show_calibration_view(&mut self, enabled: bool, brightness: f32);

    fn set_masking_level(&mut self, level: f32);
    fn set_speech_level(&mut self, level: f32);
    fn reset_orientation(&mut self);
    fn set_orientation(&mut self, euler: [f32; 3]);

    /// Operator/subject prompt; `None` hides it
    fn show_prompt(&mut self, text: Option<&str>);

    fn poll_events(&mut self) -> Vec<StageEvent>;
}

/// Every call a `HeadlessStage` received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum StageCall {
    SpeakerAmplitude(f32),
    MaskingVideo(String),
    Maskers(Vec<Masker>),
    MaskersPaused(bool),
    ScreenTransform { player: usize, transform: ScreenTransform },
    SetIdle { player: usize, video: String },
    StartIdle(usize),
    Play { player: usize, video: String },
    Stop(usize),
    CalibrationView { enabled: bool, brightness: f32 },
    MaskingLevel(f32),
    SpeechLevel(f32),
    ResetOrientation,
    SetOrientation([f32; 3]),
    Prompt(Option<String>),
}

pub struct HeadlessStage {
    clock: Arc<dyn Clock>,
    catalogue: Arc<VideoCatalogue>,
    default_duration: f64,
    idle_videos: BTreeMap<usize, String>,
    playing: BTreeMap<usize, f64>,
    events: VecDeque<StageEvent>,
    calls: Vec<StageCall>,
}

impl HeadlessStage {
    pub fn new(clock: Arc<dyn Clock>, catalogue: Arc<VideoCatalogue>) -> Self {
        Self {
            clock,
            catalogue,
            default_duration: 3.0,
            idle_videos: BTreeMap::new(),
            playing: BTreeMap::new(),
            events: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    /// Duration used for videos the catalogue has no length for
    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = seconds;
        self
    }

    pub fn calls(&self) -> &[StageCall] {
        &self.calls
    }

    pub fn is_playing(&self, player: usize) -> bool {
        self.playing.contains_key(&player)
    }

    fn show(&mut self, player: usize, video: &str, idle: bool) {
        self.events.push_back(StageEvent::Prepared {
            player,
            video: video.to_string(),
            idle,
        });
        self.events.push_back(StageEvent::FirstFrame {
            player,
            video: video.to_string(),
            idle,
        });
    }
}

impl Stage for HeadlessStage {
    fn set_speaker_amplitude(&mut self, amplitude: f32) {
        self.calls.push(StageCall::SpeakerAmplitude(amplitude));
    }

    fn set_masking_video(&mut self, video: &str) {
        self.calls.push(StageCall::MaskingVideo(video.to_string()));
    }

    fn configure_maskers(&mut self, maskers: &[Masker]) {
        self.calls.push(StageCall::Maskers(maskers.to_vec()));
    }

    fn set_maskers_paused(&mut self, paused: bool) {
        self.calls.push(StageCall::MaskersPaused(paused));
    }

    fn set_screen_transform(&mut self, player: usize, transform: &ScreenTransform) {
        self.calls.push(StageCall::ScreenTransform {
            player,
            transform: *transform,
        });
    }

    fn set_idle_video(&mut self, player: usize, video: &str) {
        self.idle_videos.insert(player, video.to_string());
        self.calls.push(StageCall::SetIdle {
            player,
            video: video.to_string(),
        });
    }

    fn start_idle(&mut self, player: usize) {
        self.calls.push(StageCall::StartIdle(player));
        if let Some(video) = self.idle_videos.get(&player).cloned() {
            self.show(player, &video, true);
        }
    }

    fn play_video(&mut self, player: usize, video: &str) {
        self.calls.push(StageCall::Play {
            player,
            video: video.to_string(),
        });
        let duration = self.expected_duration(video).unwrap_or(self.default_duration);
        self.playing.insert(player, self.clock.now() + duration);
        self.show(player, video, false);
        debug!("Headless player {} playing {} for {:.2}s", player, video, duration);
    }

    fn stop_video(&mut self, player: usize) {
        self.calls.push(StageCall::Stop(player));
        self.playing.remove(&player);
    }

    fn expected_duration(&self, video: &str) -> Option<f64> {
        let known = self.catalogue.get(video).and_then(|entry| entry.duration_secs);
        Some(known.unwrap_or(self.default_duration))
    }

    fn show_calibration_view(&mut self, enabled: bool, brightness: f32) {
        self.calls.push(StageCall::CalibrationView {
            enabled,
            brightness,
        });
    }

    fn set_masking_level(&mut self, level: f32) {
        self.calls.push(StageCall::MaskingLevel(level));
    }

    fn set_speech_level(&mut self, level: f32) {
        self.calls.push(StageCall::SpeechLevel(level));
    }

    fn reset_orientation(&mut self) {
        self.calls.push(StageCall::ResetOrientation);
    }

    fn set_orientation(&mut self, euler: [f32; 3]) {
        self.calls.push(StageCall::SetOrientation(euler));
    }

    fn show_prompt(&mut self, text: Option<&str>) {
        self.calls.push(StageCall::Prompt(text.map(str::to_string)));
    }

    fn poll_events(&mut self) -> Vec<StageEvent> {
        let now = self.clock.now();
        let finished: Vec<usize> = self
            .playing
            .iter()
            .filter(|(_, ends_at)| now >= **ends_at)
            .map(|(player, _)| *player)
            .collect();

        for player in finished {
            self.playing.remove(&player);
            self.events.push_back(StageEvent::PlaybackFinished { player });
            if let Some(video) = self.idle_videos.get(&player).cloned() {
                self.show(player, &video, true);
            }
        }

        self.events.drain(..).collect()
    }
}
