use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::catalogue::VideoCatalogue;
use crate::error::ValidationError;

pub const MASKER_COUNT: usize = 4;
pub const SCREEN_COUNT: usize = 3;
pub const VIDEOS_PER_CHALLENGE: usize = 3;

/// Calibration durations at or below this are treated as "no calibration"
const CALIBRATION_EPSILON: f32 = 0.0001;

/// A spatialized babble source
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Masker {
    /// Rotation around the vertical axis, degrees
    pub rotation: f32,
    /// Linear gain, 0.0 - 1.0
    pub amplitude: f32,
}

/// Placement of a screen relative to the subject
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScreenTransform {
    #[serde(default)]
    pub inclination: f32,
    #[serde(default)]
    pub azimuth: f32,
    #[serde(default)]
    pub twist: f32,
    #[serde(rename = "rotation on x axis", default)]
    pub rotation_x: f32,
    #[serde(rename = "rotation on y axis", default)]
    pub rotation_y: f32,
    #[serde(rename = "scale width", default = "unit_scale")]
    pub scale_width: f32,
    #[serde(rename = "scale height", default = "unit_scale")]
    pub scale_height: f32,
}

fn unit_scale() -> f32 {
    1.0
}

impl Default for ScreenTransform {
    fn default() -> Self {
        Self {
            inclination: 0.0,
            azimuth: 0.0,
            twist: 0.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            scale_width: 1.0,
            scale_height: 1.0,
        }
    }
}

impl ScreenTransform {
    /// Field order used on the wire and in the preference store
    pub fn to_array(&self) -> [f32; 7] {
        [
            self.inclination,
            self.azimuth,
            self.twist,
            self.rotation_x,
            self.rotation_y,
            self.scale_width,
            self.scale_height,
        ]
    }

    pub fn from_array(v: [f32; 7]) -> Self {
        Self {
            inclination: v[0],
            azimuth: v[1],
            twist: v[2],
            rotation_x: v[3],
            rotation_y: v[4],
            scale_width: v[5],
            scale_height: v[6],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoScreen {
    #[serde(rename = "idle video")]
    pub idle_video: String,
    #[serde(flatten)]
    pub transform: ScreenTransform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessCalibration {
    pub duration_black_to_white: f32,
    pub duration_hold_on_white: f32,
}

/// Validated, immutable description of one trial script.
#[derive(Debug, Clone)]
pub struct SessionDescription {
    pub name: String,
    pub speaker_amplitude: f32,
    pub masking_video: String,
    pub maskers: Vec<Masker>,
    pub video_screens: Vec<VideoScreen>,
    pub challenges: Vec<[String; VIDEOS_PER_CHALLENGE]>,
    pub delay_before_playing_videos: f32,
    pub delay_after_playing_videos: f32,
    pub recording_duration: f32,
    pub play_maskers_continuously: bool,
    pub brightness_calibration: Option<BrightnessCalibration>,
    pub user_interface_texts: BTreeMap<String, String>,
    /// Script text exactly as read, archived beside the session logs
    pub source: String,
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    session: RawSession,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    #[serde(rename = "speaker amplitude")]
    speaker_amplitude: f32,
    #[serde(rename = "masking video")]
    masking_video: String,
    maskers: Vec<Masker>,
    #[serde(rename = "video screens")]
    video_screens: Vec<VideoScreen>,
    challenges: Vec<Vec<String>>,
    #[serde(rename = "delay before playing videos", default)]
    delay_before_playing_videos: f32,
    #[serde(rename = "delay after playing videos", default)]
    delay_after_playing_videos: f32,
    #[serde(rename = "recording duration")]
    recording_duration: f32,
    #[serde(rename = "play maskers continuously", default)]
    play_maskers_continuously: bool,
    #[serde(rename = "brightness calibration duration from black to white", default)]
    brightness_black_to_white: f32,
    #[serde(rename = "brightness calibration duration to hold on white", default)]
    brightness_hold_on_white: f32,
    #[serde(rename = "user interface texts", default)]
    user_interface_texts: BTreeMap<String, String>,
}

impl SessionDescription {
    /// Read, parse and validate a script file.
    ///
    /// Has no side effects beyond reading `path`.
    pub fn load(
        path: impl AsRef<Path>,
        catalogue: &VideoCatalogue,
    ) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ValidationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let description = Self::parse(&name, &text, catalogue)?;
        info!(
            "Loaded session script {} ({} challenges)",
            path.display(),
            description.challenges.len()
        );
        Ok(description)
    }

    /// Parse and validate script text; `name` is usually the file stem.
    pub fn parse(
        name: &str,
        text: &str,
        catalogue: &VideoCatalogue,
    ) -> Result<Self, ValidationError> {
        let raw: ScriptFile = serde_yaml::from_str(text)?;
        let raw = raw.session;

        let mut problems = Vec::new();

        if !(raw.speaker_amplitude > 0.0 && raw.speaker_amplitude.is_finite()) {
            problems.push(format!(
                "'speaker amplitude' must be greater than 0 (got {})",
                raw.speaker_amplitude
            ));
        }
        if raw.masking_video.trim().is_empty() {
            problems.push("'masking video' must not be empty".to_string());
        }
        if raw.maskers.len() != MASKER_COUNT {
            problems.push(format!(
                "the 'maskers' array must have exactly {} elements (got {})",
                MASKER_COUNT,
                raw.maskers.len()
            ));
        }
        for (i, masker) in raw.maskers.iter().enumerate() {
            if !(0.0..=1.0).contains(&masker.amplitude) {
                problems.push(format!(
                    "masker {} amplitude must be between 0.0 and 1.0 (got {})",
                    i, masker.amplitude
                ));
            }
            if !masker.rotation.is_finite() {
                problems.push(format!(
                    "masker {} rotation must be a finite number (got {})",
                    i, masker.rotation
                ));
            }
        }
        if raw.video_screens.len() != SCREEN_COUNT {
            problems.push(format!(
                "the 'video screens' array must have exactly {} elements (got {})",
                SCREEN_COUNT,
                raw.video_screens.len()
            ));
        }
        for (i, screen) in raw.video_screens.iter().enumerate() {
            if screen.idle_video.trim().is_empty() {
                problems.push(format!("video screen {} has an empty 'idle video'", i));
            }
            if screen.transform.to_array().iter().any(|v| !v.is_finite()) {
                problems.push(format!("video screen {} has a non-finite transform value", i));
            }
        }
        if raw.challenges.is_empty() {
            problems.push("there must be at least one challenge".to_string());
        }
        for (i, challenge) in raw.challenges.iter().enumerate() {
            if challenge.len() != VIDEOS_PER_CHALLENGE {
                problems.push(format!(
                    "challenge {} must list exactly {} videos (got {})",
                    i + 1,
                    VIDEOS_PER_CHALLENGE,
                    challenge.len()
                ));
            } else if challenge.iter().any(|v| v.trim().is_empty()) {
                problems.push(format!("challenge {} has an empty video name", i + 1));
            }
        }
        for (label, value) in [
            ("delay before playing videos", raw.delay_before_playing_videos),
            ("delay after playing videos", raw.delay_after_playing_videos),
            ("recording duration", raw.recording_duration),
        ] {
            if !value.is_finite() {
                problems.push(format!("'{}' must be a finite number (got {})", label, value));
            } else if value < 0.0 {
                problems.push(format!("'{}' must not be negative (got {})", label, value));
            }
        }
        // Zero or negative calibration durations just disable calibration
        for (label, value) in [
            (
                "brightness calibration duration from black to white",
                raw.brightness_black_to_white,
            ),
            (
                "brightness calibration duration to hold on white",
                raw.brightness_hold_on_white,
            ),
        ] {
            if !value.is_finite() {
                problems.push(format!("'{}' must be a finite number (got {})", label, value));
            }
        }

        if !problems.is_empty() {
            error!("Session script rejected: {}", problems.join("; "));
            return Err(ValidationError::Invalid { problems });
        }

        let missing: Vec<String> = raw
            .challenges
            .iter()
            .flatten()
            .chain(raw.video_screens.iter().map(|s| &s.idle_video))
            .chain(std::iter::once(&raw.masking_video))
            .filter(|video| !catalogue.contains(video))
            .fold(Vec::new(), |mut acc, video| {
                if !acc.contains(video) {
                    acc.push(video.clone());
                }
                acc
            });
        if !missing.is_empty() {
            catalogue.log_names();
            error!("Session script references unknown videos: {}", missing.join(", "));
            return Err(ValidationError::MissingVideos { names: missing });
        }

        let brightness_calibration = (raw.brightness_black_to_white > CALIBRATION_EPSILON
            && raw.brightness_hold_on_white > CALIBRATION_EPSILON)
            .then_some(BrightnessCalibration {
                duration_black_to_white: raw.brightness_black_to_white,
                duration_hold_on_white: raw.brightness_hold_on_white,
            });

        let challenges = raw
            .challenges
            .into_iter()
            .map(|c| [c[0].clone(), c[1].clone(), c[2].clone()])
            .collect();

        let description = Self {
            name: if name.is_empty() {
                "(untitled)".to_string()
            } else {
                name.to_string()
            },
            speaker_amplitude: raw.speaker_amplitude,
            masking_video: raw.masking_video,
            maskers: raw.maskers,
            video_screens: raw.video_screens,
            challenges,
            delay_before_playing_videos: raw.delay_before_playing_videos,
            delay_after_playing_videos: raw.delay_after_playing_videos,
            recording_duration: raw.recording_duration,
            play_maskers_continuously: raw.play_maskers_continuously,
            brightness_calibration,
            user_interface_texts: raw.user_interface_texts,
            source: text.to_string(),
        };
        debug_assert!(description.invariant());

        Ok(description)
    }

    pub fn invariant(&self) -> bool {
        self.speaker_amplitude > 0.0
            && !self.masking_video.is_empty()
            && self.maskers.len() == MASKER_COUNT
            && self.video_screens.len() == SCREEN_COUNT
            && !self.challenges.is_empty()
            && self
                .challenges
                .iter()
                .all(|c| c.iter().all(|v| !v.is_empty()))
    }

    /// UI text lookup with a fallback for keys the script does not override
    pub fn ui_text<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.user_interface_texts
            .get(key)
            .map(String::as_str)
            .unwrap_or(fallback)
    }
}
