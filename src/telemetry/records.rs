use chrono::{DateTime, Local, Timelike};

use super::csv::LogRecord;

/// Wall-clock timestamp as written in every log row, e.g.
/// `2024-05-01T14:03:27.1234567+02:00`
pub fn format_timestamp(time: DateTime<Local>) -> String {
    format!(
        "{}.{:07}{}",
        time.format("%Y-%m-%dT%H:%M:%S"),
        time.nanosecond() % 1_000_000_000 / 100,
        time.format("%:z")
    )
}

pub fn local_timestamp() -> String {
    format_timestamp(Local::now())
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row of the per-session event log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLogRecord {
    pub timestamp: String,
    /// Seconds since the session was loaded
    pub session_time: f64,
    pub configuration: String,
    pub event_name: String,
    /// 1-based; empty outside the challenge loop
    pub challenge_number: Option<usize>,
    pub videos: [String; 3],
    pub response_audio_file: String,
    pub transcription: String,
    pub transcription_duration_secs: Option<f64>,
}

impl LogRecord for EventLogRecord {
    const SCHEMA: &'static str = "session-events";
    const VERSION: u32 = 1;
    const FIELDS: &'static [&'static str] = &[
        "Timestamp",
        "SessionTime",
        "Configuration",
        "EventName",
        "ChallengeNumber",
        "LeftVideo",
        "MiddleVideo",
        "RightVideo",
        "UserResponseAudioFile",
        "UserResponseTranscription",
        "UserResponseTranscriptionProcessingDurationInSeconds",
    ];

    fn values(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            format!("{:.3}", self.session_time),
            self.configuration.clone(),
            self.event_name.clone(),
            optional(self.challenge_number),
            self.videos[0].clone(),
            self.videos[1].clone(),
            self.videos[2].clone(),
            self.response_audio_file.clone(),
            self.transcription.clone(),
            optional(self.transcription_duration_secs.map(|d| format!("{:.3}", d))),
        ]
    }
}

/// Origin and direction of a gaze ray in headset space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GazeRay {
    pub valid: bool,
    pub origin: [f32; 3],
    pub direction: [f32; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EyeSample {
    pub is_blinking: bool,
    pub pupil_diameter_valid: bool,
    /// Millimetres
    pub pupil_diameter: f32,
    pub position_guide_valid: bool,
    /// Pupil position in the sensor, normalized 0..1
    pub position_guide: [f32; 2],
    pub gaze: GazeRay,
}

/// A single eye-tracker reading
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PupilometrySample {
    pub system_timestamp: i64,
    pub device_timestamp: i64,
    pub left: EyeSample,
    pub right: EyeSample,
    pub convergence_distance_valid: bool,
    pub convergence_distance: f32,
    pub gaze: GazeRay,
}

/// A typed telemetry value, shared by the CSV writer and the network sender
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryValue {
    Long(i64),
    Bool(bool),
    Float(f32),
}

impl std::fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryValue::Long(v) => write!(f, "{}", v),
            TelemetryValue::Bool(v) => write!(f, "{}", v),
            TelemetryValue::Float(v) => write!(f, "{}", v),
        }
    }
}

fn push_ray(out: &mut Vec<TelemetryValue>, ray: &GazeRay) {
    out.push(TelemetryValue::Bool(ray.valid));
    out.extend(ray.origin.iter().map(|v| TelemetryValue::Float(*v)));
    out.extend(ray.direction.iter().map(|v| TelemetryValue::Float(*v)));
}

impl PupilometrySample {
    /// Names of the values returned by `fields()`, in order
    pub const LABELS: &'static [&'static str] = &[
        "PupilometrySystemTimestamp",
        "PupilometryDeviceTimestamp",
        "LeftIsBlinking",
        "RightIsBlinking",
        "LeftPupilDiameterValid",
        "LeftPupilDiameter",
        "RightPupilDiameterValid",
        "RightPupilDiameter",
        "LeftPositionGuideValid",
        "LeftPositionGuideX",
        "LeftPositionGuideY",
        "RightPositionGuideValid",
        "RightPositionGuideX",
        "RightPositionGuideY",
        "LeftGazeRayIsValid",
        "LeftGazeRayOriginX",
        "LeftGazeRayOriginY",
        "LeftGazeRayOriginZ",
        "LeftGazeRayDirectionX",
        "LeftGazeRayDirectionY",
        "LeftGazeRayDirectionZ",
        "RightGazeRayIsValid",
        "RightGazeRayOriginX",
        "RightGazeRayOriginY",
        "RightGazeRayOriginZ",
        "RightGazeRayDirectionX",
        "RightGazeRayDirectionY",
        "RightGazeRayDirectionZ",
        "ConvergenceDistanceIsValid",
        "ConvergenceDistance",
        "GazeRayIsValid",
        "GazeRayOriginX",
        "GazeRayOriginY",
        "GazeRayOriginZ",
        "GazeRayDirectionX",
        "GazeRayDirectionY",
        "GazeRayDirectionZ",
    ];

    pub fn fields(&self) -> Vec<TelemetryValue> {
        let mut out = Vec::with_capacity(Self::LABELS.len());
        out.push(TelemetryValue::Long(self.system_timestamp));
        out.push(TelemetryValue::Long(self.device_timestamp));
        out.push(TelemetryValue::Bool(self.left.is_blinking));
        out.push(TelemetryValue::Bool(self.right.is_blinking));
        for eye in [&self.left, &self.right] {
            out.push(TelemetryValue::Bool(eye.pupil_diameter_valid));
            out.push(TelemetryValue::Float(eye.pupil_diameter));
        }
        for eye in [&self.left, &self.right] {
            out.push(TelemetryValue::Bool(eye.position_guide_valid));
            out.push(TelemetryValue::Float(eye.position_guide[0]));
            out.push(TelemetryValue::Float(eye.position_guide[1]));
        }
        push_ray(&mut out, &self.left.gaze);
        push_ray(&mut out, &self.right.gaze);
        out.push(TelemetryValue::Bool(self.convergence_distance_valid));
        out.push(TelemetryValue::Float(self.convergence_distance));
        push_ray(&mut out, &self.gaze);
        out
    }
}

/// Head orientation as Euler angles in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadRotation {
    pub euler: [f32; 3],
}

/// What a telemetry row carries besides the common columns
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRow {
    Marker,
    Pupilometry(PupilometrySample),
    HeadRotation(HeadRotation),
}

impl From<PupilometrySample> for TelemetryRow {
    fn from(sample: PupilometrySample) -> Self {
        TelemetryRow::Pupilometry(sample)
    }
}

impl From<HeadRotation> for TelemetryRow {
    fn from(rotation: HeadRotation) -> Self {
        TelemetryRow::HeadRotation(rotation)
    }
}

/// One row of a per-challenge telemetry log
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: String,
    pub session_time: f64,
    pub configuration: String,
    pub event_name: String,
    pub challenge_number: Option<usize>,
    pub row: TelemetryRow,
}

const HEAD_ROTATION_FIELDS: usize = 3;

impl LogRecord for TelemetryRecord {
    const SCHEMA: &'static str = "telemetry";
    const VERSION: u32 = 1;
    const FIELDS: &'static [&'static str] = &[
        "Timestamp",
        "SessionTime",
        "Configuration",
        "EventName",
        "ChallengeNumber",
        "HeadRotationEulerX",
        "HeadRotationEulerY",
        "HeadRotationEulerZ",
        "PupilometrySystemTimestamp",
        "PupilometryDeviceTimestamp",
        "LeftIsBlinking",
        "RightIsBlinking",
        "LeftPupilDiameterValid",
        "LeftPupilDiameter",
        "RightPupilDiameterValid",
        "RightPupilDiameter",
        "LeftPositionGuideValid",
        "LeftPositionGuideX",
        "LeftPositionGuideY",
        "RightPositionGuideValid",
        "RightPositionGuideX",
        "RightPositionGuideY",
        "LeftGazeRayIsValid",
        "LeftGazeRayOriginX",
        "LeftGazeRayOriginY",
        "LeftGazeRayOriginZ",
        "LeftGazeRayDirectionX",
        "LeftGazeRayDirectionY",
        "LeftGazeRayDirectionZ",
        "RightGazeRayIsValid",
        "RightGazeRayOriginX",
        "RightGazeRayOriginY",
        "RightGazeRayOriginZ",
        "RightGazeRayDirectionX",
        "RightGazeRayDirectionY",
        "RightGazeRayDirectionZ",
        "ConvergenceDistanceIsValid",
        "ConvergenceDistance",
        "GazeRayIsValid",
        "GazeRayOriginX",
        "GazeRayOriginY",
        "GazeRayOriginZ",
        "GazeRayDirectionX",
        "GazeRayDirectionY",
        "GazeRayDirectionZ",
    ];

    fn values(&self) -> Vec<String> {
        let mut values = vec![
            self.timestamp.clone(),
            format!("{:.3}", self.session_time),
            self.configuration.clone(),
            self.event_name.clone(),
            optional(self.challenge_number),
        ];

        match &self.row {
            TelemetryRow::HeadRotation(rotation) => {
                values.extend(rotation.euler.iter().map(|v| v.to_string()));
            }
            _ => values.extend(std::iter::repeat(String::new()).take(HEAD_ROTATION_FIELDS)),
        }

        match &self.row {
            TelemetryRow::Pupilometry(sample) => {
                values.extend(sample.fields().iter().map(|v| v.to_string()));
            }
            _ => values.extend(
                std::iter::repeat(String::new()).take(PupilometrySample::LABELS.len()),
            ),
        }

        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pupilometry_labels_match_fields() {
        let sample = PupilometrySample::default();
        assert_eq!(sample.fields().len(), PupilometrySample::LABELS.len());
        assert_eq!(
            &TelemetryRecord::FIELDS[8..],
            PupilometrySample::LABELS,
            "telemetry header must end with the pupilometry labels"
        );
    }

    #[test]
    fn test_every_row_kind_fills_every_column() {
        for row in [
            TelemetryRow::Marker,
            TelemetryRow::Pupilometry(PupilometrySample::default()),
            TelemetryRow::HeadRotation(HeadRotation { euler: [1.0, 2.0, 3.0] }),
        ] {
            let record = TelemetryRecord {
                timestamp: String::new(),
                session_time: 0.0,
                configuration: "c".into(),
                event_name: "e".into(),
                challenge_number: Some(1),
                row,
            };
            assert_eq!(record.values().len(), TelemetryRecord::FIELDS.len());
        }

        assert_eq!(
            EventLogRecord::default().values().len(),
            EventLogRecord::FIELDS.len()
        );
    }

    #[test]
    fn test_session_time_has_three_decimals() {
        let record = EventLogRecord {
            session_time: 12.34567,
            challenge_number: Some(2),
            ..Default::default()
        };
        let values = record.values();
        assert_eq!(values[1], "12.346");
        assert_eq!(values[4], "2");
        assert_eq!(values[10], "");
    }

    #[test]
    fn test_timestamp_has_seven_fraction_digits() {
        let time = Local
            .with_ymd_and_hms(2024, 5, 1, 14, 3, 27)
            .single()
            .unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let text = format_timestamp(time);
        assert!(text.starts_with("2024-05-01T14:03:27.1234567"), "{}", text);
        let offset = &text[text.len() - 6..];
        assert!(offset.starts_with('+') || offset.starts_with('-'), "{}", text);
        assert_eq!(&offset[3..4], ":");
    }
}
