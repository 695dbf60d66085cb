use std::sync::Arc;

use super::bus::EventBus;
use super::records::{EyeSample, GazeRay, HeadRotation, PupilometrySample};
use crate::clock::Clock;

/// Stand-in eye tracker and head pose for runs without a headset.
///
/// Pupils oscillate slowly around 3.5 mm and the head sways a few degrees,
/// enough for the telemetry logs and the remote peer to see live data.
pub struct SyntheticTracker {
    clock: Arc<dyn Clock>,
    pupilometry: Arc<EventBus<PupilometrySample>>,
    head_rotation: Arc<EventBus<HeadRotation>>,
}

impl SyntheticTracker {
    pub fn new(
        clock: Arc<dyn Clock>,
        pupilometry: Arc<EventBus<PupilometrySample>>,
        head_rotation: Arc<EventBus<HeadRotation>>,
    ) -> Self {
        Self {
            clock,
            pupilometry,
            head_rotation,
        }
    }

    pub fn sample(&self) -> (PupilometrySample, HeadRotation) {
        let t = self.clock.now();
        let diameter = 3.5 + 0.4 * (t * 0.5).sin() as f32;
        let gaze = GazeRay {
            valid: true,
            origin: [0.0, 0.0, 0.0],
            direction: [0.0, 0.0, 1.0],
        };
        let eye = EyeSample {
            is_blinking: false,
            pupil_diameter_valid: true,
            pupil_diameter: diameter,
            position_guide_valid: true,
            position_guide: [0.5, 0.5],
            gaze,
        };

        let micros = (t * 1_000_000.0) as i64;
        let sample = PupilometrySample {
            system_timestamp: micros,
            device_timestamp: micros,
            left: eye,
            right: eye,
            convergence_distance_valid: true,
            convergence_distance: 1.2,
            gaze,
        };
        let rotation = HeadRotation {
            euler: [2.0 * (t * 0.3).sin() as f32, 3.0 * (t * 0.2).cos() as f32, 0.0],
        };
        (sample, rotation)
    }

    /// Publish one reading on both buses
    pub fn publish(&self) {
        let (sample, rotation) = self.sample();
        self.pupilometry.publish(&sample);
        self.head_rotation.publish(&rotation);
    }
}
