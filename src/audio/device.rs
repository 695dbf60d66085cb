use std::f32::consts::PI;
use std::sync::Arc;
use tracing::info;

use super::clip::AudioClip;
use crate::clock::Clock;
use crate::error::CaptureError;

/// Sample rates tried in order when the device reports its range
const PREFERRED_SAMPLE_RATES: [u32; 4] = [48000, 44100, 22050, 16000];

/// Used when the device does not report a usable range
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Supported input sample-rate range; `(0, 0)` means the device did not say
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
}

/// Pick the best rate at or below 48 kHz that the device can do.
pub fn select_sample_rate(caps: DeviceCapabilities) -> u32 {
    if caps.min_sample_rate == 0 && caps.max_sample_rate == 0 {
        return FALLBACK_SAMPLE_RATE;
    }
    PREFERRED_SAMPLE_RATES
        .into_iter()
        .find(|rate| caps.max_sample_rate >= *rate)
        .unwrap_or(caps.min_sample_rate)
}

/// Microphone abstraction
///
/// Implementations:
/// - `SyntheticMicrophone`: clock-driven generator for headless runs and tests
/// - `CpalMicrophone` (feature `microphone`): the default system input device
pub trait CaptureDevice {
    /// Device name for logging
    fn name(&self) -> &str;

    /// `None` when no device is present
    fn capabilities(&self) -> Option<DeviceCapabilities>;

    /// Begin capturing into an internal buffer of at most `max_duration_secs`
    fn start(&mut self, sample_rate: u32, max_duration_secs: f64) -> Result<(), CaptureError>;

    /// Halt capture and hand back everything captured since `start`
    fn stop(&mut self) -> Result<AudioClip, CaptureError>;

    fn is_capturing(&self) -> bool;
}

/// Generates a quiet test tone for exactly as long as the clock says it ran.
///
/// `dropped_lead_in_secs` reproduces headsets that deliver silence for the
/// first moments of a capture.
pub struct SyntheticMicrophone {
    clock: Arc<dyn Clock>,
    present: bool,
    channels: u16,
    tone_hz: f32,
    dropped_lead_in_secs: f64,
    capture: Option<(f64, u32, f64)>,
}

impl SyntheticMicrophone {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            present: true,
            channels: 1,
            tone_hz: 440.0,
            dropped_lead_in_secs: 0.0,
            capture: None,
        }
    }

    /// A device slot with nothing plugged in
    pub fn absent(clock: Arc<dyn Clock>) -> Self {
        Self {
            present: false,
            ..Self::new(clock)
        }
    }

    pub fn with_dropped_lead_in(mut self, seconds: f64) -> Self {
        self.dropped_lead_in_secs = seconds;
        self
    }
}

impl CaptureDevice for SyntheticMicrophone {
    fn name(&self) -> &str {
        "synthetic microphone"
    }

    fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.present.then_some(DeviceCapabilities {
            min_sample_rate: 8000,
            max_sample_rate: 48000,
        })
    }

    fn start(&mut self, sample_rate: u32, max_duration_secs: f64) -> Result<(), CaptureError> {
        if !self.present {
            return Err(CaptureError::NoCaptureDevice);
        }
        self.capture = Some((self.clock.now(), sample_rate, max_duration_secs));
        Ok(())
    }

    fn stop(&mut self) -> Result<AudioClip, CaptureError> {
        let (started_at, sample_rate, max_duration) =
            self.capture.take().ok_or(CaptureError::NotRecording)?;

        let elapsed = (self.clock.now() - started_at).clamp(0.0, max_duration);
        let frames = (elapsed * sample_rate as f64) as usize;
        let silent_frames = (self.dropped_lead_in_secs * sample_rate as f64) as usize;

        let mut samples = Vec::with_capacity(frames * self.channels as usize);
        for frame in 0..frames {
            let value = if frame < silent_frames {
                0.0
            } else {
                0.1 * (2.0 * PI * self.tone_hz * frame as f32 / sample_rate as f32).sin()
            };
            for _ in 0..self.channels {
                samples.push(value);
            }
        }

        info!(
            "Synthetic capture stopped: {:.3}s at {}Hz",
            elapsed, sample_rate
        );

        Ok(AudioClip {
            samples,
            sample_rate,
            channels: self.channels,
        })
    }

    fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }
}
