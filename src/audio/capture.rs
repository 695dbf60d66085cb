use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::clip::AudioClip;
use super::device::{select_sample_rate, CaptureDevice};
use crate::clock::Clock;
use crate::error::CaptureError;

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    Watchdog,
}

/// Raised once per recording, after the trimmed clip is on disk
#[derive(Debug, Clone)]
pub struct RecordingFinished {
    pub path: PathBuf,
    pub clip: AudioClip,
    pub in_point: f64,
    pub out_point: f64,
    pub reason: StopReason,
}

/// The one recording that may be in flight
struct ActiveRecording {
    filename: String,
    started_at: f64,
    in_offset: f64,
    /// Watchdog: the recording is force-closed once this much time has passed
    max_duration: f64,
}

/// Owns the microphone and turns start / mark / stop calls into trimmed WAV files.
///
/// Capture is started early because some headsets drop the first seconds of
/// audio; `mark_recording_in_point` later records where the useful part
/// begins and everything before it is discarded on save.
pub struct AudioCaptureService {
    device: Box<dyn CaptureDevice>,
    clock: Arc<dyn Clock>,
    save_directory: PathBuf,
    sample_rate: Option<u32>,
    active: Option<ActiveRecording>,
    finished: VecDeque<RecordingFinished>,
}

impl AudioCaptureService {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        clock: Arc<dyn Clock>,
        save_directory: impl Into<PathBuf>,
    ) -> Self {
        let sample_rate = match device.capabilities() {
            Some(caps) => {
                let rate = select_sample_rate(caps);
                info!(
                    "Using capture device {} (min {}Hz, max {}Hz) at {}Hz",
                    device.name(),
                    caps.min_sample_rate,
                    caps.max_sample_rate,
                    rate
                );
                Some(rate)
            }
            None => {
                warn!("No capture device found ({})", device.name());
                None
            }
        };

        Self {
            device,
            clock,
            save_directory: save_directory.into(),
            sample_rate,
            active: None,
            finished: VecDeque::new(),
        }
    }

    pub fn has_device(&self) -> bool {
        self.sample_rate.is_some()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn save_directory(&self) -> &Path {
        &self.save_directory
    }

    pub fn set_save_directory(&mut self, dir: impl Into<PathBuf>) {
        self.save_directory = dir.into();
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Start a new recording, closing any recording already in progress.
    pub fn start_recording(
        &mut self,
        filename: &str,
        max_duration_secs: f64,
    ) -> Result<(), CaptureError> {
        debug_assert!(!filename.is_empty());

        let Some(sample_rate) = self.sample_rate else {
            error!("Can't start recording {} as no microphone was found", filename);
            return Err(CaptureError::NoCaptureDevice);
        };

        if !self.save_directory.exists() {
            fs::create_dir_all(&self.save_directory)?;
        }

        self.stop_recording()?;

        self.device.start(sample_rate, max_duration_secs)?;
        self.active = Some(ActiveRecording {
            filename: filename.to_string(),
            started_at: self.clock.now(),
            in_offset: 0.0,
            max_duration: max_duration_secs.max(0.0),
        });

        info!(
            "Recording {} started (max {:.1}s at {}Hz)",
            filename, max_duration_secs, sample_rate
        );

        Ok(())
    }

    /// Mark "now" as the start of the useful audio. The last call wins.
    pub fn mark_recording_in_point(&mut self) -> Result<(), CaptureError> {
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(CaptureError::NotRecording)?;
        active.in_offset = now - active.started_at;
        debug!("Recording in-point marked at {:.3}s", active.in_offset);
        Ok(())
    }

    /// Close the current recording. Does nothing when idle.
    pub fn stop_recording(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            info!("Recording ending by stop request");
            self.close_recording(StopReason::Requested)?;
        }
        Ok(())
    }

    /// Force-close the recording once its maximum duration has elapsed.
    ///
    /// Call once per tick.
    pub fn poll_watchdog(&mut self) -> Result<(), CaptureError> {
        let expired = self
            .active
            .as_ref()
            .map(|a| self.clock.now() - a.started_at >= a.max_duration)
            .unwrap_or(false);

        if expired {
            info!("Recording ending by timeout");
            self.close_recording(StopReason::Watchdog)?;
        }
        Ok(())
    }

    /// Next "recording finished" event, if any
    pub fn take_finished(&mut self) -> Option<RecordingFinished> {
        self.finished.pop_front()
    }

    fn close_recording(&mut self, reason: StopReason) -> Result<(), CaptureError> {
        // Taken first so the watchdog can never close the same recording twice
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        let captured = self.device.stop()?;

        let out_point = (self.clock.now() - active.started_at)
            .max(0.0)
            .min(active.max_duration);
        let in_point = active.in_offset.min(out_point);

        let rate = captured.sample_rate as f64;
        let in_frame = (in_point * rate) as usize;
        let out_frame = (out_point * rate) as usize;
        let trimmed = captured.extract_frames(in_frame, out_frame);

        let path = self.save_directory.join(&active.filename);
        trimmed.save_wav(&path)?;

        info!(
            "{:.3} seconds recorded and saved to {}. In point: {:.3}. Out point: {:.3}",
            trimmed.duration_seconds(),
            path.display(),
            in_point,
            out_point
        );

        self.finished.push_back(RecordingFinished {
            path,
            clip: trimmed,
            in_point,
            out_point,
            reason,
        });

        Ok(())
    }
}

impl Drop for AudioCaptureService {
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(e) = self.close_recording(StopReason::Requested) {
                warn!("Failed to close recording on drop: {}", e);
            }
        }
    }
}
