// System microphone via cpal (feature "microphone")

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use super::clip::AudioClip;
use super::device::{CaptureDevice, DeviceCapabilities};
use crate::error::CaptureError;

/// Default input device of the default host
pub struct CpalMicrophone {
    device: Option<cpal::Device>,
    name: String,
    channels: u16,
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<cpal::Stream>,
}

impl CpalMicrophone {
    pub fn open_default() -> Self {
        let host = cpal::default_host();
        let device = host.default_input_device();
        let name = device
            .as_ref()
            .and_then(|d| d.name().ok())
            .unwrap_or_else(|| "no input device".to_string());
        let channels = device
            .as_ref()
            .and_then(|d| d.default_input_config().ok())
            .map(|c| c.channels())
            .unwrap_or(1);

        info!("cpal input device: {}", name);

        Self {
            device,
            name,
            channels,
            sample_rate: 0,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        }
    }

    fn backend_error(&self, message: impl ToString) -> CaptureError {
        CaptureError::Backend {
            backend: self.name.clone(),
            message: message.to_string(),
        }
    }
}

impl CaptureDevice for CpalMicrophone {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Option<DeviceCapabilities> {
        let device = self.device.as_ref()?;
        let ranges = device.supported_input_configs().ok()?;
        let (min, max) = ranges.fold((u32::MAX, 0u32), |(min, max), range| {
            (
                min.min(range.min_sample_rate().0),
                max.max(range.max_sample_rate().0),
            )
        });
        Some(if max == 0 {
            DeviceCapabilities {
                min_sample_rate: 0,
                max_sample_rate: 0,
            }
        } else {
            DeviceCapabilities {
                min_sample_rate: min,
                max_sample_rate: max,
            }
        })
    }

    fn start(&mut self, sample_rate: u32, max_duration_secs: f64) -> Result<(), CaptureError> {
        let device = self.device.as_ref().ok_or(CaptureError::NoCaptureDevice)?;

        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let max_samples =
            (max_duration_secs.max(0.0) * sample_rate as f64) as usize * self.channels as usize;
        let buffer = Arc::new(Mutex::new(Vec::with_capacity(max_samples)));
        let sink = Arc::clone(&buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut samples) = sink.lock() {
                        let room = max_samples.saturating_sub(samples.len());
                        samples.extend_from_slice(&data[..data.len().min(room)]);
                    }
                },
                |err| error!("Microphone stream error: {}", err),
                None,
            )
            .map_err(|e| self.backend_error(e))?;
        stream.play().map_err(|e| self.backend_error(e))?;

        self.buffer = buffer;
        self.sample_rate = sample_rate;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<AudioClip, CaptureError> {
        let stream = self.stream.take().ok_or(CaptureError::NotRecording)?;
        drop(stream);

        let samples = self
            .buffer
            .lock()
            .map(|mut b| std::mem::take(&mut *b))
            .map_err(|e| self.backend_error(e))?;

        Ok(AudioClip {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}
