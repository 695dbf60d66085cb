use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::info;

use crate::error::CaptureError;

/// Decoded audio held in memory (f32, interleaved)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn silent(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Copy out frames `[start, end)`, padding with silence past the end of the buffer
    pub fn extract_frames(&self, start: usize, end: usize) -> AudioClip {
        let channels = self.channels.max(1) as usize;
        let end = end.max(start);
        let mut samples = vec![0.0; (end - start) * channels];

        let available_end = end.min(self.frames());
        if start < available_end {
            let src = &self.samples[start * channels..available_end * channels];
            samples[..src.len()].copy_from_slice(src);
        }

        AudioClip {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> AudioClip {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.clone();
        }

        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        AudioClip {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }

    /// Downsample by decimation (keep every Nth frame). Never upsamples.
    pub fn decimate(&self, target_rate: u32) -> AudioClip {
        if target_rate == 0 || self.sample_rate <= target_rate {
            return self.clone();
        }

        let ratio = (self.sample_rate / target_rate) as usize;
        if ratio <= 1 {
            return self.clone();
        }

        let channels = self.channels.max(1) as usize;
        let samples = self
            .samples
            .chunks_exact(channels)
            .step_by(ratio)
            .flatten()
            .copied()
            .collect();

        AudioClip {
            samples,
            sample_rate: self.sample_rate / ratio as u32,
            channels: self.channels,
        }
    }

    /// 16-bit PCM with clipping
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect()
    }

    /// Write a canonical PCM WAV (44-byte header, 16-bit samples)
    pub fn save_wav(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(path.as_ref(), spec)?;
        for sample in self.to_pcm16() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        Ok(())
    }

    pub fn open_wav(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file {}", path.display()))?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Int => reader
                .into_samples::<i16>()
                .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                .collect::<Result<Vec<_>, _>>(),
            SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>(),
        }
        .context("Failed to read audio samples")?;

        let clip = Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        };

        info!(
            "Audio file loaded: {:.2}s, {}Hz, {} channels",
            clip.duration_seconds(),
            clip.sample_rate,
            clip.channels
        );

        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_pads_past_end() {
        let clip = AudioClip {
            samples: vec![0.1, 0.2, 0.3, 0.4],
            sample_rate: 4,
            channels: 1,
        };

        let part = clip.extract_frames(2, 6);
        assert_eq!(part.samples, vec![0.3, 0.4, 0.0, 0.0]);
        assert_eq!(part.duration_seconds(), 1.0);
    }

    #[test]
    fn test_extract_stereo_frames() {
        let clip = AudioClip {
            samples: vec![1.0, -1.0, 0.5, -0.5, 0.25, -0.25],
            sample_rate: 3,
            channels: 2,
        };

        let part = clip.extract_frames(1, 2);
        assert_eq!(part.samples, vec![0.5, -0.5]);
        assert_eq!(part.frames(), 1);
    }

    #[test]
    fn test_mono_and_decimation() {
        let clip = AudioClip {
            samples: vec![0.2, 0.4, 0.6, 0.8, 1.0, 0.0, -1.0, 0.0],
            sample_rate: 32000,
            channels: 2,
        };

        let mono = clip.to_mono();
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.frames(), 4);
        assert!((mono.samples[0] - 0.3).abs() < 1e-6);

        let half = mono.decimate(16000);
        assert_eq!(half.sample_rate, 16000);
        assert_eq!(half.frames(), 2);

        assert_eq!(half.decimate(48000), half, "decimate never upsamples");
    }

    #[test]
    fn test_pcm16_clips_out_of_range() {
        let clip = AudioClip {
            samples: vec![2.0, -2.0, 0.0],
            sample_rate: 16000,
            channels: 1,
        };
        assert_eq!(clip.to_pcm16(), vec![i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn test_saved_wav_has_canonical_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");
        let clip = AudioClip::silent(100, 16000, 1);

        clip.save_wav(&path).unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, 44 + 100 * 2);

        let reopened = AudioClip::open_wav(&path).unwrap();
        assert_eq!(reopened.frames(), 100);
        assert_eq!(reopened.sample_rate, 16000);
    }
}
