pub mod capture;
pub mod clip;
pub mod device;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use capture::{AudioCaptureService, RecordingFinished, StopReason};
pub use clip::AudioClip;
pub use device::{select_sample_rate, CaptureDevice, DeviceCapabilities, SyntheticMicrophone};

#[cfg(feature = "microphone")]
pub use microphone::CpalMicrophone;
