use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub osc: OscConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "listening-effort".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    pub enabled: bool,
    pub listen_port: u16,
    /// Initial client; remote peers can change it with `/set_client_address`
    pub client_ip: String,
    pub client_port: u16,
    pub log_sent_messages: bool,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_port: 7000,
            client_ip: "127.0.0.1".to_string(),
            client_port: 6789,
            log_sent_messages: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureDeviceKind {
    /// Clock-driven test tone
    Synthetic,
    /// Default system input (needs the `microphone` feature)
    Microphone,
    /// No device: exercises the degraded path
    None,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub device: CaptureDeviceKind,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: CaptureDeviceKind::Synthetic,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Sessions are written under `<data_dir>/RecordedSessions`
    pub data_dir: String,
    /// Holds `masking/`, `speech/` and `idle/` video folders
    pub catalogue_dir: String,
    pub preferences_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            catalogue_dir: "videos".to_string(),
            preferences_file: "data/preferences.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionBackend {
    Nats,
    Disabled,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backend: TranscriptionBackend,
    pub nats_url: String,
    pub timeout_secs: f64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: TranscriptionBackend::Disabled,
            nats_url: "nats://localhost:4222".to_string(),
            timeout_secs: 30.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Frame ticks per second
    pub tick_hz: f64,
    pub subject_label: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_hz: 90.0,
            subject_label: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}
