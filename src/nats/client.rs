use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use tracing::{debug, info};

use super::messages::AudioFrameMessage;
use crate::audio::AudioClip;

/// Subject the STT service publishes finished transcripts on
pub const FINAL_TRANSCRIPT_SUBJECT: &str = "stt.text.final";

#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Publish a whole response clip as one final audio frame
    pub async fn publish_clip(&self, request_id: &str, clip: &AudioClip) -> Result<()> {
        let subject = format!("audio.frame.trial-{}", request_id);

        let pcm_bytes: Vec<u8> = clip
            .to_pcm16()
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        let message = AudioFrameMessage {
            session_id: request_id.to_string(),
            pcm: base64::engine::general_purpose::STANDARD.encode(&pcm_bytes),
            sample_rate: clip.sample_rate,
            channels: clip.channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: true,
            chunk_index: 0,
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish audio frame")?;

        debug!(
            "Published response audio to {} (bytes={})",
            subject,
            pcm_bytes.len()
        );

        Ok(())
    }

    /// Subscribe to final transcripts; callers filter by `session_id`
    pub async fn subscribe_transcripts(&self) -> Result<async_nats::Subscriber> {
        let subscriber = self
            .client
            .subscribe(FINAL_TRANSCRIPT_SUBJECT)
            .await
            .context("Failed to subscribe to transcripts")?;

        debug!("Subscribed to {}", FINAL_TRANSCRIPT_SUBJECT);

        Ok(subscriber)
    }
}
