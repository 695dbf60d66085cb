use futures::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audio::AudioClip;
use crate::error::TranscriptionError;
use crate::nats::{NatsClient, TranscriptMessage};

/// Text logged in place of a transcription that failed
pub const TRANSCRIPTION_FAILED: &str = "[ERROR]";

/// Sample rate speech-to-text expects
const STT_SAMPLE_RATE: u32 = 16000;

/// Speech-to-text for recorded responses
///
/// Implementations:
/// - `NatsTranscriber`: publishes the clip to the STT service over NATS
/// - `DisabledTranscriber`: always fails, so every response gets the sentinel
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError>;
}

pub struct DisabledTranscriber;

#[async_trait::async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(&self, _clip: AudioClip) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::Disabled)
    }
}

pub struct NatsTranscriber {
    client: NatsClient,
    timeout: Duration,
}

impl NatsTranscriber {
    pub async fn connect(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = NatsClient::connect(url).await?;
        Ok(Self { client, timeout })
    }

    async fn request(&self, clip: AudioClip) -> anyhow::Result<String> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let clip = clip.to_mono().decimate(STT_SAMPLE_RATE);

        // Subscribe before publishing so a fast reply is not missed
        let mut transcripts = self.client.subscribe_transcripts().await?;
        self.client.publish_clip(&request_id, &clip).await?;

        while let Some(msg) = transcripts.next().await {
            match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                Ok(transcript) if transcript.session_id == request_id && !transcript.partial => {
                    debug!(
                        "Transcript for {} (confidence {:.2})",
                        request_id, transcript.confidence
                    );
                    return Ok(transcript.text.trim().to_string());
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to parse transcript message: {}", e),
            }
        }

        anyhow::bail!("transcript subscription closed")
    }
}

#[async_trait::async_trait]
impl Transcriber for NatsTranscriber {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError> {
        info!("Requesting transcription of {:.2}s response", clip.duration_seconds());

        match tokio::time::timeout(self.timeout, self.request(clip)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(TranscriptionError::Backend(format!("{:#}", e))),
            Err(_) => Err(TranscriptionError::TimedOut(self.timeout.as_secs_f64())),
        }
    }
}
