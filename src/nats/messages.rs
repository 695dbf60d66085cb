use serde::{Deserialize, Serialize};

/// Recorded response published to NATS for speech-to-text
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    /// Request identifier, echoed back in the transcript
    pub session_id: String,
    pub pcm: String, // Base64-encoded 16-bit little-endian PCM
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
    pub chunk_index: u32,
}

/// Transcript message received from the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_flag_is_renamed() {
        let message = AudioFrameMessage {
            session_id: "req-1".into(),
            pcm: String::new(),
            sample_rate: 16000,
            channels: 1,
            timestamp: "2024-01-01T00:00:00Z".into(),
            final_frame: true,
            chunk_index: 0,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["final"], true);
        assert!(json.get("final_frame").is_none());
    }

    #[test]
    fn test_transcript_without_confidence() {
        let json = r#"{"session_id":"req-1","text":"hello","partial":false,"timestamp":"t"}"#;
        let message: TranscriptMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.text, "hello");
        assert_eq!(message.confidence, 0.0);
    }
}
