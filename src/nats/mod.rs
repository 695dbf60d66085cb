pub mod client;
pub mod messages;

pub use client::{NatsClient, FINAL_TRANSCRIPT_SUBJECT};
pub use messages::{AudioFrameMessage, TranscriptMessage};
