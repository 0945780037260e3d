//! Mock transcriber for testing.

use async_trait::async_trait;
use std::time::Duration;

use super::Transcriber;
use crate::error::{GenvizError, Result, TranscriptionFailure};

/// Returns a fixed transcript, or a fixed failure.
///
/// Audio is interpreted as UTF-8 text when no transcript is configured, which
/// lets the CLI feed a text file through the audio path.
#[derive(Debug, Clone, Default)]
pub struct MockTranscriber {
    transcript: Option<String>,
    failure: Option<GenvizError>,
    delay: Option<Duration>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn failing(mut self, kind: TranscriptionFailure, message: impl Into<String>) -> Self {
        self.failure = Some(GenvizError::transcription(kind, message));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        if let Some(transcript) = &self.transcript {
            return Ok(transcript.clone());
        }

        match std::str::from_utf8(audio).map(str::trim) {
            Ok(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(GenvizError::transcription(
                TranscriptionFailure::Unrecognized,
                "Sorry, I could not understand the audio. Please try again.",
            )),
        }
    }
}
