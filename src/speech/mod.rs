//! Speech-to-text for spoken questions.

pub mod mock;
pub mod whisper;

pub use mock::MockTranscriber;
pub use whisper::{WhisperConfig, WhisperTranscriber};

use async_trait::async_trait;

use crate::config::SpeechConfig;
use crate::error::{GenvizError, Result};

/// Turns recorded audio into question text.
///
/// Failures are reported as `GenvizError::Transcription` with either
/// `Unrecognized` (no speech found) or `ServiceUnavailable`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Creates the transcriber named by the speech configuration.
pub fn create_transcriber(config: &SpeechConfig) -> Result<Box<dyn Transcriber>> {
    match config.provider.to_lowercase().as_str() {
        "openai" | "whisper" => {
            let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
                GenvizError::config("No API key configured for speech. Set OPENAI_API_KEY.")
            })?;
            let mut whisper = WhisperConfig::new(api_key, &config.model);
            if let Some(language) = &config.language {
                whisper = whisper.with_language(language);
            }
            if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
                whisper = whisper.with_url(url);
            }
            Ok(Box::new(WhisperTranscriber::new(whisper)?))
        }
        "mock" => Ok(Box::new(MockTranscriber::new())),
        other => Err(GenvizError::config(format!(
            "Unknown speech provider: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_transcriber() {
        let config = SpeechConfig {
            provider: "mock".to_string(),
            ..Default::default()
        };
        assert!(create_transcriber(&config).is_ok());
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = SpeechConfig {
            provider: "pigeon".to_string(),
            ..Default::default()
        };
        let err = create_transcriber(&config).err().unwrap();
        assert!(matches!(err, GenvizError::Config(_)));
    }
}
