//! OpenAI-compatible Whisper transcription client.
//!
//! Uploads the recording to `/audio/transcriptions` as a multipart form.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::Transcriber;
use crate::error::{GenvizError, Result, TranscriptionFailure};
use crate::http::{self, HttpFailure};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

const NO_AUDIO: &str = "No audio recorded.";
const NOT_UNDERSTOOD: &str = "Sorry, I could not understand the audio. Please try again.";

/// Whisper client configuration.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// ISO-639-1 hint passed to the service.
    pub language: Option<String>,
    pub timeout_secs: u64,
}

impl WhisperConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            language: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Transcriber backed by an OpenAI-compatible Whisper endpoint.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    client: Client,
}

impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Result<Self> {
        let client = http::build_client(Duration::from_secs(config.timeout_secs)).map_err(|e| {
            GenvizError::transcription(
                TranscriptionFailure::ServiceUnavailable,
                format!("Failed to create HTTP client: {e}"),
            )
        })?;
        Ok(Self { config, client })
    }

    fn transcriptions_url(&self) -> String {
        format!("{}/audio/transcriptions", self.config.base_url)
    }

    fn build_form(&self, audio: &[u8]) -> Form {
        let part = Part::bytes(audio.to_vec()).file_name(format!("question.{}", sniff_extension(audio)));
        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "json");
        match &self.config.language {
            Some(language) => form.text("language", language.clone()),
            None => form,
        }
    }

    fn map_failure(failure: HttpFailure) -> GenvizError {
        match failure {
            // The service rejects audio it cannot decode with 400.
            HttpFailure::Status { status, body } if status == StatusCode::BAD_REQUEST => {
                debug!("Transcription rejected: {}", body);
                GenvizError::transcription(TranscriptionFailure::Unrecognized, NOT_UNDERSTOOD)
            }
            HttpFailure::Status { status, .. } => GenvizError::transcription(
                TranscriptionFailure::ServiceUnavailable,
                format!("Could not request results from the service; HTTP {status}"),
            ),
            HttpFailure::Timeout => GenvizError::transcription(
                TranscriptionFailure::ServiceUnavailable,
                "Could not request results from the service; request timed out",
            ),
            HttpFailure::Connect => GenvizError::transcription(
                TranscriptionFailure::ServiceUnavailable,
                "Could not request results from the service; connection failed",
            ),
            HttpFailure::Request(message) => GenvizError::transcription(
                TranscriptionFailure::ServiceUnavailable,
                format!("Could not request results from the service; {message}"),
            ),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        if audio.is_empty() {
            return Err(GenvizError::transcription(
                TranscriptionFailure::Unrecognized,
                NO_AUDIO,
            ));
        }

        let url = self.transcriptions_url();
        let body = http::send_with_retry("Whisper", || {
            self.client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .multipart(self.build_form(audio))
        })
        .await
        .map_err(Self::map_failure)?;

        parse_transcript(&body)
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

fn parse_transcript(body: &str) -> Result<String> {
    let response: TranscriptionResponse = serde_json::from_str(body).map_err(|e| {
        GenvizError::transcription(
            TranscriptionFailure::ServiceUnavailable,
            format!("Failed to parse transcription response: {e}"),
        )
    })?;

    let text = response.text.trim();
    if text.is_empty() {
        return Err(GenvizError::transcription(
            TranscriptionFailure::Unrecognized,
            NOT_UNDERSTOOD,
        ));
    }
    Ok(text.to_string())
}

/// Picks a file extension from the container's magic bytes so the service
/// can choose a decoder. Unknown containers are sent as WAV.
fn sniff_extension(audio: &[u8]) -> &'static str {
    match audio {
        [b'R', b'I', b'F', b'F', ..] => "wav",
        [b'O', b'g', b'g', b'S', ..] => "ogg",
        [b'f', b'L', b'a', b'C', ..] => "flac",
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] => "mp3",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "webm",
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => "m4a",
        _ => "wav",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcriber() -> WhisperTranscriber {
        WhisperTranscriber::new(WhisperConfig::new("sk-test", "whisper-1")).unwrap()
    }

    #[tokio::test]
    async fn test_empty_audio_is_unrecognized() {
        let err = transcriber().transcribe(&[]).await.unwrap_err();
        assert_eq!(
            err,
            GenvizError::transcription(TranscriptionFailure::Unrecognized, NO_AUDIO)
        );
    }

    #[test]
    fn test_parse_transcript() {
        assert_eq!(
            parse_transcript(r#"{"text":"  total sales by day "}"#).unwrap(),
            "total sales by day"
        );
    }

    #[test]
    fn test_blank_transcript_is_unrecognized() {
        let err = parse_transcript(r#"{"text":""}"#).unwrap_err();
        assert!(matches!(
            err,
            GenvizError::Transcription {
                kind: TranscriptionFailure::Unrecognized,
                ..
            }
        ));
    }

    #[test]
    fn test_map_failure_kinds() {
        let rejected = WhisperTranscriber::map_failure(HttpFailure::Status {
            status: StatusCode::BAD_REQUEST,
            body: "Invalid file format".to_string(),
        });
        assert!(matches!(
            rejected,
            GenvizError::Transcription {
                kind: TranscriptionFailure::Unrecognized,
                ..
            }
        ));

        let down = WhisperTranscriber::map_failure(HttpFailure::Connect);
        assert!(matches!(
            down,
            GenvizError::Transcription {
                kind: TranscriptionFailure::ServiceUnavailable,
                ..
            }
        ));
    }

    #[test]
    fn test_sniff_extension() {
        assert_eq!(sniff_extension(b"RIFF\0\0\0\0WAVE"), "wav");
        assert_eq!(sniff_extension(b"OggS\0"), "ogg");
        assert_eq!(sniff_extension(b"ID3\x03"), "mp3");
        assert_eq!(sniff_extension(b"\0\0\0\x20ftypM4A "), "m4a");
        assert_eq!(sniff_extension(b"??"), "wav");
    }

    #[test]
    fn test_transcriptions_url() {
        let config = WhisperConfig::new("k", "whisper-1").with_url("http://localhost:9000/v1/");
        let transcriber = WhisperTranscriber::new(config).unwrap();
        assert_eq!(
            transcriber.transcriptions_url(),
            "http://localhost:9000/v1/audio/transcriptions"
        );
    }
}
