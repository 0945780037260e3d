//! The query session state machine.
//!
//! `QuerySession` is a plain value: events go in through [`QuerySession::apply`]
//! and either advance the phase or are rejected without touching the session.
//! Nothing here performs I/O; the actor decides which collaborator to call
//! for the phase the session is in.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::chart::{ChartSpec, ResultSet};
use crate::classifier::Classification;
use crate::error::{ExecutionFailure, GenvizError, TranscriptionFailure};

use super::tracker::SessionId;

/// Where a session is in the question pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Transcribing,
    Translating,
    Classifying,
    Executing,
    Visualizing,
    Done,
    Failed,
}

impl Phase {
    /// Done and Failed accept no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Transcribing => "transcribing",
            Self::Translating => "translating",
            Self::Classifying => "classifying",
            Self::Executing => "executing",
            Self::Visualizing => "visualizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// A question as the user asked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    Text(String),
    /// Recorded speech, opaque until transcribed.
    Audio(Vec<u8>),
}

impl Question {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio(_))
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    QuestionSubmitted(Question),
    TranscriptionOk(String),
    TranscriptionFailed {
        kind: TranscriptionFailure,
        message: String,
    },
    TranslationOk(String),
    TranslationFailed(String),
    Classified(Classification),
    ExecutionOk {
        result_set: ResultSet,
        /// Set when the executor dropped rows past its cap.
        truncation: Option<String>,
    },
    ExecutionFailed {
        kind: ExecutionFailure,
        message: String,
    },
    ChartComputed(ChartSpec),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::QuestionSubmitted(_) => "QuestionSubmitted",
            Self::TranscriptionOk(_) => "TranscriptionOk",
            Self::TranscriptionFailed { .. } => "TranscriptionFailed",
            Self::TranslationOk(_) => "TranslationOk",
            Self::TranslationFailed(_) => "TranslationFailed",
            Self::Classified(_) => "Classified",
            Self::ExecutionOk { .. } => "ExecutionOk",
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::ChartComputed(_) => "ChartComputed",
        }
    }

    /// Maps a transcriber error to a failure event.
    ///
    /// Errors outside the transcription taxonomy count as the service being
    /// unavailable.
    pub fn transcription_failed(error: GenvizError) -> Self {
        match error {
            GenvizError::Transcription { kind, message } => Self::TranscriptionFailed { kind, message },
            other => Self::TranscriptionFailed {
                kind: TranscriptionFailure::ServiceUnavailable,
                message: other.to_string(),
            },
        }
    }

    pub fn translation_failed(error: GenvizError) -> Self {
        match error {
            GenvizError::Translation(message) => Self::TranslationFailed(message),
            other => Self::TranslationFailed(other.to_string()),
        }
    }

    pub fn execution_failed(error: GenvizError) -> Self {
        match error {
            GenvizError::Execution { kind, message } => Self::ExecutionFailed { kind, message },
            other => Self::ExecutionFailed {
                kind: ExecutionFailure::Other,
                message: other.to_string(),
            },
        }
    }
}

/// An event arrived that the current phase does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event} is not valid while the session is {phase}")]
pub struct InvalidTransition {
    pub phase: Phase,
    pub event: &'static str,
}

/// One question and everything derived from it.
#[derive(Debug, Clone, Default)]
pub struct QuerySession {
    pub phase: Phase,
    pub question: Option<Question>,
    /// Text recognized from an audio question.
    pub transcript: Option<String>,
    /// Raw translator output, replaced by the cleaned text once classified.
    pub generated_sql: Option<String>,
    pub classification: Option<Classification>,
    pub result_set: Option<ResultSet>,
    pub truncation: Option<String>,
    pub chart_spec: Option<ChartSpec>,
    pub error: Option<GenvizError>,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session that has already accepted `question`.
    pub fn for_question(question: Question) -> Self {
        let phase = if question.is_audio() {
            Phase::Transcribing
        } else {
            Phase::Translating
        };
        Self {
            phase,
            question: Some(question),
            ..Self::default()
        }
    }

    /// The text to translate: the typed question, or the transcript of an
    /// audio question once it exists.
    pub fn question_text(&self) -> Option<&str> {
        match &self.question {
            Some(Question::Text(text)) => Some(text),
            Some(Question::Audio(_)) => self.transcript.as_deref(),
            None => None,
        }
    }

    /// Applies an event and returns the new phase.
    ///
    /// A rejected event leaves the session exactly as it was.
    pub fn apply(&mut self, event: SessionEvent) -> Result<Phase, InvalidTransition> {
        use SessionEvent as E;

        match (self.phase, event) {
            (Phase::Idle, E::QuestionSubmitted(question)) => {
                *self = Self::for_question(question);
            }
            (Phase::Transcribing, E::TranscriptionOk(text)) => {
                self.transcript = Some(text);
                self.phase = Phase::Translating;
            }
            (Phase::Transcribing, E::TranscriptionFailed { kind, message }) => {
                self.fail(GenvizError::transcription(kind, message));
            }
            (Phase::Translating, E::TranslationOk(raw)) => {
                self.generated_sql = Some(raw);
                self.phase = Phase::Classifying;
            }
            (Phase::Translating, E::TranslationFailed(message)) => {
                self.fail(GenvizError::translation(message));
            }
            (Phase::Classifying, E::Classified(classification)) => {
                self.generated_sql = Some(classification.text().to_string());
                self.phase = if classification.is_executable() {
                    Phase::Executing
                } else {
                    Phase::Done
                };
                self.classification = Some(classification);
            }
            (Phase::Executing, E::ExecutionOk { result_set, truncation }) => {
                self.result_set = Some(result_set);
                self.truncation = truncation;
                self.phase = Phase::Visualizing;
            }
            (Phase::Executing, E::ExecutionFailed { kind, message }) => {
                self.fail(GenvizError::execution(kind, message));
            }
            (Phase::Visualizing, E::ChartComputed(spec)) => {
                self.chart_spec = Some(spec);
                self.phase = Phase::Done;
            }
            (phase, event) => {
                return Err(InvalidTransition {
                    phase,
                    event: event.name(),
                })
            }
        }

        Ok(self.phase)
    }

    fn fail(&mut self, error: GenvizError) {
        self.error = Some(error);
        self.phase = Phase::Failed;
    }

    /// Read-only copy for the host.
    pub fn snapshot(&self, id: SessionId) -> SessionSnapshot {
        let (question, audio_bytes) = match &self.question {
            Some(Question::Text(text)) => (Some(text.clone()), None),
            Some(Question::Audio(bytes)) => (None, Some(bytes.len())),
            None => (None, None),
        };

        SessionSnapshot {
            id,
            phase: self.phase,
            question,
            audio_bytes,
            transcript: self.transcript.clone(),
            sql: self.generated_sql.clone(),
            classification: self.classification.clone(),
            result_set: self.result_set.clone(),
            truncation: self.truncation.clone(),
            chart_title: self.chart_spec.as_ref().and_then(ChartSpec::title),
            chart: self.chart_spec.clone(),
            error: self.error.clone(),
        }
    }
}

/// What the host sees of the current session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub sql: Option<String>,
    pub classification: Option<Classification>,
    pub result_set: Option<ResultSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<String>,
    pub chart: Option<ChartSpec>,
    pub chart_title: Option<String>,
    pub error: Option<GenvizError>,
}

impl SessionSnapshot {
    /// The question as text: typed, or transcribed from audio.
    pub fn question_text(&self) -> Option<&str> {
        self.question.as_deref().or(self.transcript.as_deref())
    }
}
