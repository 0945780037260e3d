//! Stage runners for the question pipeline.
//!
//! Each stage calls one collaborator under a time bound and reports the
//! outcome as a [`SessionEvent`]; errors never escape as `Err`.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::state::SessionEvent;
use crate::chart::{ChartSelector, ResultSet};
use crate::classifier::classify;
use crate::config::TimeoutConfig;
use crate::db::DatabaseClient;
use crate::error::{ExecutionFailure, TranscriptionFailure};
use crate::llm::{TranslationRequest, Translator};
use crate::speech::Transcriber;

/// Upper bounds for the three suspending stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub transcription: Duration,
    pub translation: Duration,
    pub execution: Duration,
}

impl From<&TimeoutConfig> for StageTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            transcription: config.transcription(),
            translation: config.translation(),
            execution: config.execution(),
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// The collaborators a session drives, shared by every stage task.
#[derive(Clone)]
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    execution_gate: Arc<Mutex<()>>,
    selector: ChartSelector,
    timeouts: StageTimeouts,
}

impl Pipeline {
    pub fn new(transcriber: Arc<dyn Transcriber>, translator: Arc<dyn Translator>) -> Self {
        Self {
            transcriber,
            translator,
            execution_gate: Arc::new(Mutex::new(())),
            selector: ChartSelector::default(),
            timeouts: StageTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_selector(mut self, selector: ChartSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    pub async fn transcribe(&self, audio: Vec<u8>) -> SessionEvent {
        let bound = self.timeouts.transcription;
        match timeout(bound, self.transcriber.transcribe(&audio)).await {
            Ok(Ok(text)) => SessionEvent::TranscriptionOk(text),
            Ok(Err(e)) => SessionEvent::transcription_failed(e),
            Err(_) => SessionEvent::TranscriptionFailed {
                kind: TranscriptionFailure::ServiceUnavailable,
                message: format!("Transcription timed out after {}.", format_bound(bound)),
            },
        }
    }

    pub async fn translate(&self, request: TranslationRequest) -> SessionEvent {
        if request.question.trim().is_empty() {
            return SessionEvent::TranslationFailed("Please ask a question.".to_string());
        }

        let bound = self.timeouts.translation;
        match timeout(bound, self.translator.translate(&request)).await {
            Ok(Ok(raw)) => SessionEvent::TranslationOk(raw),
            Ok(Err(e)) => SessionEvent::translation_failed(e),
            Err(_) => SessionEvent::TranslationFailed(format!(
                "Translation timed out after {}.",
                format_bound(bound)
            )),
        }
    }

    pub fn classify(raw: &str) -> SessionEvent {
        SessionEvent::Classified(classify(raw))
    }

    /// Runs `sql`, one statement at a time across all sessions.
    pub async fn execute(&self, db: Arc<dyn DatabaseClient>, sql: String) -> SessionEvent {
        let _gate = self.execution_gate.lock().await;
        let bound = self.timeouts.execution;
        let started = Instant::now();

        let event = match timeout(bound, db.execute_query(&sql)).await {
            Ok(Ok(result)) => SessionEvent::ExecutionOk {
                truncation: result.truncation_warning(),
                result_set: ResultSet::from(result),
            },
            Ok(Err(e)) => SessionEvent::execution_failed(e),
            Err(_) => SessionEvent::ExecutionFailed {
                kind: ExecutionFailure::Timeout,
                message: format!("Query timed out after {}.", format_bound(bound)),
            },
        };

        debug!("Execution finished in {:?}", started.elapsed());
        event
    }

    pub fn visualize(&self, result_set: &ResultSet) -> SessionEvent {
        SessionEvent::ChartComputed(self.selector.select(result_set))
    }
}

fn format_bound(bound: Duration) -> String {
    if bound.subsec_millis() == 0 {
        format!("{}s", bound.as_secs())
    } else {
        format!("{}ms", bound.as_millis())
    }
}
