//! Error types for genviz.
//!
//! Defines the error taxonomy shared by the collaborators and the query session.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a transcription failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionFailure {
    /// The audio was received but no speech could be recognized in it.
    Unrecognized,
    /// The speech service could not be reached, rejected the request, or timed out.
    ServiceUnavailable,
}

impl fmt::Display for TranscriptionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized => write!(f, "unrecognized"),
            Self::ServiceUnavailable => write!(f, "service unavailable"),
        }
    }
}

/// Why a query execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// The database rejected the statement as malformed.
    Syntax,
    /// The statement did not complete within the configured bound.
    Timeout,
    /// The connected user lacks the privileges to run the statement.
    Permission,
    /// Anything else reported by the driver.
    Other,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Timeout => write!(f, "timeout"),
            Self::Permission => write!(f, "permission"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Main error type for genviz operations.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", content = "detail", rename_all = "snake_case")]
pub enum GenvizError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failures while listing relations or their columns.
    #[error("Schema introspection error: {0}")]
    SchemaIntrospection(String),

    /// Speech-to-text failures.
    #[error("Transcription error ({kind}): {message}")]
    Transcription {
        kind: TranscriptionFailure,
        message: String,
    },

    /// Natural-language to SQL translation failures (model API errors, timeouts, etc.)
    #[error("Translation error: {0}")]
    Translation(String),

    /// Query execution failures.
    #[error("Execution error ({kind}): {message}")]
    Execution {
        kind: ExecutionFailure,
        message: String,
    },

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenvizError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a schema introspection error with the given message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaIntrospection(msg.into())
    }

    /// Creates a transcription error of the given kind.
    pub fn transcription(kind: TranscriptionFailure, msg: impl Into<String>) -> Self {
        Self::Transcription {
            kind,
            message: msg.into(),
        }
    }

    /// Creates a translation error with the given message.
    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation(msg.into())
    }

    /// Creates an execution error of the given kind.
    pub fn execution(kind: ExecutionFailure, msg: impl Into<String>) -> Self {
        Self::Execution {
            kind,
            message: msg.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::SchemaIntrospection(_) => "Schema Error",
            Self::Transcription { .. } => "Transcription Error",
            Self::Translation(_) => "Translation Error",
            Self::Execution { .. } => "Execution Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true if the error reports an exceeded time bound.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Execution { kind, .. } => *kind == ExecutionFailure::Timeout,
            Self::Transcription { message, .. } => message.contains("timed out"),
            Self::Translation(message) => message.contains("timed out"),
            _ => false,
        }
    }
}

/// Result type alias using GenvizError.
pub type Result<T> = std::result::Result<T, GenvizError>;
