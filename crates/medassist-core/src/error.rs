//! Error types for MedAssist.

use std::fmt;

use thiserror::Error;

/// Failure reported by an external HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    /// HTTP status, if the service answered at all.
    pub status: Option<u16>,
    pub message: String,
    /// Whether a retry has a reasonable chance of succeeding.
    pub transient: bool,
}

impl ServiceFailure {
    /// The request never got a response (connect/reset/DNS).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            transient: true,
        }
    }

    /// The service answered with a non-success status.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: body.into(),
            transient: status == 429 || status >= 500,
        }
    }

    /// The service answered successfully but the payload was unusable.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            transient: false,
        }
    }
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("Invalid chunking config: {0}")]
    InvalidChunkingConfig(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(ServiceFailure),

    #[error("Index service error: {0}")]
    IndexService(ServiceFailure),

    #[error("Generation service error: {0}")]
    GenerationService(ServiceFailure),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Cannot {action} while session is in stage {stage}")]
    InvalidTransition { stage: String, action: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the retry policy should try the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::EmbeddingService(f) | Error::IndexService(f) | Error::GenerationService(f) => {
                f.transient
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
