//! Unified error types for Quizpilot

use crate::types::ProviderId;
use thiserror::Error;

/// Unified error type for all Quizpilot operations
#[derive(Error, Debug)]
pub enum QuizError {
    // Configuration errors (fatal to a session)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential for provider: {0}")]
    MissingCredential(ProviderId),

    // Provider errors
    #[error("Provider transport error: {0}")]
    Transport(String),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: ProviderId,
        status: u16,
        body: String,
    },

    #[error("{provider} rejected the structured output schema: {body}")]
    SchemaRejected { provider: ProviderId, body: String },

    // Answer errors
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Answer out of bounds: {0}")]
    OutOfBounds(String),

    // Page errors
    #[error("Actuation error: {0}")]
    Actuation(String),

    #[error("Page error: {0}")]
    Page(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl QuizError {
    /// Whether this error should end the automation session instead of
    /// scheduling another cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, QuizError::Config(_) | QuizError::MissingCredential(_))
    }
}

/// Result type alias using QuizError
pub type Result<T> = std::result::Result<T, QuizError>;
