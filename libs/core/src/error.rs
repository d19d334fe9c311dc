use thiserror::Error;

use crate::urn::UrnError;

/// Failures surfaced by channel handlers.
///
/// Authentication and validation failures terminate a request before any
/// backend write. Provider and transport failures during a send are *not*
/// errors at this level: they are encoded in the returned status update so
/// the backend's retry policy governs resubmission.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid address: {0}")]
    UrnValidation(#[from] UrnError),

    #[error("channel configuration error: {0}")]
    Configuration(String),

    #[error("unknown status '{value}', must be one of {expected}")]
    UnrecognizedStatus {
        value: String,
        expected: &'static str,
    },

    #[error("message not found")]
    MsgNotFound,

    #[error("operation not supported by this channel type")]
    Unsupported,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
