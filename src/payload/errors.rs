//! Payload and container errors.
//!
//! Schema errors are fatal before any bytes persist. Container decode
//! failures are fatal to the caller that asked for a decode; the scanner
//! converts them into checked verdict reasons instead of propagating.

use thiserror::Error;

/// Result type for payload operations
pub type PayloadResult<T> = Result<T, PayloadError>;

#[derive(Debug, Error)]
pub enum PayloadError {
    /// Key order does not cover the payload exactly.
    #[error("schema error: {0}")]
    Schema(String),

    /// Tensor byte length inconsistent with dtype and shape.
    #[error("tensor error: {0}")]
    Tensor(String),

    /// Container bytes cannot be decoded. The kind is a short stable token
    /// surfaced in scan reasons as `load_error:<kind>`.
    #[error("container decode failed ({kind}): {message}")]
    Decode { kind: &'static str, message: String },

    /// Container encode failed (serialization only, never filesystem).
    #[error("container encode failed: {0}")]
    Encode(String),
}

impl PayloadError {
    pub fn decode(kind: &'static str, message: impl Into<String>) -> Self {
        PayloadError::Decode {
            kind,
            message: message.into(),
        }
    }

    /// Short stable token for scan reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            PayloadError::Schema(_) => "schema",
            PayloadError::Tensor(_) => "tensor",
            PayloadError::Decode { kind, .. } => kind,
            PayloadError::Encode(_) => "encode",
        }
    }
}
