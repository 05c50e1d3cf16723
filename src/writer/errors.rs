//! Single-checkpoint writer errors.
//!
//! Schema errors fire before any bytes persist; persistence failures are
//! fatal and never retried.

use thiserror::Error;

use crate::payload::PayloadError;
use crate::persist::PersistError;

/// Result type for writer operations
pub type WriterResult<T> = Result<T, WriterError>;

#[derive(Debug, Error)]
pub enum WriterError {
    /// Payload key set does not match the declared key order, or the
    /// payload cannot be encoded. Nothing was written.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Filesystem failure while persisting bytes or sidecar.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Sidecar serialization/deserialization failure.
    #[error("sidecar error: {0}")]
    Sidecar(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_error_converts() {
        let err: WriterError = PayloadError::Schema("missing key".to_string()).into();
        assert!(err.to_string().contains("schema error"));
    }
}
