//! Group checkpoint errors.

use thiserror::Error;

use crate::persist::PersistError;

/// Result type for group checkpoint operations
pub type GroupResult<T> = Result<T, GroupError>;

#[derive(Debug, Error)]
pub enum GroupError {
    /// Filesystem failure while persisting a part, manifest, or commit.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Manifest or commit record could not be serialized.
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_persist_error_converts() {
        let err: GroupError = PersistError::write_failed(
            "part write failed",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        )
        .into();
        assert!(err.to_string().contains("CKPT_PERSIST_WRITE"));
    }
}
