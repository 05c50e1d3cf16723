//! Rollback errors. No valid candidate is a loud failure: falling back
//! to nothing must never look like success.

use std::path::PathBuf;

use thiserror::Error;

pub type RollbackResult<T> = Result<T, RollbackError>;

#[derive(Debug, Error)]
pub enum RollbackError {
    /// Every candidate was invalid (or there were none).
    #[error("no valid rollback candidate")]
    NoValidCandidate,

    /// The selected target vanished between scan and alias update.
    #[error("rollback target not found on disk: {0}")]
    TargetMissing(PathBuf),

    #[error("alias update failed: {0}")]
    Io(#[from] std::io::Error),
}
