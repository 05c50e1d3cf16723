//! Persistence error types.
//!
//! Filesystem failures during checkpoint writes are fatal and never
//! auto-retried: a retry would silently change the durability experiment
//! being run.

use std::fmt;
use std::io;

/// Persistence error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistErrorCode {
    /// Temp file creation/write/fsync failure
    CkptPersistWrite,
    /// Rename over the target failed
    CkptPersistRename,
    /// Directory creation or directory fsync failure
    CkptPersistDir,
}

impl PersistErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PersistErrorCode::CkptPersistWrite => "CKPT_PERSIST_WRITE",
            PersistErrorCode::CkptPersistRename => "CKPT_PERSIST_RENAME",
            PersistErrorCode::CkptPersistDir => "CKPT_PERSIST_DIR",
        }
    }
}

impl fmt::Display for PersistErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Persistence error with source context
#[derive(Debug)]
pub struct PersistError {
    code: PersistErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl PersistError {
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: PersistErrorCode::CkptPersistWrite,
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn rename_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: PersistErrorCode::CkptPersistRename,
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn dir_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: PersistErrorCode::CkptPersistDir,
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn code(&self) -> PersistErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// All persistence errors are fatal to the writing operation.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code.code(), self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;
