//! CLI-specific error types. All CLI errors are fatal; the process exits
//! non-zero.

use std::fmt;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Bad argument value or configuration file
    ConfigError,
    /// Filesystem I/O failure outside the core write path
    IoError,
    /// A write run failed
    WriteFailed,
    /// A scan could not be completed
    ScanFailed,
    /// Rollback selection or alias update failed
    RollbackFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CKPT_CLI_CONFIG_ERROR",
            Self::IoError => "CKPT_CLI_IO_ERROR",
            Self::WriteFailed => "CKPT_CLI_WRITE_FAILED",
            Self::ScanFailed => "CKPT_CLI_SCAN_FAILED",
            Self::RollbackFailed => "CKPT_CLI_ROLLBACK_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::WriteFailed, msg)
    }

    pub fn scan_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ScanFailed, msg)
    }

    pub fn rollback_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RollbackFailed, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
