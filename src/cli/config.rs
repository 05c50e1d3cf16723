//! Optional JSON run configuration.
//!
//! Every field has a default, so a minimal file can pin just the knobs an
//! experiment varies. Values are validated once at load; a bad mode name
//! fails the whole run before anything touches disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::crash::CrashPoint;
use crate::fault::FaultMode;
use crate::payload::ContainerFormat;
use crate::persist::WriteMode;

/// Run configuration shared by `write` and `group-write`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Output directory (checkpoint dir or group root)
    #[serde(default = "default_out")]
    pub out: PathBuf,

    #[serde(default = "default_epochs")]
    pub epochs: u32,

    /// Checkpoint every N epochs
    #[serde(default = "default_every")]
    pub every: u32,

    #[serde(default)]
    pub seed: u64,

    /// Fault mode name: none|bitflip|truncate|zerorange
    #[serde(default = "default_none")]
    pub fault: String,

    /// Write strategy name: atomic|unsafe
    #[serde(default = "default_write_mode")]
    pub write_mode: String,

    /// Container format name (single-file runs): binary|json
    #[serde(default = "default_format")]
    pub format: String,

    /// Crash point name (group runs): none|after_<part>|...
    #[serde(default = "default_none")]
    pub crash_at: String,

    /// Model part size in KiB (group runs)
    #[serde(default = "default_kb_model")]
    pub kb_model: usize,

    /// Optimizer part size in KiB (group runs)
    #[serde(default = "default_kb_optim")]
    pub kb_optim: usize,

    /// Fsync the epoch directory after COMMIT (group runs)
    #[serde(default = "default_true")]
    pub dir_fsync: bool,

    /// Sleep after each checkpoint save, in milliseconds
    #[serde(default)]
    pub pause_ms: u64,
}

fn default_out() -> PathBuf {
    PathBuf::from("trace/ckpts")
}
fn default_epochs() -> u32 {
    60
}
fn default_every() -> u32 {
    3
}
fn default_none() -> String {
    "none".to_string()
}
fn default_write_mode() -> String {
    "atomic".to_string()
}
fn default_format() -> String {
    "binary".to_string()
}
fn default_kb_model() -> usize {
    128
}
fn default_kb_optim() -> usize {
    64
}
fn default_true() -> bool {
    true
}

impl RunConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("failed to read config: {}", e)))?;
        let config: RunConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.every == 0 {
            return Err(CliError::config_error("every must be > 0"));
        }
        self.fault_mode()?;
        self.write_mode()?;
        self.container_format()?;
        self.crash_point()?;
        Ok(())
    }

    pub fn fault_mode(&self) -> CliResult<FaultMode> {
        parse_fault(&self.fault)
    }

    pub fn write_mode(&self) -> CliResult<WriteMode> {
        parse_write_mode(&self.write_mode)
    }

    pub fn container_format(&self) -> CliResult<ContainerFormat> {
        parse_format(&self.format)
    }

    pub fn crash_point(&self) -> CliResult<Option<CrashPoint>> {
        parse_crash_at(&self.crash_at)
    }
}

pub fn parse_fault(s: &str) -> CliResult<FaultMode> {
    s.parse::<FaultMode>().map_err(CliError::config_error)
}

pub fn parse_write_mode(s: &str) -> CliResult<WriteMode> {
    s.parse::<WriteMode>().map_err(CliError::config_error)
}

pub fn parse_format(s: &str) -> CliResult<ContainerFormat> {
    match s {
        "binary" => Ok(ContainerFormat::Binary),
        "json" => Ok(ContainerFormat::Json),
        other => Err(CliError::config_error(format!(
            "unknown container format: {}",
            other
        ))),
    }
}

pub fn parse_crash_at(s: &str) -> CliResult<Option<CrashPoint>> {
    if s == "none" {
        return Ok(None);
    }
    s.parse::<CrashPoint>()
        .map(Some)
        .map_err(CliError::config_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        std::fs::write(&path, r#"{"seed": 7}"#).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.epochs, 60);
        assert_eq!(config.every, 3);
        assert_eq!(config.fault, "none");
        assert!(config.dir_fsync);
    }

    #[test]
    fn test_bad_mode_name_rejected_at_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        std::fs::write(&path, r#"{"fault": "garble"}"#).unwrap();
        assert!(RunConfig::load(&path).is_err());
    }

    #[test]
    fn test_zero_cadence_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        std::fs::write(&path, r#"{"every": 0}"#).unwrap();
        assert!(RunConfig::load(&path).is_err());
    }

    #[test]
    fn test_parse_crash_at() {
        assert!(parse_crash_at("none").unwrap().is_none());
        assert_eq!(
            parse_crash_at("before_commit").unwrap(),
            Some(CrashPoint::BeforeCommit)
        );
        assert_eq!(
            parse_crash_at("after_model.bin").unwrap(),
            Some(CrashPoint::AfterPart("model.bin".to_string()))
        );
        assert!(parse_crash_at("during_lunch").is_err());
    }
}
