//! Sidecar metadata: the per-checkpoint JSON record declaring what the
//! artifact is supposed to contain.
//!
//! Written once, atomically, before the checkpoint bytes; read-only
//! afterward. The expected hashes describe the clean serialized payload,
//! captured before fault injection, which is what lets the scanner
//! distinguish a damaged container from a payload that was always wrong.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{WriterError, WriterResult};
use crate::persist;

/// Sidecar record stored next to every single-file checkpoint.
///
/// `expected_digest` and `expected_file_sha256` may be empty strings:
/// an unset expectation means "cannot verify", never "failure".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SidecarMetadata {
    pub epoch: u32,
    pub ts: f64,
    pub seed: u64,
    pub fault: String,
    pub write_mode: String,
    pub expected_digest: String,
    pub expected_file_sha256: String,
    pub note: String,
}

impl SidecarMetadata {
    pub fn to_json(&self) -> WriterResult<String> {
        serde_json::to_string(self)
            .map_err(|e| WriterError::Sidecar(format!("failed to serialize sidecar: {}", e)))
    }

    pub fn from_json(json: &str) -> WriterResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| WriterError::Sidecar(format!("failed to parse sidecar: {}", e)))
    }

    /// Writes the sidecar atomically. Sidecars are always written with the
    /// atomic strategy regardless of the checkpoint's write mode: the
    /// experiment varies the durability of the payload, not of the record
    /// describing it.
    pub fn write_to_file(&self, path: &Path) -> WriterResult<()> {
        let json = self.to_json()?;
        persist::atomic_write_bytes(path, json.as_bytes())?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> WriterResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WriterError::Sidecar(format!("failed to read sidecar {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

/// Sidecar path convention: the checkpoint path plus a `.json` suffix.
pub fn sidecar_path(ckpt_path: &Path) -> PathBuf {
    let mut name = ckpt_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_sidecar() -> SidecarMetadata {
        SidecarMetadata {
            epoch: 12,
            ts: 1726000000.25,
            seed: 7,
            fault: "bitflip".to_string(),
            write_mode: "atomic".to_string(),
            expected_digest: "ab".repeat(32),
            expected_file_sha256: "cd".repeat(32),
            note: "ckpt-integrity".to_string(),
        }
    }

    #[test]
    fn test_sidecar_json_roundtrip() {
        let sidecar = sample_sidecar();
        let json = sidecar.to_json().unwrap();
        assert_eq!(SidecarMetadata::from_json(&json).unwrap(), sidecar);
    }

    #[test]
    fn test_sidecar_json_field_names() {
        let json = sample_sidecar().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["epoch"], 12);
        assert_eq!(parsed["seed"], 7);
        assert_eq!(parsed["fault"], "bitflip");
        assert_eq!(parsed["write_mode"], "atomic");
        assert!(parsed["expected_digest"].is_string());
        assert!(parsed["expected_file_sha256"].is_string());
        assert!(parsed["ts"].is_number());
        assert!(parsed["note"].is_string());
    }

    #[test]
    fn test_sidecar_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ckpt_epoch_0012.tbin.json");

        let sidecar = sample_sidecar();
        sidecar.write_to_file(&path).unwrap();
        assert_eq!(SidecarMetadata::read_from_file(&path).unwrap(), sidecar);
    }

    #[test]
    fn test_sidecar_invalid_json() {
        assert!(SidecarMetadata::from_json("not json").is_err());
    }

    #[test]
    fn test_sidecar_path_convention() {
        let path = Path::new("trace/ckpts/ckpt_epoch_0004.tbin");
        assert_eq!(
            sidecar_path(path),
            PathBuf::from("trace/ckpts/ckpt_epoch_0004.tbin.json")
        );
    }
}
