//! Group manifest record.
//!
//! The manifest enumerates every part of one epoch's group with the size
//! and hash of the bytes the writer intended to persist. It is written
//! after all parts and before the commit record; a commit that names a
//! different manifest hash invalidates the whole group.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One part as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartEntry {
    /// Part file name relative to the epoch directory.
    pub path: String,
    /// Size of the intended bytes.
    pub bytes: u64,
    /// SHA-256 of the intended bytes, lowercase hex.
    pub sha256: String,
}

/// Write-once manifest for one epoch's group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub epoch: u32,
    pub seed: u64,
    pub parts: Vec<PartEntry>,
}

impl Manifest {
    /// Serializes with deterministic field order, so the commit's
    /// `manifest_sha256` is reproducible.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn read_from_file(path: &Path) -> std::io::Result<serde_json::Result<Self>> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_json(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            epoch: 3,
            seed: 7,
            parts: vec![
                PartEntry {
                    path: "model.bin".to_string(),
                    bytes: 131072,
                    sha256: "ab".repeat(32),
                },
                PartEntry {
                    path: "rng.json".to_string(),
                    bytes: 54,
                    sha256: "cd".repeat(32),
                },
            ],
        }
    }

    #[test]
    fn test_roundtrip_preserves_parts_order() {
        let manifest = sample();
        let bytes = manifest.to_json().unwrap();
        let decoded = Manifest::from_json(&bytes).unwrap();
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.parts[0].path, "model.bin");
        assert_eq!(decoded.parts[1].path, "rng.json");
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let a = sample().to_json().unwrap();
        let b = sample().to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncated_json_fails_to_parse() {
        let bytes = sample().to_json().unwrap();
        assert!(Manifest::from_json(&bytes[..bytes.len() / 2]).is_err());
    }
}
