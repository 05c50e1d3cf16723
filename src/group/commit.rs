//! Group commit record.
//!
//! The commit is the last record of the group protocol and the sole
//! marker of validity: a group without a readable commit never counts,
//! no matter how intact its parts look.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Write-once commit marker for one epoch's group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub epoch: u32,
    pub seed: u64,
    /// SHA-256 of the exact manifest bytes on disk, lowercase hex.
    pub manifest_sha256: String,
    /// Unix timestamp with sub-second precision.
    pub ts: f64,
}

impl Commit {
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

    #[test]
    fn test_roundtrip() {
        let commit = Commit {
            epoch: 6,
            seed: 0,
            manifest_sha256: "00".repeat(32),
            ts: 1_700_000_000.25,
        };
        let bytes = commit.to_json().unwrap();
        let decoded = Commit::from_json(&bytes).unwrap();
        assert_eq!(decoded, commit);
    }

    #[test]
    fn test_garbage_fails_to_parse() {
        assert!(Commit::from_json(b"{not json").is_err());
    }
}
