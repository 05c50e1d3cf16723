//! Typed scan reasons.
//!
//! Verdicts carry reasons as data; the `name:detail` strings and the
//! `;`-joined note column exist only at the reporting boundary.

use std::fmt;

/// One observed defect or anomaly during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Sidecar exists but cannot be parsed.
    MetaError { kind: String },
    /// Container bytes cannot be decoded.
    LoadError { kind: String },
    /// Key set, shape, or dtype differs from the expected schema.
    ShapeMismatch,
    /// Recomputed content digest differs from the sidecar's declaration.
    DigestMismatch,
    /// File hash differs from the sidecar's declaration.
    FileShaMismatch,
    NanPresent,
    InfPresent,
    /// Group has no readable commit record.
    NoCommit,
    /// Commit names a different manifest hash than the manifest on disk.
    CommitManifestMismatch,
    CommitError { kind: String },
    ManifestError { kind: String },
    /// A manifest-listed part is absent.
    Missing { part: String },
    /// A part's size differs from the manifest. Suppresses the hash check
    /// for that part.
    SizeMismatch { part: String },
    ShaMismatch { part: String },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::MetaError { kind } => write!(f, "meta_error:{}", kind),
            Reason::LoadError { kind } => write!(f, "load_error:{}", kind),
            Reason::ShapeMismatch => write!(f, "shape_mismatch"),
            Reason::DigestMismatch => write!(f, "digest_mismatch"),
            Reason::FileShaMismatch => write!(f, "file_sha_mismatch"),
            Reason::NanPresent => write!(f, "nan_present"),
            Reason::InfPresent => write!(f, "inf_present"),
            Reason::NoCommit => write!(f, "no_commit"),
            Reason::CommitManifestMismatch => write!(f, "commit_manifest_mismatch"),
            Reason::CommitError { kind } => write!(f, "commit_error:{}", kind),
            Reason::ManifestError { kind } => write!(f, "manifest_error:{}", kind),
            Reason::Missing { part } => write!(f, "missing:{}", part),
            Reason::SizeMismatch { part } => write!(f, "size_mismatch:{}", part),
            Reason::ShaMismatch { part } => write!(f, "sha_mismatch:{}", part),
        }
    }
}

/// Joins reasons into the `note` column value.
pub fn join(reasons: &[Reason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Short stable token for a JSON parse failure, mirrored in reason kinds.
pub fn json_error_kind(err: &serde_json::Error) -> String {
    let kind = match err.classify() {
        serde_json::error::Category::Io => "io",
        serde_json::error::Category::Syntax => "syntax",
        serde_json::error::Category::Data => "data",
        serde_json::error::Category::Eof => "eof",
    };
    kind.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(Reason::NoCommit.to_string(), "no_commit");
        assert_eq!(
            Reason::Missing {
                part: "model.bin".to_string()
            }
            .to_string(),
            "missing:model.bin"
        );
        assert_eq!(
            Reason::LoadError {
                kind: "bad_magic".to_string()
            }
            .to_string(),
            "load_error:bad_magic"
        );
    }

    #[test]
    fn test_join_semicolon_separated() {
        let reasons = vec![
            Reason::ShapeMismatch,
            Reason::SizeMismatch {
                part: "optim.bin".to_string(),
            },
        ];
        assert_eq!(join(&reasons), "shape_mismatch;size_mismatch:optim.bin");
        assert_eq!(join(&[]), "");
    }

    #[test]
    fn test_json_error_kind_tokens() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        assert_eq!(json_error_kind(&err), "eof");
        let err = serde_json::from_slice::<serde_json::Value>(b"{]").unwrap_err();
        assert_eq!(json_error_kind(&err), "syntax");
    }
}
