//! Single-file checkpoint verification.
//!
//! Scanning is read-only and total: every parse or content problem found
//! in an artifact becomes a recorded reason on the verdict, never an
//! error out of the scan. Only I/O failures reaching the filesystem
//! itself (unreadable directory, vanishing file) propagate.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::hash::sha256_hex;
use crate::payload::{content_digest, load_auto, ContainerFormat, DType, PayloadView};
use crate::scan::reason::Reason;
use crate::writer::{sidecar_path, SidecarMetadata};

/// Expected key set with per-key dtype and shape.
#[derive(Debug, Clone)]
pub struct ExpectedSchema {
    entries: Vec<(String, DType, Vec<usize>)>,
}

impl ExpectedSchema {
    pub fn new(entries: Vec<(String, DType, Vec<usize>)>) -> Self {
        Self { entries }
    }

    /// Keys in declaration order, the order digests are computed in.
    pub fn key_order(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _, _)| k.clone()).collect()
    }

    /// True when the payload carries exactly these keys with matching
    /// dtype and shape.
    pub fn matches<P: PayloadView>(&self, payload: &P) -> bool {
        if payload.keys().len() != self.entries.len() {
            return false;
        }
        for (key, dtype, shape) in &self.entries {
            match payload.tensor(key) {
                Some(t) if t.dtype() == *dtype && t.shape() == shape.as_slice() => {}
                _ => return false,
            }
        }
        true
    }
}

impl Default for ExpectedSchema {
    /// The synthetic four-tensor model state.
    fn default() -> Self {
        Self::new(vec![
            ("W1".to_string(), DType::F64, vec![128, 128]),
            ("b1".to_string(), DType::F64, vec![128]),
            ("W2".to_string(), DType::F64, vec![128, 10]),
            ("b2".to_string(), DType::F64, vec![10]),
        ])
    }
}

/// Verdict for one checkpoint file. Field order mirrors the report
/// columns.
#[derive(Debug, Clone)]
pub struct FileVerdict {
    /// Parsed from the file name; -1 when absent.
    pub epoch: i64,
    pub file: String,
    pub bytes: u64,
    pub sha256: String,
    pub load_ok: bool,
    pub nan_total: u64,
    pub inf_total: u64,
    pub shape_ok: bool,
    pub expected_digest_present: bool,
    pub digest_match: bool,
    pub expected_file_sha_present: bool,
    pub file_sha_match: bool,
    pub corrupted: bool,
    pub reasons: Vec<Reason>,
}

/// Parses the epoch number out of a checkpoint or directory name.
pub fn parse_epoch(name: &str) -> i64 {
    static EPOCH_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = match EPOCH_RE.get_or_init(|| Regex::new(r"epoch_(\d+)").ok()) {
        Some(re) => re,
        None => return -1,
    };
    re.captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(-1)
}

/// Verifies one checkpoint file against its sidecar and the expected
/// schema.
///
/// A file that cannot be read (deleted or replaced mid-scan) yields a
/// corrupted verdict with an io load error rather than aborting the scan.
pub fn scan_file(path: &Path, schema: &ExpectedSchema) -> FileVerdict {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut reasons = Vec::new();

    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(_) => {
            reasons.push(Reason::LoadError {
                kind: "io".to_string(),
            });
            return FileVerdict {
                epoch: parse_epoch(&file_name),
                file: file_name,
                bytes: 0,
                sha256: String::new(),
                load_ok: false,
                nan_total: 0,
                inf_total: 0,
                shape_ok: false,
                expected_digest_present: false,
                digest_match: false,
                expected_file_sha_present: false,
                file_sha_match: false,
                corrupted: true,
                reasons,
            };
        }
    };
    let bytes = raw.len() as u64;
    let file_sha = sha256_hex(&raw);

    // Sidecar: absent means unverifiable declarations, not a failure.
    let mut expected_digest = None;
    let mut expected_file_sha = None;
    let meta_path = sidecar_path(path);
    if meta_path.exists() {
        match SidecarMetadata::read_from_file(&meta_path) {
            Ok(meta) => {
                if !meta.expected_digest.is_empty() {
                    expected_digest = Some(meta.expected_digest);
                }
                if !meta.expected_file_sha256.is_empty() {
                    expected_file_sha = Some(meta.expected_file_sha256);
                }
            }
            Err(_) => reasons.push(Reason::MetaError {
                kind: "parse".to_string(),
            }),
        }
    }

    // Container load.
    let mut payload = None;
    match load_auto(&raw) {
        Ok((p, _format)) => payload = Some(p),
        Err(err) => reasons.push(Reason::LoadError {
            kind: err.kind().to_string(),
        }),
    }
    let load_ok = payload.is_some();

    let mut nan_total = 0u64;
    let mut inf_total = 0u64;
    if let Some(p) = &payload {
        for key in p.keys() {
            if let Some(t) = p.tensor(key) {
                let (nan, inf) = t.count_nan_inf();
                nan_total += nan;
                inf_total += inf;
            }
        }
        if nan_total > 0 {
            reasons.push(Reason::NanPresent);
        }
        if inf_total > 0 {
            reasons.push(Reason::InfPresent);
        }
    }

    let mut shape_ok = false;
    if let Some(p) = &payload {
        shape_ok = schema.matches(p);
        if !shape_ok {
            reasons.push(Reason::ShapeMismatch);
        }
    }

    // Digest check only when the payload loaded and the sidecar declared
    // an expected value.
    let mut digest_match = false;
    if let (Some(p), Some(expected)) = (&payload, &expected_digest) {
        match content_digest(p, &schema.key_order()) {
            Ok(actual) if &actual == expected => digest_match = true,
            _ => reasons.push(Reason::DigestMismatch),
        }
    }

    let mut file_sha_match = false;
    if let Some(expected) = &expected_file_sha {
        if &file_sha == expected {
            file_sha_match = true;
        } else {
            reasons.push(Reason::FileShaMismatch);
        }
    }

    let expected_digest_present = expected_digest.is_some();
    let expected_file_sha_present = expected_file_sha.is_some();
    let corrupted = !load_ok
        || nan_total > 0
        || inf_total > 0
        || !shape_ok
        || (expected_digest_present && !digest_match)
        || (expected_file_sha_present && !file_sha_match);

    FileVerdict {
        epoch: parse_epoch(&file_name),
        file: file_name,
        bytes,
        sha256: file_sha,
        load_ok,
        nan_total,
        inf_total,
        shape_ok,
        expected_digest_present,
        digest_match,
        expected_file_sha_present,
        file_sha_match,
        corrupted,
        reasons,
    }
}

/// Scans every checkpoint container in `dir`, sorted by file name.
pub fn scan_dir(dir: &Path, schema: &ExpectedSchema) -> std::io::Result<Vec<FileVerdict>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        // Skip symlinks so a rollback alias in the same directory is not
        // scanned as a checkpoint.
        .filter(|e| e.file_type().map(|t| !t.is_symlink()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .and_then(ContainerFormat::from_extension)
                .is_some()
        })
        .collect();
    paths.sort();

    let mut verdicts = Vec::with_capacity(paths.len());
    for path in paths {
        verdicts.push(scan_file(&path, schema));
    }
    Ok(verdicts)
}
