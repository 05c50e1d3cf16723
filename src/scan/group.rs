//! Group checkpoint verification.
//!
//! Validity is all-or-nothing: a readable commit whose manifest hash
//! matches the manifest on disk, and every manifest-listed part present
//! with matching size and hash. Anything less and the whole group is
//! invalid. Size is checked before hash; a wrong-sized part is never
//! hashed.

use std::path::{Path, PathBuf};

use crate::group::{Commit, Manifest, COMMIT_FILE, MANIFEST_FILE};
use crate::hash::{sha256_file, sha256_hex};
use crate::scan::reason::{json_error_kind, Reason};
use crate::scan::single::parse_epoch;

/// Verdict for one epoch directory.
#[derive(Debug, Clone)]
pub struct GroupVerdict {
    pub epoch: i64,
    pub dir: PathBuf,
    pub has_commit: bool,
    pub has_manifest: bool,
    pub parts_ok: bool,
    pub group_ok: bool,
    pub reasons: Vec<Reason>,
}

/// Verifies one epoch directory.
///
/// A part that vanishes between the metadata and hash reads counts as
/// missing; per-part io failures never abort the scan.
pub fn scan_group_dir(dir: &Path) -> GroupVerdict {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let com_path = dir.join(COMMIT_FILE);
    let man_path = dir.join(MANIFEST_FILE);

    let mut reasons = Vec::new();
    let has_commit = com_path.exists();
    let has_manifest = man_path.exists();
    let mut parts_ok = false;
    let mut group_ok = false;

    // Manifest first: its hash is what the commit vouches for.
    let mut manifest: Option<Manifest> = None;
    let mut manifest_sha = String::new();
    if has_manifest {
        match std::fs::read(&man_path) {
            Ok(bytes) => {
                manifest_sha = sha256_hex(&bytes);
                match Manifest::from_json(&bytes) {
                    Ok(m) => manifest = Some(m),
                    Err(err) => reasons.push(Reason::ManifestError {
                        kind: json_error_kind(&err),
                    }),
                }
            }
            Err(_) => reasons.push(Reason::ManifestError {
                kind: "io".to_string(),
            }),
        }
    }

    if !has_commit {
        reasons.push(Reason::NoCommit);
    } else {
        match read_commit(&com_path) {
            Err(kind) => reasons.push(Reason::CommitError { kind }),
            Ok(commit) => {
                if let Some(manifest) = &manifest {
                    if commit.manifest_sha256 != manifest_sha {
                        reasons.push(Reason::CommitManifestMismatch);
                    } else {
                        let mut failures = 0usize;
                        for entry in &manifest.parts {
                            let part = dir.join(&entry.path);
                            let size = match std::fs::metadata(&part) {
                                Ok(meta) => meta.len(),
                                Err(_) => {
                                    failures += 1;
                                    reasons.push(Reason::Missing {
                                        part: entry.path.clone(),
                                    });
                                    continue;
                                }
                            };
                            if size != entry.bytes {
                                failures += 1;
                                reasons.push(Reason::SizeMismatch {
                                    part: entry.path.clone(),
                                });
                            } else {
                                match sha256_file(&part) {
                                    Ok(sha) if sha == entry.sha256 => {}
                                    Ok(_) => {
                                        failures += 1;
                                        reasons.push(Reason::ShaMismatch {
                                            part: entry.path.clone(),
                                        });
                                    }
                                    Err(_) => {
                                        failures += 1;
                                        reasons.push(Reason::Missing {
                                            part: entry.path.clone(),
                                        });
                                    }
                                }
                            }
                        }
                        parts_ok = failures == 0;
                        group_ok = parts_ok;
                    }
                }
            }
        }
    }

    GroupVerdict {
        epoch: parse_epoch(&name),
        dir: dir.to_path_buf(),
        has_commit,
        has_manifest,
        parts_ok,
        group_ok,
        reasons,
    }
}

fn read_commit(path: &Path) -> Result<Commit, String> {
    let bytes = std::fs::read(path).map_err(|_| "io".to_string())?;
    Commit::from_json(&bytes).map_err(|e| json_error_kind(&e))
}

/// Scans every `epoch_*` directory under `root`, sorted by name.
pub fn scan_groups(root: &Path) -> std::io::Result<Vec<GroupVerdict>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("epoch_"))
                    .unwrap_or(false)
        })
        .collect();
    dirs.sort();

    let mut verdicts = Vec::with_capacity(dirs.len());
    for dir in dirs {
        verdicts.push(scan_group_dir(&dir));
    }
    Ok(verdicts)
}
