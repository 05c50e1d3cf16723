//! Rollback target selection and atomic alias update.
//!
//! Selection is pure: among valid candidates, the largest epoch wins.
//! The alias is a symlink and the only thing rollback mutates; it is
//! updated by renaming a temp symlink over it, so a reader always
//! resolves either the old target or the new one, never nothing.

pub mod errors;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scan::{FileVerdict, GroupVerdict};

pub use errors::{RollbackError, RollbackResult};

/// One rollback candidate: an artifact with a scan verdict attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub epoch: i64,
    pub path: PathBuf,
    pub valid: bool,
}

/// Candidates from a single-file scan. Paths resolve against the scanned
/// directory.
pub fn candidates_from_files(dir: &Path, verdicts: &[FileVerdict]) -> Vec<Candidate> {
    verdicts
        .iter()
        .map(|v| Candidate {
            epoch: v.epoch,
            path: dir.join(&v.file),
            valid: !v.corrupted && v.epoch >= 0,
        })
        .collect()
}

/// Candidates from a group scan.
pub fn candidates_from_groups(verdicts: &[GroupVerdict]) -> Vec<Candidate> {
    verdicts
        .iter()
        .map(|v| Candidate {
            epoch: v.epoch,
            path: v.dir.clone(),
            valid: v.group_ok && v.epoch >= 0,
        })
        .collect()
}

/// Picks the valid candidate with the largest epoch.
pub fn select_rollback(candidates: &[Candidate]) -> RollbackResult<&Candidate> {
    candidates
        .iter()
        .filter(|c| c.valid)
        .max_by_key(|c| c.epoch)
        .ok_or(RollbackError::NoValidCandidate)
}

static LINK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Points `alias` at `target` atomically: temp symlink beside the alias,
/// then rename over it. The alias is never unlinked first.
pub fn update_alias(alias: &Path, target: &Path) -> RollbackResult<()> {
    if !target.exists() {
        return Err(RollbackError::TargetMissing(target.to_path_buf()));
    }

    let parent = alias.parent().unwrap_or_else(|| Path::new("."));
    if !parent.as_os_str().is_empty() && !parent.exists() {
        std::fs::create_dir_all(parent)?;
    }

    // Relative target when it shares the alias's directory, for
    // portability of the whole tree.
    let link_dst: PathBuf = match target.parent() {
        Some(tp) if tp == parent => target
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| target.to_path_buf()),
        _ => target.to_path_buf(),
    };

    let n = LINK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = parent.join(format!(".tmp_link_{}_{}", std::process::id(), n));

    std::os::unix::fs::symlink(&link_dst, &tmp)?;
    if let Err(err) = std::fs::rename(&tmp, alias) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}
