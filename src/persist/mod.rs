//! Write strategies: the durability contracts a byte blob is persisted
//! under.
//!
//! - Atomic: temp file in the target's directory, write, flush, fsync the
//!   descriptor, rename over the target. The rename is the sole atomic
//!   visibility point; observers see fully-old or fully-new content,
//!   never a blend. The temp file is removed on failure.
//! - Unsafe: open the target directly, optionally write only the first
//!   half, never flush or fsync. No guarantee of any kind; this is the
//!   strategy under test when simulating crashes.
//!
//! A file-level fsync does not cover the directory entry the rename
//! created; [`fsync_dir`] exists for protocols whose final record must
//! survive a power cut.

pub mod errors;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

pub use errors::{PersistError, PersistResult};

/// Durability contract selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Atomic,
    Unsafe,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Atomic => "atomic",
            WriteMode::Unsafe => "unsafe",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "atomic" => Ok(WriteMode::Atomic),
            "unsafe" => Ok(WriteMode::Unsafe),
            other => Err(format!("unknown write mode: {}", other)),
        }
    }
}

// Distinguishes temp files of concurrent processes and repeated calls.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    parent.join(format!(".tmp_ckpt_{}_{}", std::process::id(), n))
}

fn ensure_parent_dir(path: &Path) -> PersistResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                PersistError::dir_failed(
                    format!("failed to create directory: {}", parent.display()),
                    e,
                )
            })?;
        }
    }
    Ok(())
}

/// Atomically persists `data` at `path`: temp + flush + fsync + rename.
pub fn atomic_write_bytes(path: &Path, data: &[u8]) -> PersistResult<()> {
    ensure_parent_dir(path)?;
    let tmp = temp_path_for(path);

    let result = (|| -> PersistResult<()> {
        let mut file = File::create(&tmp).map_err(|e| {
            PersistError::write_failed(format!("failed to create temp file: {}", tmp.display()), e)
        })?;
        file.write_all(data).map_err(|e| {
            PersistError::write_failed(format!("failed to write temp file: {}", tmp.display()), e)
        })?;
        file.flush().map_err(|e| {
            PersistError::write_failed(format!("failed to flush temp file: {}", tmp.display()), e)
        })?;
        file.sync_all().map_err(|e| {
            PersistError::write_failed(format!("failed to fsync temp file: {}", tmp.display()), e)
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            PersistError::rename_failed(
                format!("failed to rename {} over {}", tmp.display(), path.display()),
                e,
            )
        })?;
        Ok(())
    })();

    if result.is_err() && tmp.exists() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Writes `data` at `path` with no atomicity and no durability: direct
/// open, no flush, no fsync. With `partial`, only the first half (at
/// least one byte of nonempty input) is written, emulating a
/// crash-in-the-middle artifact.
pub fn unsafe_write_bytes(path: &Path, data: &[u8], partial: bool) -> PersistResult<()> {
    ensure_parent_dir(path)?;
    let mut file = File::create(path).map_err(|e| {
        PersistError::write_failed(format!("failed to open target: {}", path.display()), e)
    })?;

    let slice = if partial && data.len() > 1 {
        &data[..std::cmp::max(1, data.len() / 2)]
    } else {
        data
    };
    file.write_all(slice).map_err(|e| {
        PersistError::write_failed(format!("failed to write target: {}", path.display()), e)
    })?;
    // deliberately no flush/fsync
    Ok(())
}

/// Persists under the given mode. `partial` only applies to unsafe mode.
pub fn write_bytes(mode: WriteMode, path: &Path, data: &[u8], partial: bool) -> PersistResult<()> {
    match mode {
        WriteMode::Atomic => atomic_write_bytes(path, data),
        WriteMode::Unsafe => unsafe_write_bytes(path, data, partial),
    }
}

/// Fsyncs a directory descriptor, making renamed entries durable.
pub fn fsync_dir(path: &Path) -> PersistResult<()> {
    let dir = OpenOptions::new().read(true).open(path).map_err(|e| {
        PersistError::dir_failed(format!("failed to open directory: {}", path.display()), e)
    })?;
    dir.sync_all().map_err(|e| {
        PersistError::dir_failed(format!("failed to fsync directory: {}", path.display()), e)
    })?;
    Ok(())
}
