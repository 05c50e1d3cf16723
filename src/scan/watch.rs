//! Guard loop: poll a checkpoint directory, re-verify changed files,
//! roll the alias back when corruption appears.
//!
//! Single-threaded by design; one watcher owns a directory. Change
//! detection is a remembered-mtime marker per file, so an unchanged file
//! is never re-hashed. Every verification appends one row to the events
//! CSV for offline latency analysis.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use crate::observability::events::unix_ts;
use crate::observability::Logger;
use crate::payload::ContainerFormat;
use crate::rollback;
use crate::scan::single::{scan_dir, scan_file, ExpectedSchema};

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory of single-file checkpoints to guard.
    pub dir: PathBuf,
    /// Alias updated to the newest valid checkpoint when corruption is
    /// found.
    pub alias: PathBuf,
    pub interval: Duration,
    /// Verification event log, appended to across runs.
    pub events_csv: Option<PathBuf>,
}

const EVENTS_HEADER: &str = "ts,mode,path,ok,verify_ms,rollback_ms";

/// Runs the guard loop until `stop` is set.
pub fn watch(config: &WatchConfig, schema: &ExpectedSchema, stop: &AtomicBool) -> std::io::Result<()> {
    Logger::info(
        "watch_started",
        &[
            ("dir", &config.dir.display().to_string()),
            ("interval_ms", &config.interval.as_millis().to_string()),
        ],
    );

    let mut seen: HashMap<PathBuf, SystemTime> = HashMap::new();
    while !stop.load(Ordering::Relaxed) {
        poll_once(config, schema, &mut seen)?;
        // Sleep in short slices so a stop request takes effect promptly.
        let deadline = Instant::now() + config.interval;
        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10).min(config.interval));
        }
    }
    Ok(())
}

/// One poll cycle: verify every new-or-changed checkpoint in the
/// directory. Exposed for tests and one-shot CLI use.
pub fn poll_once(
    config: &WatchConfig,
    schema: &ExpectedSchema,
    seen: &mut HashMap<PathBuf, SystemTime>,
) -> std::io::Result<usize> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&config.dir)?
        .filter_map(|e| e.ok())
        // The rollback alias is a symlink in the same directory; never
        // treat it as a checkpoint of its own.
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

    let mut verified = 0usize;
    for path in paths {
        let mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            // Deleted between listing and stat; next cycle sees the truth.
            Err(_) => continue,
        };
        if seen.get(&path) == Some(&mtime) {
            continue;
        }
        seen.insert(path.clone(), mtime);

        let t0 = Instant::now();
        let verdict = scan_file(&path, schema);
        let verify_ms = t0.elapsed().as_secs_f64() * 1000.0;
        verified += 1;

        Logger::info(
            "watch_verified",
            &[
                ("path", &path.display().to_string()),
                ("corrupted", if verdict.corrupted { "true" } else { "false" }),
            ],
        );

        let mut rollback_ms = 0.0;
        if verdict.corrupted {
            let r0 = Instant::now();
            match roll_back(config, schema) {
                Ok(target) => {
                    rollback_ms = r0.elapsed().as_secs_f64() * 1000.0;
                    Logger::warn(
                        "watch_rolled_back",
                        &[
                            ("corrupt", &path.display().to_string()),
                            ("target", &target.display().to_string()),
                        ],
                    );
                }
                Err(err) => {
                    Logger::error("watch_rollback_failed", &[("error", &err.to_string())]);
                }
            }
        }

        if let Some(csv) = &config.events_csv {
            append_event(csv, &path, !verdict.corrupted, verify_ms, rollback_ms)?;
        }
    }
    Ok(verified)
}

fn roll_back(
    config: &WatchConfig,
    schema: &ExpectedSchema,
) -> Result<PathBuf, rollback::RollbackError> {
    let verdicts = scan_dir(&config.dir, schema)?;
    let candidates = rollback::candidates_from_files(&config.dir, &verdicts);
    let best = rollback::select_rollback(&candidates)?;
    rollback::update_alias(&config.alias, &best.path)?;
    Ok(best.path.clone())
}

fn append_event(
    csv: &Path,
    path: &Path,
    ok: bool,
    verify_ms: f64,
    rollback_ms: f64,
) -> std::io::Result<()> {
    if let Some(parent) = csv.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let fresh = !csv.exists();
    let mut out = std::fs::OpenOptions::new().create(true).append(true).open(csv)?;
    if fresh {
        writeln!(out, "{}", EVENTS_HEADER)?;
    }
    writeln!(
        out,
        "{:.6},watch,{},{},{:.1},{:.1}",
        unix_ts(),
        path.display(),
        u8::from(ok),
        verify_ms,
        rollback_ms,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::RecordingHandler;
    use crate::fault::{flip_file_bytes, FaultMode};
    use crate::persist::WriteMode;
    use crate::writer::{default_key_order, synthetic_payload, CheckpointWriter, WriterConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn write_epochs(dir: &Path, epochs: &[u32]) -> Vec<PathBuf> {
        let crash = RecordingHandler::new();
        let mut writer = CheckpointWriter::new(
            WriterConfig {
                out_dir: dir.to_path_buf(),
                seed: 0,
                fault: FaultMode::None,
                write_mode: WriteMode::Atomic,
                format: ContainerFormat::Binary,
            },
            &crash,
        );
        let mut rng = StdRng::seed_from_u64(0);
        let payload = synthetic_payload(&mut rng);
        epochs
            .iter()
            .map(|&e| {
                writer
                    .write_epoch(&payload, &default_key_order(), e, false)
                    .unwrap()
                    .path
            })
            .collect()
    }

    fn watch_config(dir: &Path) -> WatchConfig {
        WatchConfig {
            dir: dir.to_path_buf(),
            alias: dir.join("latest_ok.tbin"),
            interval: Duration::from_millis(10),
            events_csv: Some(dir.join("events/events.csv")),
        }
    }

    #[test]
    fn test_poll_verifies_each_file_once() {
        let temp_dir = TempDir::new().unwrap();
        write_epochs(temp_dir.path(), &[3, 6]);
        let config = watch_config(temp_dir.path());
        let mut seen = HashMap::new();

        assert_eq!(
            poll_once(&config, &ExpectedSchema::default(), &mut seen).unwrap(),
            2
        );
        // Unchanged files are not re-verified.
        assert_eq!(
            poll_once(&config, &ExpectedSchema::default(), &mut seen).unwrap(),
            0
        );
    }

    #[test]
    fn test_corruption_triggers_alias_rollback() {
        let temp_dir = TempDir::new().unwrap();
        let paths = write_epochs(temp_dir.path(), &[3, 6]);
        let config = watch_config(temp_dir.path());
        let mut seen = HashMap::new();
        poll_once(&config, &ExpectedSchema::default(), &mut seen).unwrap();

        // Corrupt the newest checkpoint in place; its mtime changes.
        flip_file_bytes(&paths[1], 4, 9).unwrap();
        poll_once(&config, &ExpectedSchema::default(), &mut seen).unwrap();

        let target = std::fs::read_link(&config.alias).unwrap();
        let resolved = if target.is_absolute() {
            target
        } else {
            temp_dir.path().join(target)
        };
        assert_eq!(
            resolved.file_name(),
            paths[0].file_name(),
            "alias must point at the surviving epoch 3"
        );
    }

    #[test]
    fn test_events_csv_appended_with_header_once() {
        let temp_dir = TempDir::new().unwrap();
        write_epochs(temp_dir.path(), &[3]);
        let config = watch_config(temp_dir.path());
        let mut seen = HashMap::new();
        poll_once(&config, &ExpectedSchema::default(), &mut seen).unwrap();

        write_epochs(temp_dir.path(), &[6]);
        poll_once(&config, &ExpectedSchema::default(), &mut seen).unwrap();

        let csv = config.events_csv.unwrap();
        let content = std::fs::read_to_string(csv).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], EVENTS_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(",watch,"));
        assert!(lines[1].ends_with(",0.0") || lines[1].contains(",1,"));
    }

    #[test]
    fn test_watch_stops_on_flag() {
        let temp_dir = TempDir::new().unwrap();
        write_epochs(temp_dir.path(), &[3]);
        let config = watch_config(temp_dir.path());
        let stop = AtomicBool::new(false);

        std::thread::scope(|s| {
            let handle = s.spawn(|| watch(&config, &ExpectedSchema::default(), &stop));
            std::thread::sleep(Duration::from_millis(50));
            stop.store(true, Ordering::Relaxed);
            handle.join().unwrap().unwrap();
        });
    }
}
