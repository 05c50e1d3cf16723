//! CLI command implementations.
//!
//! Thin wrappers: argument parsing and error mapping here, all behavior
//! in the core modules. The production crash handler is installed here
//! and nowhere else.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::crash::AbortHandler;
use crate::fault;
use crate::group::{self, GroupConfig, GroupRunPlan};
use crate::observability::Logger;
use crate::rollback;
use crate::scan::{self, ExpectedSchema, WatchConfig};
use crate::writer::{self, RunPlan, WriterConfig};

use super::args::Command;
use super::config::RunConfig;
use super::errors::{CliError, CliResult};

/// Dispatch a parsed command.
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Write {
            config,
            out,
            epochs,
            every,
            seed,
            fault,
            write_mode,
            format,
            crash_epoch,
            pause_ms,
        } => {
            let mut run = match config {
                Some(path) => RunConfig::load(&path)?,
                None => flags_to_config(out, epochs, every, seed, fault, write_mode, format),
            };
            run.pause_ms = run.pause_ms.max(pause_ms);
            write(&run, crash_epoch)
        }

        Command::GroupWrite {
            config,
            out,
            epochs,
            every,
            seed,
            fault,
            write_mode,
            crash_at,
            kb_model,
            kb_optim,
            no_dir_fsync,
            pause_ms,
        } => {
            let mut run = match config {
                Some(path) => RunConfig::load(&path)?,
                None => {
                    let mut run = flags_to_config(
                        out,
                        epochs,
                        every,
                        seed,
                        fault,
                        write_mode,
                        "binary".to_string(),
                    );
                    run.crash_at = crash_at;
                    run.kb_model = kb_model;
                    run.kb_optim = kb_optim;
                    run.dir_fsync = !no_dir_fsync;
                    run
                }
            };
            run.pause_ms = run.pause_ms.max(pause_ms);
            group_write(&run)
        }

        Command::Scan { ckpt_dir, out } => scan_single(&ckpt_dir, &out),
        Command::ScanGroup { root, out } => scan_group(&root, &out),
        Command::Rollback {
            root,
            out_link,
            group,
        } => rollback_cmd(&root, &out_link, group),
        Command::Watch {
            dir,
            out_link,
            interval_ms,
            events,
        } => watch(&dir, &out_link, interval_ms, &events),
        Command::Inject {
            path,
            mode,
            nbytes,
            tail,
            seed,
        } => inject(&path, &mode, nbytes, tail, seed),
    }
}

fn flags_to_config(
    out: PathBuf,
    epochs: u32,
    every: u32,
    seed: u64,
    fault: String,
    write_mode: String,
    format: String,
) -> RunConfig {
    RunConfig {
        out,
        epochs,
        every,
        seed,
        fault,
        write_mode,
        format,
        crash_at: "none".to_string(),
        kb_model: 128,
        kb_optim: 64,
        dir_fsync: true,
        pause_ms: 0,
    }
}

fn write(run: &RunConfig, crash_epoch: Option<u32>) -> CliResult<()> {
    if run.every == 0 {
        return Err(CliError::config_error("every must be > 0"));
    }
    let config = WriterConfig {
        out_dir: run.out.clone(),
        seed: run.seed,
        fault: run.fault_mode()?,
        write_mode: run.write_mode()?,
        format: run.container_format()?,
    };
    let plan = RunPlan {
        epochs: run.epochs,
        checkpoint_every: run.every,
        crash_epoch,
        pause: Duration::from_millis(run.pause_ms),
    };
    let outcomes = writer::run(config, &plan, &AbortHandler)
        .map_err(|e| CliError::write_failed(e.to_string()))?;
    Logger::info(
        "write_run_finished",
        &[
            ("out", &run.out.display().to_string()),
            ("checkpoints", &outcomes.len().to_string()),
        ],
    );
    Ok(())
}

fn group_write(run: &RunConfig) -> CliResult<()> {
    if run.every == 0 {
        return Err(CliError::config_error("every must be > 0"));
    }
    let config = GroupConfig {
        out_root: run.out.clone(),
        seed: run.seed,
        fault: run.fault_mode()?,
        write_mode: run.write_mode()?,
        kb_model: run.kb_model,
        kb_optim: run.kb_optim,
        dir_fsync: run.dir_fsync,
    };
    let plan = GroupRunPlan {
        epochs: run.epochs,
        checkpoint_every: run.every,
        crash_at: run.crash_point()?,
        pause: Duration::from_millis(run.pause_ms),
    };
    let outcomes = group::run(config, &plan, &AbortHandler)
        .map_err(|e| CliError::write_failed(e.to_string()))?;
    Logger::info(
        "group_run_finished",
        &[
            ("out", &run.out.display().to_string()),
            ("groups", &outcomes.len().to_string()),
        ],
    );
    Ok(())
}

fn scan_single(ckpt_dir: &Path, out: &Path) -> CliResult<()> {
    let verdicts = scan::scan_dir(ckpt_dir, &ExpectedSchema::default())
        .map_err(|e| CliError::scan_failed(format!("scan of {} failed: {}", ckpt_dir.display(), e)))?;
    scan::write_single_report(out, &verdicts)
        .map_err(|e| CliError::io_error(format!("failed to write {}: {}", out.display(), e)))?;
    Logger::info(
        "scan_report_written",
        &[
            ("out", &out.display().to_string()),
            ("rows", &verdicts.len().to_string()),
        ],
    );
    Ok(())
}

fn scan_group(root: &Path, out: &Path) -> CliResult<()> {
    let verdicts = scan::scan_groups(root)
        .map_err(|e| CliError::scan_failed(format!("scan of {} failed: {}", root.display(), e)))?;
    scan::write_group_report(out, &verdicts)
        .map_err(|e| CliError::io_error(format!("failed to write {}: {}", out.display(), e)))?;
    Logger::info(
        "group_scan_report_written",
        &[
            ("out", &out.display().to_string()),
            ("rows", &verdicts.len().to_string()),
        ],
    );
    Ok(())
}

fn rollback_cmd(root: &Path, out_link: &Path, group: bool) -> CliResult<()> {
    let candidates = if group {
        let verdicts = scan::scan_groups(root)
            .map_err(|e| CliError::scan_failed(format!("scan of {} failed: {}", root.display(), e)))?;
        rollback::candidates_from_groups(&verdicts)
    } else {
        let verdicts = scan::scan_dir(root, &ExpectedSchema::default())
            .map_err(|e| CliError::scan_failed(format!("scan of {} failed: {}", root.display(), e)))?;
        rollback::candidates_from_files(root, &verdicts)
    };

    let best = rollback::select_rollback(&candidates)
        .map_err(|e| CliError::rollback_failed(e.to_string()))?;
    rollback::update_alias(out_link, &best.path)
        .map_err(|e| CliError::rollback_failed(e.to_string()))?;
    Logger::info(
        "rollback_linked",
        &[
            ("link", &out_link.display().to_string()),
            ("target", &best.path.display().to_string()),
            ("epoch", &best.epoch.to_string()),
        ],
    );
    Ok(())
}

fn watch(dir: &Path, out_link: &Path, interval_ms: u64, events: &Path) -> CliResult<()> {
    let config = WatchConfig {
        dir: dir.to_path_buf(),
        alias: out_link.to_path_buf(),
        interval: Duration::from_millis(interval_ms.max(1)),
        events_csv: Some(events.to_path_buf()),
    };
    // Runs until the process is killed.
    let stop = AtomicBool::new(false);
    scan::watch(&config, &ExpectedSchema::default(), &stop)
        .map_err(|e| CliError::scan_failed(format!("watch failed: {}", e)))
}

fn inject(path: &Path, mode: &str, nbytes: usize, tail: u64, seed: u64) -> CliResult<()> {
    match mode {
        "bitflip" => {
            let hit = fault::flip_file_bytes(path, nbytes, seed)
                .map_err(|e| CliError::io_error(format!("bitflip failed: {}", e)))?;
            Logger::info(
                "inject_bitflip",
                &[
                    ("path", &path.display().to_string()),
                    ("bytes", &hit.to_string()),
                ],
            );
        }
        "truncate" => {
            let new_len = fault::truncate_file_tail(path, tail)
                .map_err(|e| CliError::io_error(format!("truncate failed: {}", e)))?;
            Logger::info(
                "inject_truncate",
                &[
                    ("path", &path.display().to_string()),
                    ("new_len", &new_len.to_string()),
                ],
            );
        }
        other => {
            return Err(CliError::config_error(format!(
                "unknown inject mode: {} (expected bitflip|truncate)",
                other
            )))
        }
    }
    Ok(())
}
