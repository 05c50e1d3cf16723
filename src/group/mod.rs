//! Multi-file group checkpoints with a two-phase manifest+commit protocol.
//!
//! One epoch's group lives in its own directory and is written in a
//! strict order: parts, then `MANIFEST.json` describing them, then
//! `COMMIT.json` naming the manifest's hash. An interrupted writer can
//! leave intact-looking parts behind; only the commit record makes the
//! group count. In atomic mode the parent directory is fsynced after the
//! commit (toggleable) so the commit's directory entry survives power
//! loss.
//!
//! Crash points are honored in unsafe mode only; atomic mode has nothing
//! torn to demonstrate.

pub mod commit;
pub mod errors;
pub mod manifest;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;

use crate::crash::{CrashHandler, CrashPoint};
use crate::fault::{FaultInjector, FaultMode};
use crate::hash::sha256_hex;
use crate::observability::events;
use crate::persist::{self, WriteMode};

pub use commit::Commit;
pub use errors::{GroupError, GroupResult};
pub use manifest::{Manifest, PartEntry};

pub const MANIFEST_FILE: &str = "MANIFEST.json";
pub const COMMIT_FILE: &str = "COMMIT.json";

/// Part names in protocol order.
pub const PART_ORDER: [&str; 3] = ["model.bin", "optim.bin", "rng.json"];

/// Group writer configuration for one run.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub out_root: PathBuf,
    pub seed: u64,
    pub fault: FaultMode,
    pub write_mode: WriteMode,
    /// Size of the model part, in KiB.
    pub kb_model: usize,
    /// Size of the optimizer part, in KiB.
    pub kb_optim: usize,
    /// Fsync the epoch directory after the commit (atomic mode only).
    pub dir_fsync: bool,
}

/// Result of one group write.
#[derive(Debug)]
pub struct GroupOutcome {
    pub dir: PathBuf,
    /// Hash of the manifest bytes, once the protocol got that far.
    pub manifest_sha256: Option<String>,
    pub committed: bool,
    /// A simulated crash interrupted the protocol. With a production
    /// crash handler this outcome is never observed.
    pub crashed: bool,
}

/// Epoch directory under the group root: `epoch_<%04d>`.
pub fn epoch_dir(root: &Path, epoch: u32) -> PathBuf {
    root.join(format!("epoch_{:04}", epoch))
}

/// Writes one group per epoch under the two-phase protocol.
pub struct GroupWriter<'a> {
    config: GroupConfig,
    injector: FaultInjector,
    crash: &'a dyn CrashHandler,
}

impl<'a> GroupWriter<'a> {
    pub fn new(config: GroupConfig, crash: &'a dyn CrashHandler) -> Self {
        let injector = FaultInjector::new(config.seed);
        Self {
            config,
            injector,
            crash,
        }
    }

    /// Runs the protocol for one epoch.
    ///
    /// `crash_at` takes effect in unsafe mode only. When the crash handler
    /// returns (tests), the protocol stops with on-disk state exactly as an
    /// aborted process would leave it.
    pub fn write_epoch(
        &mut self,
        epoch: u32,
        crash_at: Option<&CrashPoint>,
    ) -> GroupResult<GroupOutcome> {
        let dir = epoch_dir(&self.config.out_root, epoch);
        let unsafe_mode = self.config.write_mode == WriteMode::Unsafe;
        let crash_at = if unsafe_mode { crash_at } else { None };

        let parts = gen_parts(
            self.config.seed,
            epoch,
            self.config.kb_model,
            self.config.kb_optim,
        )?;

        // Phase 1: parts, in fixed order. The manifest records the bytes
        // intended for disk (post fault injection), so a silent fault alone
        // does not contradict the manifest.
        let mut entries = Vec::with_capacity(parts.len());
        for (name, clean) in parts {
            let data = self.injector.apply(&clean, self.config.fault);
            let path = dir.join(&name);

            // `after_model` and `after_model.bin` both name the model part.
            let stem = name.split('.').next().unwrap_or(name.as_str());
            let partial = matches!(
                crash_at,
                Some(CrashPoint::AfterPart(p)) if *p == name || p.as_str() == stem
            );
            persist::write_bytes(self.config.write_mode, &path, &data, partial)?;
            entries.push(PartEntry {
                path: name,
                bytes: data.len() as u64,
                sha256: sha256_hex(&data),
            });

            if partial {
                if let Some(point) = crash_at {
                    return Ok(self.crashed(epoch, point, dir, None));
                }
            }
        }

        if matches!(crash_at, Some(CrashPoint::BeforeManifest)) {
            if let Some(point) = crash_at {
                return Ok(self.crashed(epoch, point, dir, None));
            }
        }

        // Phase 2: manifest.
        let manifest = Manifest {
            epoch,
            seed: self.config.seed,
            parts: entries,
        };
        let man_bytes = manifest.to_json()?;
        let man_sha = sha256_hex(&man_bytes);

        let man_partial = matches!(crash_at, Some(CrashPoint::ManifestPartial));
        persist::write_bytes(
            self.config.write_mode,
            &dir.join(MANIFEST_FILE),
            &man_bytes,
            man_partial,
        )?;

        if man_partial || matches!(crash_at, Some(CrashPoint::BeforeCommit)) {
            if let Some(point) = crash_at {
                return Ok(self.crashed(epoch, point, dir, Some(man_sha)));
            }
        }

        // Phase 3: commit, then make its directory entry durable.
        let commit = Commit {
            epoch,
            seed: self.config.seed,
            manifest_sha256: man_sha.clone(),
            ts: events::unix_ts(),
        };
        persist::write_bytes(
            self.config.write_mode,
            &dir.join(COMMIT_FILE),
            &commit.to_json()?,
            false,
        )?;
        if self.config.write_mode == WriteMode::Atomic && self.config.dir_fsync {
            persist::fsync_dir(&dir)?;
        }

        events::checkpoint_saved(epoch, &dir);
        Ok(GroupOutcome {
            dir,
            manifest_sha256: Some(man_sha),
            committed: true,
            crashed: false,
        })
    }

    fn crashed(
        &self,
        epoch: u32,
        point: &CrashPoint,
        dir: PathBuf,
        man_sha: Option<String>,
    ) -> GroupOutcome {
        self.crash.crash(epoch, point);
        // Only reached with a recording handler; the simulated process is
        // dead from here on.
        GroupOutcome {
            dir,
            manifest_sha256: man_sha,
            committed: false,
            crashed: true,
        }
    }
}

/// Plan for a multi-epoch group run.
#[derive(Debug, Clone)]
pub struct GroupRunPlan {
    pub epochs: u32,
    pub checkpoint_every: u32,
    /// Crash point injected at each checkpointed epoch (unsafe mode).
    pub crash_at: Option<CrashPoint>,
    /// Pacing between group writes.
    pub pause: Duration,
}

/// Runs group checkpoints on a cadence. Stops at the first simulated
/// crash; returns the outcomes of the groups written.
pub fn run(
    config: GroupConfig,
    plan: &GroupRunPlan,
    crash: &dyn CrashHandler,
) -> GroupResult<Vec<GroupOutcome>> {
    let mut writer = GroupWriter::new(config, crash);
    let mut outcomes = Vec::new();

    let mut epoch = plan.checkpoint_every;
    while epoch <= plan.epochs {
        let outcome = writer.write_epoch(epoch, plan.crash_at.as_ref())?;
        let crashed = outcome.crashed;
        outcomes.push(outcome);
        if crashed {
            return Ok(outcomes);
        }
        if !plan.pause.is_zero() {
            std::thread::sleep(plan.pause);
        }
        epoch += plan.checkpoint_every;
    }

    events::done(plan.epochs);
    Ok(outcomes)
}

/// Generates one epoch's parts in protocol order: seeded random model and
/// optimizer blobs plus a small JSON state record.
pub fn gen_parts(
    seed: u64,
    epoch: u32,
    kb_model: usize,
    kb_optim: usize,
) -> GroupResult<Vec<(String, Vec<u8>)>> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(1000).wrapping_add(epoch as u64));

    let mut model = vec![0u8; kb_model * 1024];
    rng.fill_bytes(&mut model);
    let mut optim = vec![0u8; kb_optim * 1024];
    rng.fill_bytes(&mut optim);

    #[derive(Serialize)]
    struct RngState {
        epoch: u32,
        seed: u64,
        ts: f64,
    }
    let state = serde_json::to_vec(&RngState {
        epoch,
        seed,
        ts: events::unix_ts(),
    })?;

    Ok(vec![
        (PART_ORDER[0].to_string(), model),
        (PART_ORDER[1].to_string(), optim),
        (PART_ORDER[2].to_string(), state),
    ])
}
