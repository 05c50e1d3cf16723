//! Single-checkpoint writer.
//!
//! Per epoch: serialize the payload to container bytes, capture the
//! content digest and file hash of the clean bytes, apply the fault
//! injector, then persist sidecar and checkpoint under the configured
//! write strategy. The sidecar write and the checkpoint write are
//! independent; the scanner tolerates either existing alone.

pub mod errors;
pub mod sidecar;

use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::crash::{CrashHandler, CrashPoint};
use crate::fault::{FaultInjector, FaultMode};
use crate::hash::sha256_hex;
use crate::observability::events;
use crate::payload::{content_digest, ContainerFormat, Payload, PayloadView, Tensor};
use crate::persist::{self, WriteMode};

pub use errors::{WriterError, WriterResult};
pub use sidecar::{sidecar_path, SidecarMetadata};

/// Canonical key order of the synthetic four-tensor payload.
pub const DEFAULT_KEY_ORDER: [&str; 4] = ["W1", "b1", "W2", "b2"];

pub fn default_key_order() -> Vec<String> {
    DEFAULT_KEY_ORDER.iter().map(|k| k.to_string()).collect()
}

/// Writer configuration for one run.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub out_dir: PathBuf,
    pub seed: u64,
    pub fault: FaultMode,
    pub write_mode: WriteMode,
    pub format: ContainerFormat,
}

/// Result of one checkpoint write.
#[derive(Debug)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub sidecar_path: PathBuf,
    pub content_digest: String,
    pub file_sha256: String,
    /// A simulated crash fired after the save. With a production crash
    /// handler this outcome is never observed.
    pub crashed: bool,
}

/// Writes one checkpoint file plus sidecar per epoch.
pub struct CheckpointWriter<'a> {
    config: WriterConfig,
    injector: FaultInjector,
    crash: &'a dyn CrashHandler,
}

impl<'a> CheckpointWriter<'a> {
    pub fn new(config: WriterConfig, crash: &'a dyn CrashHandler) -> Self {
        let injector = FaultInjector::new(config.seed);
        Self {
            config,
            injector,
            crash,
        }
    }

    /// Checkpoint file path for an epoch: `ckpt_epoch_<%04d>.<ext>`.
    pub fn checkpoint_path(&self, epoch: u32) -> PathBuf {
        self.config.out_dir.join(format!(
            "ckpt_epoch_{:04}.{}",
            epoch,
            self.config.format.extension()
        ))
    }

    /// Persists one epoch's payload.
    ///
    /// With `crash_after` in atomic mode the crash fires after a complete
    /// save (the artifact must later scan as valid); in unsafe mode the
    /// checkpoint bytes are additionally written partially, emulating a
    /// crash mid-write.
    pub fn write_epoch(
        &mut self,
        payload: &Payload,
        key_order: &[String],
        epoch: u32,
        crash_after: bool,
    ) -> WriterResult<WriteOutcome> {
        // Digest before serialization: a schema mismatch must abort before
        // any bytes persist.
        let digest = content_digest(payload, key_order)?;

        let clean = self.config.format.encode(payload)?;
        let file_sha = sha256_hex(&clean);

        let raw = self.injector.apply(&clean, self.config.fault);

        let ckpt_path = self.checkpoint_path(epoch);
        let meta_path = sidecar_path(&ckpt_path);

        let meta = SidecarMetadata {
            epoch,
            ts: events::unix_ts(),
            seed: self.config.seed,
            fault: self.config.fault.as_str().to_string(),
            write_mode: self.config.write_mode.as_str().to_string(),
            expected_digest: digest.clone(),
            expected_file_sha256: file_sha.clone(),
            note: "ckpt-integrity".to_string(),
        };
        // Sidecar first, then checkpoint bytes.
        meta.write_to_file(&meta_path)?;

        let partial = crash_after && self.config.write_mode == WriteMode::Unsafe;
        persist::write_bytes(self.config.write_mode, &ckpt_path, &raw, partial)?;

        events::checkpoint_saved(epoch, &ckpt_path);

        if crash_after {
            self.crash.crash(epoch, &CrashPoint::AfterSave);
            return Ok(WriteOutcome {
                path: ckpt_path,
                sidecar_path: meta_path,
                content_digest: digest,
                file_sha256: file_sha,
                crashed: true,
            });
        }

        Ok(WriteOutcome {
            path: ckpt_path,
            sidecar_path: meta_path,
            content_digest: digest,
            file_sha256: file_sha,
            crashed: false,
        })
    }
}

/// Plan for a multi-epoch writer run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub epochs: u32,
    pub checkpoint_every: u32,
    /// Simulate a crash at this epoch's checkpoint, if set.
    pub crash_epoch: Option<u32>,
    /// Pacing between checkpoint saves, for observability parity with
    /// traced runs.
    pub pause: Duration,
}

/// Runs a synthetic multi-epoch training loop, checkpointing every
/// `checkpoint_every` epochs. Returns the outcomes of the checkpoints
/// actually written.
pub fn run(
    config: WriterConfig,
    plan: &RunPlan,
    crash: &dyn CrashHandler,
) -> WriterResult<Vec<WriteOutcome>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut payload = synthetic_payload(&mut rng);
    let key_order = default_key_order();
    let mut writer = CheckpointWriter::new(config, crash);

    let mut outcomes = Vec::new();
    for epoch in 1..=plan.epochs {
        perturb_payload(&mut payload, &mut rng);
        if epoch % plan.checkpoint_every != 0 {
            continue;
        }

        let crash_here = plan.crash_epoch == Some(epoch);
        let outcome = writer.write_epoch(&payload, &key_order, epoch, crash_here)?;
        let crashed = outcome.crashed;
        outcomes.push(outcome);

        if crashed {
            // A real handler never returns; a recording handler means the
            // simulated process is dead from here on.
            return Ok(outcomes);
        }

        if !plan.pause.is_zero() {
            std::thread::sleep(plan.pause);
        }
    }

    events::done(plan.epochs);
    Ok(outcomes)
}

/// Builds the synthetic four-tensor payload (a tiny model state).
pub fn synthetic_payload(rng: &mut StdRng) -> Payload {
    let mut payload = Payload::new();
    payload.insert("W1", random_tensor(rng, &[128, 128], 0.02));
    payload.insert("b1", random_tensor(rng, &[128], 0.02));
    payload.insert("W2", random_tensor(rng, &[128, 10], 0.02));
    payload.insert("b2", random_tensor(rng, &[10], 0.02));
    payload
}

/// Applies one epoch's worth of random-walk drift to every tensor.
pub fn perturb_payload(payload: &mut Payload, rng: &mut StdRng) {
    for key in ["W1", "b1", "W2", "b2"] {
        if let Some(tensor) = payload.tensor(key) {
            let shape = tensor.shape().to_vec();
            let mut values = tensor.f64_values().into_iter();
            let updated = Tensor::filled_f64(shape, || {
                values.next().unwrap_or(0.0) + rng.gen_range(-0.0005..0.0005)
            });
            payload.insert(key, updated);
        }
    }
}

fn random_tensor(rng: &mut StdRng, shape: &[usize], scale: f64) -> Tensor {
    Tensor::filled_f64(shape.to_vec(), || rng.gen_range(-scale..scale))
}
