//! CLI argument definitions using clap
//!
//! Commands:
//! - ckptguard write        - single-file checkpoint run
//! - ckptguard group-write  - manifest+commit group run
//! - ckptguard scan         - verify single-file checkpoints, emit CSV
//! - ckptguard scan-group   - verify group checkpoints, emit CSV
//! - ckptguard rollback     - point the alias at the newest valid artifact
//! - ckptguard watch        - guard loop over a checkpoint directory
//! - ckptguard inject       - corrupt an existing file in place

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ckptguard - checkpoint crash-consistency and integrity toolkit
#[derive(Parser, Debug)]
#[command(name = "ckptguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a synthetic training loop writing single-file checkpoints
    Write {
        /// Optional JSON run configuration; flags are ignored for the
        /// fields it covers
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for checkpoints and sidecars
        #[arg(long, default_value = "trace/ckpts")]
        out: PathBuf,

        #[arg(long, default_value_t = 60)]
        epochs: u32,

        /// Checkpoint every N epochs
        #[arg(long = "every", default_value_t = 3)]
        every: u32,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Fault mode: none|bitflip|truncate|zerorange
        #[arg(long, default_value = "none")]
        fault: String,

        /// Write strategy: atomic|unsafe
        #[arg(long = "write-mode", default_value = "atomic")]
        write_mode: String,

        /// Container format: binary|json
        #[arg(long, default_value = "binary")]
        format: String,

        /// Simulate a hard crash at this epoch's checkpoint
        #[arg(long = "crash-epoch")]
        crash_epoch: Option<u32>,

        /// Sleep after each checkpoint save
        #[arg(long = "pause-ms", default_value_t = 0)]
        pause_ms: u64,
    },

    /// Run a synthetic loop writing group checkpoints (parts + manifest +
    /// commit)
    GroupWrite {
        /// Optional JSON run configuration; flags are ignored for the
        /// fields it covers
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "trace/groups/demo")]
        out: PathBuf,

        #[arg(long, default_value_t = 12)]
        epochs: u32,

        #[arg(long = "every", default_value_t = 3)]
        every: u32,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Fault mode: none|bitflip|truncate|zerorange
        #[arg(long, default_value = "none")]
        fault: String,

        /// Write strategy: atomic|unsafe
        #[arg(long = "write-mode", default_value = "atomic")]
        write_mode: String,

        /// Crash point: none|after_<part>|before_manifest|manifest_partial|before_commit
        #[arg(long = "crash-at", default_value = "none")]
        crash_at: String,

        /// Model part size in KiB
        #[arg(long = "kb-model", default_value_t = 128)]
        kb_model: usize,

        /// Optimizer part size in KiB
        #[arg(long = "kb-optim", default_value_t = 64)]
        kb_optim: usize,

        /// Skip the parent-directory fsync after COMMIT
        #[arg(long = "no-dir-fsync")]
        no_dir_fsync: bool,

        #[arg(long = "pause-ms", default_value_t = 0)]
        pause_ms: u64,
    },

    /// Verify single-file checkpoints and write a CSV report
    Scan {
        #[arg(long = "ckpt-dir", default_value = "trace/ckpts")]
        ckpt_dir: PathBuf,

        #[arg(long, default_value = "trace/guard/ckpt_scan.csv")]
        out: PathBuf,
    },

    /// Verify group checkpoints and write a CSV report
    ScanGroup {
        #[arg(long, default_value = "trace/groups/demo")]
        root: PathBuf,

        #[arg(long, default_value = "trace/guard/group_scan.csv")]
        out: PathBuf,
    },

    /// Re-scan and point a symlink at the newest valid artifact
    Rollback {
        /// Checkpoint directory (or group root with --group)
        #[arg(long)]
        root: PathBuf,

        /// Symlink to create or update
        #[arg(long = "out-link")]
        out_link: PathBuf,

        /// Treat root as a group-checkpoint root
        #[arg(long)]
        group: bool,
    },

    /// Poll a checkpoint directory, re-verify changes, roll back on
    /// corruption
    Watch {
        #[arg(long, default_value = "trace/ckpts")]
        dir: PathBuf,

        /// Symlink updated when corruption is found
        #[arg(long = "out-link", default_value = "trace/ckpts/latest_ok.tbin")]
        out_link: PathBuf,

        #[arg(long = "interval-ms", default_value_t = 1000)]
        interval_ms: u64,

        /// Verification event log (CSV, appended)
        #[arg(long, default_value = "trace/guard/events.csv")]
        events: PathBuf,
    },

    /// Corrupt an existing file in place
    Inject {
        #[arg(long)]
        path: PathBuf,

        /// bitflip|truncate
        #[arg(long)]
        mode: String,

        /// Bytes to hit for bitflip
        #[arg(long, default_value_t = 8)]
        nbytes: usize,

        /// Bytes to cut off the end for truncate
        #[arg(long, default_value_t = 512)]
        tail: u64,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
