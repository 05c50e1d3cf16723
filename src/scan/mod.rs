//! Integrity scanning: read-only verification of single checkpoints and
//! group checkpoints, CSV reporting, and the guard/watch loop.

pub mod group;
pub mod reason;
pub mod report;
pub mod single;
pub mod watch;

pub use group::{scan_group_dir, scan_groups, GroupVerdict};
pub use reason::Reason;
pub use report::{write_group_report, write_single_report};
pub use single::{parse_epoch, scan_dir, scan_file, ExpectedSchema, FileVerdict};
pub use watch::{poll_once, watch, WatchConfig};
