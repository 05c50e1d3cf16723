//! Simulated crash injection for the write protocols.
//!
//! A simulated crash is deliberate, immediate process termination with no
//! unwinding, no cleanup handlers, and no buffered-data flush. It must be
//! indistinguishable internally from an external kill, otherwise the
//! crash-consistency experiments prove nothing.
//!
//! Termination goes through the [`CrashHandler`] trait because a genuine
//! hard exit is unobservable by a test harness sharing the process:
//! production uses [`AbortHandler`] (`std::process::abort()`), tests use
//! [`RecordingHandler`] which records the point and returns. Writers stop
//! the protocol immediately after the handler returns, leaving on-disk
//! state exactly as a real crash would.

use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use crate::observability::events;

/// A named logical point in a write protocol where a crash is injected.
///
/// Each point produces a distinguishable on-disk defect that the group
/// scanner must classify correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashPoint {
    /// Crash while writing the named part: that part is written partially,
    /// later parts and the manifest are missing.
    AfterPart(String),
    /// Crash after all parts, before the manifest: manifest absent.
    BeforeManifest,
    /// Crash mid-manifest: manifest present but truncated/unparseable.
    ManifestPartial,
    /// Crash after a valid manifest, before the commit: commit absent.
    BeforeCommit,
    /// Crash after a fully completed save; the artifact must scan as valid.
    AfterSave,
}

impl CrashPoint {
    /// Stable name used in CLI arguments and event records.
    pub fn name(&self) -> String {
        match self {
            CrashPoint::AfterPart(part) => format!("after_{}", part),
            CrashPoint::BeforeManifest => "before_manifest".to_string(),
            CrashPoint::ManifestPartial => "manifest_partial".to_string(),
            CrashPoint::BeforeCommit => "before_commit".to_string(),
            CrashPoint::AfterSave => "after_save".to_string(),
        }
    }
}

impl fmt::Display for CrashPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CrashPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before_manifest" => Ok(CrashPoint::BeforeManifest),
            "manifest_partial" => Ok(CrashPoint::ManifestPartial),
            "before_commit" => Ok(CrashPoint::BeforeCommit),
            "after_save" => Ok(CrashPoint::AfterSave),
            other => match other.strip_prefix("after_") {
                Some(part) if !part.is_empty() => Ok(CrashPoint::AfterPart(part.to_string())),
                _ => Err(format!("unknown crash point: {}", other)),
            },
        }
    }
}

/// Substitutable "abort now" effect invoked by the write pipelines.
pub trait CrashHandler {
    /// Terminate (or record the termination of) the process at `point`.
    ///
    /// A production handler never returns. If this returns, the caller must
    /// stop the protocol immediately and touch no further on-disk state.
    fn crash(&self, epoch: u32, point: &CrashPoint);
}

/// Production handler: emits the `simulated_crash` event record, then
/// terminates via `std::process::abort()`: no unwinding, no catching.
#[derive(Debug, Default)]
pub struct AbortHandler;

impl CrashHandler for AbortHandler {
    fn crash(&self, epoch: u32, point: &CrashPoint) {
        events::simulated_crash(epoch, &point.name());
        std::process::abort();
    }
}

/// Test handler: records every crash invocation instead of terminating.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    crashes: RefCell<Vec<(u32, CrashPoint)>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the writer would have crashed at, in invocation order.
    pub fn recorded(&self) -> Vec<(u32, CrashPoint)> {
        self.crashes.borrow().clone()
    }

    pub fn crash_count(&self) -> usize {
        self.crashes.borrow().len()
    }
}

impl CrashHandler for RecordingHandler {
    fn crash(&self, epoch: u32, point: &CrashPoint) {
        self.crashes.borrow_mut().push((epoch, point.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crash_point_names() {
        assert_eq!(CrashPoint::BeforeManifest.name(), "before_manifest");
        assert_eq!(CrashPoint::ManifestPartial.name(), "manifest_partial");
        assert_eq!(CrashPoint::BeforeCommit.name(), "before_commit");
        assert_eq!(CrashPoint::AfterSave.name(), "after_save");
        assert_eq!(
            CrashPoint::AfterPart("model.bin".to_string()).name(),
            "after_model.bin"
        );
    }

    #[test]
    fn test_crash_point_parse_roundtrip() {
        for name in [
            "before_manifest",
            "manifest_partial",
            "before_commit",
            "after_save",
        ] {
            let point: CrashPoint = name.parse().unwrap();
            assert_eq!(point.name(), name);
        }

        let point: CrashPoint = "after_model.bin".parse().unwrap();
        assert_eq!(point, CrashPoint::AfterPart("model.bin".to_string()));
    }

    #[test]
    fn test_crash_point_parse_rejects_unknown() {
        assert!("".parse::<CrashPoint>().is_err());
        assert!("after_".parse::<CrashPoint>().is_err());
        assert!("during_commit".parse::<CrashPoint>().is_err());
    }

    #[test]
    fn test_recording_handler_records_in_order() {
        let handler = RecordingHandler::new();
        handler.crash(3, &CrashPoint::BeforeManifest);
        handler.crash(6, &CrashPoint::BeforeCommit);

        let recorded = handler.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0], (3, CrashPoint::BeforeManifest));
        assert_eq!(recorded[1], (6, CrashPoint::BeforeCommit));
    }
}
