//! Line-oriented `APP_EVENT` records emitted to stdout.
//!
//! Format: `APP_EVENT,<name>,k1=v1,k2=v2,...` - one line per significant
//! writer action, flushed immediately so a crash right after emission still
//! leaves the line visible to external tracing tools that correlate these
//! records with OS-level I/O traces.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time as a float with sub-second precision.
///
/// Event records and commit/sidecar timestamps use this representation.
pub fn unix_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Emit one `APP_EVENT` line to stdout, flushed.
pub fn emit(name: &str, fields: &[(&str, String)]) {
    let mut line = render(name, fields);
    line.push('\n');

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = handle.write_all(line.as_bytes());
    let _ = handle.flush();
}

/// A checkpoint (single-file or group commit) reached disk.
pub fn checkpoint_saved(epoch: u32, path: &std::path::Path) {
    emit(
        "checkpoint_saved",
        &[
            ("ts", format!("{:.6}", unix_ts())),
            ("epoch", epoch.to_string()),
            ("path", path.display().to_string()),
        ],
    );
}

/// Emitted immediately before a simulated crash terminates the process.
pub fn simulated_crash(epoch: u32, point: &str) {
    emit(
        "simulated_crash",
        &[
            ("ts", format!("{:.6}", unix_ts())),
            ("epoch", epoch.to_string()),
            ("point", point.to_string()),
        ],
    );
}

/// A multi-epoch writer run completed normally.
pub fn done(epochs: u32) {
    emit("done", &[("epochs", epochs.to_string())]);
}

/// Render an event line without writing it.
pub fn render(name: &str, fields: &[(&str, String)]) -> String {
    let mut line = format!("APP_EVENT,{}", name);
    for (key, value) in fields {
        line.push(',');
        line.push_str(key);
        line.push('=');
        line.push_str(value);
    }
    line
}
