//! Observability for ckptguard
//!
//! Two output surfaces, both synchronous and line-oriented:
//! - Structured JSON logs (diagnostics; deterministic key ordering)
//! - `APP_EVENT` records on stdout (`checkpoint_saved`, `simulated_crash`,
//!   `done`), the sole interface exposed to external tracing tools
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No async or background threads
//! 4. Deterministic output

pub mod events;
mod logger;

pub use events::unix_ts;
pub use logger::{Logger, Severity};
