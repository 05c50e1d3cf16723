//! Command-line interface.
//!
//! Argument definitions in `args`, optional JSON run configuration in
//! `config`, command implementations in `commands`. `run()` is the whole
//! entry point; `main.rs` only calls it and reports the error.

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::run_command;
pub use config::RunConfig;
pub use errors::{CliError, CliResult};

/// Parse arguments and dispatch.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}
