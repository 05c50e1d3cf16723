//! ckptguard CLI entry point.
//!
//! Parses arguments, dispatches, prints errors to stderr, exits non-zero
//! on failure. All logic lives in the library.

use ckptguard::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
