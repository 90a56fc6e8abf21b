//! `cargo libship ...` entry point.
//!
//! Cargo invokes subcommands as `cargo-libship libship <args>`, so the
//! second argument is dropped before parsing.

use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args: Vec<_> = env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == "libship") {
        args.remove(1);
    }

    match libship::run_from(args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}
