//! Body-based routing sidecar.
//!
//! Resolves and validates the command-line configuration, then reports it.
//! Listener bootstrap consumes the validated options.

use std::process::ExitCode;

use body_router::lifecycle::startup::{self, StartupError};

fn main() -> ExitCode {
    let options = match startup::prepare(std::env::args_os()) {
        Ok(options) => options,
        Err(StartupError::Flags(err)) => err.exit(),
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = options.logging.init() {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    tracing::info!("body-router v{} starting", env!("CARGO_PKG_VERSION"));
    startup::report(&options);

    ExitCode::SUCCESS
}
