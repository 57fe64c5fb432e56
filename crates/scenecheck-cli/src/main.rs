//! scenecheck entry point.
//!
//! Validate a scene document:
//! ```bash
//! cargo run -p scenecheck-cli -- check level.json
//! ```

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scenecheck_cli::Args;

fn main() -> ExitCode {
    // Diagnostics go to stderr so reports stay parseable (respects RUST_LOG)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match scenecheck_cli::run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("scenecheck: {e:#}");
            ExitCode::from(2)
        }
    }
}
