// src/bin/fernc.rs

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fernc::cli::{resolve_items, Options};
use fernc::driver::compile_all;
use fernc::global::Global;
use fernc::make;

fn main() -> ExitCode {
    // Developer telemetry goes through tracing, gated on FERNC_LOG.
    if let Ok(filter) = EnvFilter::try_from_env("FERNC_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let mut options = Options::parse();
    options.normalize();
    let mut global = Global::new(options);

    let items = resolve_items(&mut global);
    if global.has_errors() {
        global.flush_messages();
        return ExitCode::FAILURE;
    }

    let ok = if global.options.make {
        make::build(&mut global, items)
    } else {
        compile_all(&mut global, &items)
    };

    // Anything still pending (IDE mode, late tool failures) goes out now.
    global.flush_messages();
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
