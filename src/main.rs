//! helper-codesign CLI entry point.

use clap::Parser;
use helper_codesign::config::DEBUG_LOG_PATH;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod cli;

/// helper-codesign - align a privileged helper's signing requirements with the build identity
#[derive(Parser, Debug)]
#[command(name = "helper-codesign")]
#[command(about = "Align a privileged helper's signing requirements with the build identity")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    configure: cli::configure::ConfigureCmd,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on RUST_LOG or default to warn
    init_logging(cli.configure.debug_log);

    tracing::debug!(version = helper_codesign::VERSION, "starting helper-codesign");

    if let Err(e) = cli.configure.run() {
        tracing::error!(error = %e, "helper signing configuration failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
///
/// With `debug_log` set, debug events are also appended to [`DEBUG_LOG_PATH`].
fn init_logging(debug_log: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("helper_codesign=warn"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let file_layer = if debug_log {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(DEBUG_LOG_PATH)
        {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(EnvFilter::new("helper_codesign=debug")),
            ),
            Err(e) => {
                eprintln!("warning: cannot open {}: {}", DEBUG_LOG_PATH, e);
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
