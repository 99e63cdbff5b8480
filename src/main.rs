//! supplicant-link: command-line client for wpa_supplicant control sockets.
//!
//! # I/O
//!
//! - **Replies and events** go to stdout, one per line
//! - **Debug logging** goes to stderr, filtered by `-v`
//! - **Audit logging** goes to syslog; when syslog is unreachable the
//!   binary keeps running with audit events discarded

use anyhow::{Context, Result};
use clap::Parser;
use supplicant_link::{cli::Cli, cli_handler::handle_command, config::ConfigLoader, telemetry};
use tracing::{debug, warn};

fn main() -> Result<()> {
    // Parse CLI arguments first (before any other initialization)
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    debug!("Parsed CLI arguments: {:?}", cli);

    if let Err(e) = telemetry::init_logger() {
        warn!("Audit logging disabled: {}", e);
        telemetry::init_null_logger().context("Failed to initialize telemetry")?;
    }

    // Load configuration with hierarchy merging
    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;

    debug!("Loaded configuration: {:?}", config);

    handle_command(cli.command, &config)
}

/// Initialize the tracing subscriber for debug logging on stderr.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG`, or warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
