//! Command-line interface definitions for supplicant-link.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Control-channel client for wpa_supplicant-family daemons.
///
/// Talks to a running supplicant over its local control sockets: send
/// commands, stream events, and manage the daemon's lifecycle.
#[derive(Parser, Debug)]
#[command(name = "supplicant-link")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to additional config file.
    ///
    /// This config file is merged on top of system and user configs,
    /// giving it the highest priority (except for CLI flags).
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Primary interface name (overrides `interface.primary`).
    #[arg(long = "primary", value_name = "IFACE", global = true)]
    pub primary: Option<String>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for supplicant-link.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the daemon answers (`PING`).
    Ping {
        /// Interface to talk to (default: primary).
        #[arg(short = 'i', long = "iface", value_name = "IFACE")]
        iface: Option<String>,
    },

    /// Send one command and print the reply.
    Command {
        /// Interface to talk to (default: primary).
        #[arg(short = 'i', long = "iface", value_name = "IFACE")]
        iface: Option<String>,

        /// Command words, joined with spaces (e.g. `SCAN_RESULTS`).
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print events until the daemon terminates or Ctrl-C.
    Monitor {
        /// Interface to talk to (default: primary).
        #[arg(short = 'i', long = "iface", value_name = "IFACE")]
        iface: Option<String>,
    },

    /// Remove client sockets left behind by dead processes.
    Cleanup,

    /// Start the daemon, stream its events, and stop it on Ctrl-C.
    Supervise {
        /// Run the P2P service instead of the station service.
        #[arg(long = "p2p")]
        p2p: bool,

        /// Interface to monitor (default: primary).
        #[arg(short = 'i', long = "iface", value_name = "IFACE")]
        iface: Option<String>,
    },

    /// Print the merged configuration as TOML.
    ShowConfig,
}
