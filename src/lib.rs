//! supplicant-link: control-channel client for wpa_supplicant-family daemons
//!
//! Talks to a supplicant over its local datagram control interface. One
//! connection carries request/reply commands, a second one is attached as
//! an event monitor, and a cancel pair lets any thread wake a reader that
//! is blocked on the monitor.
//!
//! # Architecture
//!
//! - **Ctrl**: Control sockets, channels, command dispatch, event reading
//! - **Daemon**: Starting, stopping and observing the supplicant service
//! - **HAL**: Per-interface lifecycle facade over the two above
//! - **Config**: Hierarchical TOML configuration
//! - **Telemetry**: Structured syslog logging for audit trails

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod ctrl;
pub mod daemon;
pub mod hal;
pub mod telemetry;
