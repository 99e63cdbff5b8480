//! Daemon lifecycle error types.

use thiserror::Error;

/// Errors from starting or stopping a daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// No command line is configured for this service.
    #[error("No command configured for service '{0}'")]
    UnknownService(String),

    /// The configured command line is empty.
    #[error("Empty command line for service '{0}'")]
    EmptyCommand(String),

    /// Failed to spawn the daemon process.
    #[error("Failed to spawn service '{name}': {source}")]
    SpawnFailed {
        /// The service name.
        name: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to signal the daemon process.
    #[error("Failed to signal service '{name}': {source}")]
    SignalFailed {
        /// The service name.
        name: String,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },
}
