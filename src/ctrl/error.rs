//! Error types for control channel operations.
//!
//! This module defines errors for:
//! - Opening and attaching the command/monitor connections
//! - Command exchanges (timeouts, transport failures, `FAIL` replies)

use std::path::PathBuf;
use thiserror::Error;

/// Errors from control channel operations.
#[derive(Debug, Error)]
pub enum CtrlError {
    /// Failed to open a connection to the daemon's control endpoint.
    #[error("Failed to connect to control endpoint {path}: {source}")]
    Connect {
        /// The endpoint we tried to reach.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The monitor connection could not be registered for events.
    #[error("Failed to attach monitor to {path}: {reason}")]
    Attach {
        /// The endpoint whose monitor connection was being attached.
        path: PathBuf,
        /// Why the attach step failed.
        reason: String,
    },

    /// Failed to create the cancellation pair.
    #[error("Failed to create cancellation pair: {0}")]
    CancelPair(#[source] std::io::Error),

    /// No reply arrived within the command timeout.
    #[error("Command '{command}' timed out")]
    Timeout {
        /// The command that timed out.
        command: String,
    },

    /// The daemon answered with a `FAIL` reply.
    #[error("Command '{command}' failed: {reply}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// The full reply body.
        reply: String,
    },

    /// Socket-level failure while exchanging a command.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The channel was closed before or during the operation.
    #[error("Control channel is closed")]
    Closed,
}

impl CtrlError {
    /// Whether this error is a command timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CtrlError::Timeout { .. })
    }

    /// Whether this error came from opening the channel.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            CtrlError::Connect { .. } | CtrlError::Attach { .. } | CtrlError::CancelPair(_)
        )
    }
}

/// Result type for control channel operations.
pub type CtrlResult<T> = Result<T, CtrlError>;
