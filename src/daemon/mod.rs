//! Supplicant daemon lifecycle.
//!
//! The control channel only talks to a daemon that is already running.
//! Starting and stopping it goes through [`DaemonControl`], which hides
//! whether the service is a child process, an init-system unit or a test
//! double.

mod error;
mod process;
mod status;

use std::time::Duration;

pub use error::DaemonError;
pub use process::ProcessDaemon;
pub use status::{DaemonState, DaemonStatus};

/// Start, stop and observe named daemon services.
pub trait DaemonControl: Send + Sync {
    /// Ask the service to start. Returns once the request is issued.
    fn start(&self, name: &str) -> Result<(), DaemonError>;

    /// Ask the service to stop. Returns once the request is issued.
    fn stop(&self, name: &str) -> Result<(), DaemonError>;

    /// Whether the service is currently running.
    fn is_running(&self, name: &str) -> bool;

    /// Block until the service reaches `state` or `timeout` elapses.
    fn wait_for_state(&self, name: &str, state: DaemonState, timeout: Duration) -> bool;
}
