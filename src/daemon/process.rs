//! Daemon lifecycle backed by child processes.

use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use super::DaemonControl;
use super::error::DaemonError;
use super::status::{DaemonState, DaemonStatus};

/// Starts each service by spawning its configured command line.
///
/// A watcher thread per child records the transition back to
/// [`DaemonState::Stopped`] when the process exits.
#[derive(Debug)]
pub struct ProcessDaemon {
    commands: HashMap<String, Vec<String>>,
    pids: Arc<Mutex<HashMap<String, u32>>>,
    status: Arc<DaemonStatus>,
}

impl ProcessDaemon {
    /// Create a daemon controller from `service name -> argv` entries.
    pub fn new(commands: HashMap<String, Vec<String>>) -> Self {
        Self {
            commands,
            pids: Arc::new(Mutex::new(HashMap::new())),
            status: Arc::new(DaemonStatus::new()),
        }
    }

    /// PID of the running process for `name`.
    pub fn pid(&self, name: &str) -> Option<u32> {
        lock(&self.pids).get(name).copied()
    }
}

impl DaemonControl for ProcessDaemon {
    fn start(&self, name: &str) -> Result<(), DaemonError> {
        if self.is_running(name) {
            debug!("Service '{}' already running", name);
            return Ok(());
        }

        let argv = self
            .commands
            .get(name)
            .ok_or_else(|| DaemonError::UnknownService(name.to_string()))?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DaemonError::EmptyCommand(name.to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| DaemonError::SpawnFailed {
                name: name.to_string(),
                source,
            })?;

        let pid = child.id();
        lock(&self.pids).insert(name.to_string(), pid);
        self.status.set(name, DaemonState::Running);
        info!("Started service '{}' (PID {})", name, pid);

        let service = name.to_string();
        let pids = Arc::clone(&self.pids);
        let status = Arc::clone(&self.status);
        thread::spawn(move || {
            match child.wait() {
                Ok(exit) => info!("Service '{}' exited: {}", service, exit),
                Err(e) => warn!("Failed to wait for service '{}': {}", service, e),
            }
            lock(&pids).remove(&service);
            status.set(&service, DaemonState::Stopped);
        });

        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), DaemonError> {
        let Some(pid) = self.pid(name) else {
            debug!("Service '{}' not running", name);
            return Ok(());
        };

        let pid = i32::try_from(pid).map_err(|_| DaemonError::SignalFailed {
            name: name.to_string(),
            source: nix::Error::ESRCH,
        })?;

        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(nix::Error::ESRCH) => Ok(()),
            Err(source) => Err(DaemonError::SignalFailed {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn is_running(&self, name: &str) -> bool {
        self.status.get(name) == DaemonState::Running
    }

    fn wait_for_state(&self, name: &str, state: DaemonState, timeout: Duration) -> bool {
        self.status.wait_for(name, state, timeout)
    }
}

fn lock(pids: &Mutex<HashMap<String, u32>>) -> MutexGuard<'_, HashMap<String, u32>> {
    pids.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper() -> ProcessDaemon {
        let mut commands = HashMap::new();
        commands.insert(
            "wpa_supplicant".to_string(),
            vec!["sleep".to_string(), "30".to_string()],
        );
        commands.insert("broken".to_string(), Vec::new());
        ProcessDaemon::new(commands)
    }

    #[test]
    fn test_start_and_stop() {
        let daemon = sleeper();
        assert!(!daemon.is_running("wpa_supplicant"));

        daemon.start("wpa_supplicant").unwrap();
        assert!(daemon.is_running("wpa_supplicant"));
        assert!(daemon.pid("wpa_supplicant").is_some());

        // Starting again is a no-op
        daemon.start("wpa_supplicant").unwrap();

        daemon.stop("wpa_supplicant").unwrap();
        assert!(daemon.wait_for_state(
            "wpa_supplicant",
            DaemonState::Stopped,
            Duration::from_secs(5)
        ));
        assert!(daemon.pid("wpa_supplicant").is_none());
    }

    #[test]
    fn test_stop_when_not_running() {
        let daemon = sleeper();
        daemon.stop("wpa_supplicant").unwrap();
    }

    #[test]
    fn test_unknown_and_empty_services() {
        let daemon = sleeper();
        assert!(matches!(
            daemon.start("p2p_supplicant"),
            Err(DaemonError::UnknownService(_))
        ));
        assert!(matches!(
            daemon.start("broken"),
            Err(DaemonError::EmptyCommand(_))
        ));
    }
}
