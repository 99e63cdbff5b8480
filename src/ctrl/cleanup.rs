//! Startup garbage collection for client sockets.
//!
//! Every connection binds a `<prefix><pid>-<counter>` socket file in the
//! client directory and removes it on drop. A process killed with SIGKILL
//! never gets to run `Drop`, so its files stay behind and pile up across
//! daemon restarts.
//!
//! Run this before starting the daemon.
//!
//! ```no_run
//! use supplicant_link::ctrl::{ClientEndpoint, cleanup_stale_client_sockets};
//!
//! let removed = cleanup_stale_client_sockets(&ClientEndpoint::default());
//! println!("removed {} stale sockets", removed);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::socket::ClientEndpoint;

/// Remove client sockets whose owning process is gone.
///
/// Returns the number of files removed. Errors are logged, never returned.
pub fn cleanup_stale_client_sockets(client: &ClientEndpoint) -> usize {
    let stale = list_stale_client_sockets(client);
    let mut removed = 0;

    for path in stale {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed stale client socket {:?}", path);
                removed += 1;
            }
            Err(e) => warn!("Failed to remove stale client socket {:?}: {}", path, e),
        }
    }

    removed
}

/// List client sockets whose owning process is gone.
///
/// Files carrying the prefix but no parseable PID are treated as stale.
pub fn list_stale_client_sockets(client: &ClientEndpoint) -> Vec<PathBuf> {
    let entries = match fs::read_dir(&client.dir) {
        Ok(e) => e,
        Err(e) => {
            debug!("Cannot read client socket dir {:?}: {}", client.dir, e);
            return Vec::new();
        }
    };

    let mut stale = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        let Some(rest) = name_str.strip_prefix(client.prefix.as_str()) else {
            continue;
        };

        match owner_pid(rest) {
            Some(pid) if process_exists(pid) => {
                debug!("Client socket {} still owned by PID {}", name_str, pid);
            }
            _ => stale.push(entry.path()),
        }
    }

    stale
}

/// PID part of a `<pid>-<counter>` suffix.
fn owner_pid(suffix: &str) -> Option<u32> {
    suffix.split('-').next()?.parse().ok()
}

/// Check if a process with the given PID exists.
fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
