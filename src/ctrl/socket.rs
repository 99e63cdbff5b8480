//! Unix datagram transport for the supplicant control interface.
//!
//! Each connection binds its own client socket inside a local directory and
//! connects it to the daemon's per-interface socket:
//!
//! ```text
//! ┌──────────────────────────────┐   datagrams   ┌──────────────────────────┐
//! │ <client_dir>/<prefix>PID-N   │──────────────→│ <ctrl_dir>/<ifname>      │
//! │ (CtrlSocket)                 │←──────────────│ (wpa_supplicant)         │
//! └──────────────────────────────┘               └──────────────────────────┘
//! ```
//!
//! Requests are plain command text; replies are a single datagram. While a
//! request is outstanding the daemon may also push unsolicited `<N>...` event
//! datagrams on the same socket; those are skipped.

use std::fs;
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

/// Default directory for client-side sockets.
pub const DEFAULT_CLIENT_DIR: &str = "/tmp";

/// Default filename prefix for client-side sockets.
pub const DEFAULT_CLIENT_PREFIX: &str = "wpa_ctrl_";

/// Reply the daemon sends to a successful `ATTACH`/`DETACH`.
const OK_REPLY: &[u8] = b"OK\n";

/// Per-process counter that keeps client socket names unique.
static CLIENT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Where client-side sockets are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEndpoint {
    /// Directory holding the client sockets.
    pub dir: PathBuf,
    /// Filename prefix; the PID and a counter are appended.
    pub prefix: String,
}

impl Default for ClientEndpoint {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CLIENT_DIR),
            prefix: DEFAULT_CLIENT_PREFIX.to_string(),
        }
    }
}

impl ClientEndpoint {
    fn next_path(&self) -> PathBuf {
        let counter = CLIENT_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{}{}-{}", self.prefix, std::process::id(), counter))
    }
}

/// One connection to a daemon control socket.
///
/// The client socket file is removed when this value is dropped.
#[derive(Debug)]
pub struct CtrlSocket {
    socket: UnixDatagram,
    local_path: PathBuf,
    server_path: PathBuf,
}

impl CtrlSocket {
    /// Bind a fresh client socket and connect it to `server_path`.
    pub fn open(server_path: &Path, client: &ClientEndpoint) -> io::Result<Self> {
        let local_path = client.next_path();

        let socket = match UnixDatagram::bind(&local_path) {
            Ok(socket) => socket,
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                // Left behind by an earlier process that had our PID
                debug!("Client socket {:?} in use, replacing it", local_path);
                let _ = fs::remove_file(&local_path);
                UnixDatagram::bind(&local_path)?
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = socket.connect(server_path) {
            let _ = fs::remove_file(&local_path);
            return Err(e);
        }

        trace!("Connected {:?} -> {:?}", local_path, server_path);
        Ok(Self {
            socket,
            local_path,
            server_path: server_path.to_path_buf(),
        })
    }

    /// Send `command` and wait up to `timeout` for the reply.
    ///
    /// Returns the reply length in `buf`. A missing reply is reported as
    /// [`io::ErrorKind::TimedOut`].
    pub fn request(&self, command: &[u8], timeout: Duration, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.send(command)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            self.socket.set_read_timeout(Some(remaining))?;

            match self.socket.recv(buf) {
                Ok(n) if n > 0 && buf[0] == b'<' => {
                    trace!(
                        "Skipping unsolicited message while waiting for reply: {}",
                        String::from_utf8_lossy(&buf[..n])
                    );
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(timed_out());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Register this connection for unsolicited event messages.
    pub fn attach(&self, timeout: Duration) -> io::Result<()> {
        self.control_command("ATTACH", timeout)
    }

    /// Stop receiving unsolicited event messages on this connection.
    pub fn detach(&self, timeout: Duration) -> io::Result<()> {
        self.control_command("DETACH", timeout)
    }

    /// Receive a single datagram.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.set_read_timeout(None)?;
        loop {
            match self.socket.recv(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    /// Path of the client-side socket file.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Path of the daemon socket this connection talks to.
    pub fn server_path(&self) -> &Path {
        &self.server_path
    }

    fn control_command(&self, command: &str, timeout: Duration) -> io::Result<()> {
        let mut buf = [0u8; 10];
        let n = self.request(command.as_bytes(), timeout, &mut buf)?;
        if &buf[..n] == OK_REPLY {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "unexpected reply to {}: {:?}",
                    command,
                    String::from_utf8_lossy(&buf[..n])
                ),
            ))
        }
    }
}

impl AsFd for CtrlSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

impl Drop for CtrlSocket {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.local_path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove client socket {:?}: {}", self.local_path, e);
        }
    }
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "no reply from daemon")
}
