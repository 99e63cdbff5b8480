//! Paired command/monitor connections to one daemon control endpoint.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────── ControlChannel ─┐
//!  send() ────────►│ command  (request/reply)                    │
//!  wait() ◄────────│ monitor  (ATTACHed, pushes <N>CTRL-EVENT-…) │
//!     ▲            │ cancel   (signal ──► wake)                  │
//!     └── poll ────┤                                             │
//!                  └─────────────────────────────────────────────┘
//! ```
//!
//! The connections live behind a read/write lock. Senders and the reader
//! hold the read side for the duration of their exchange; `close` signals
//! the cancel pair first, then takes the write side and drops everything.
//! A channel is therefore either fully open or fully closed.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::cancel::CancelPair;
use super::error::{CtrlError, CtrlResult};
use super::socket::{ClientEndpoint, CtrlSocket};
use crate::telemetry::{self, AuditEvent};

/// Default number of attempts for the first connection.
pub const DEFAULT_OPEN_ATTEMPTS: u32 = 3;

/// Default delay between connection attempts.
pub const DEFAULT_OPEN_BACKOFF: Duration = Duration::from_millis(100);

/// Default timeout for the `ATTACH` exchange.
pub const DEFAULT_ATTACH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the best-effort `DETACH` on close.
pub const DEFAULT_DETACH_TIMEOUT: Duration = Duration::from_secs(1);

/// Settings used when opening a channel.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Where client-side sockets are bound.
    pub client: ClientEndpoint,
    /// Attempts for the command connection before giving up.
    pub open_attempts: u32,
    /// Delay between command connection attempts.
    pub open_backoff: Duration,
    /// Timeout for the `ATTACH` exchange.
    pub attach_timeout: Duration,
    /// Timeout for the `DETACH` exchange on close.
    pub detach_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            client: ClientEndpoint::default(),
            open_attempts: DEFAULT_OPEN_ATTEMPTS,
            open_backoff: DEFAULT_OPEN_BACKOFF,
            attach_timeout: DEFAULT_ATTACH_TIMEOUT,
            detach_timeout: DEFAULT_DETACH_TIMEOUT,
        }
    }
}

/// The open state of a channel.
#[derive(Debug)]
pub(crate) struct Connections {
    pub(crate) command: CtrlSocket,
    pub(crate) monitor: CtrlSocket,
    pub(crate) cancel: CancelPair,
}

/// A command connection, an attached monitor connection and a cancel pair.
#[derive(Debug)]
pub struct ControlChannel {
    path: PathBuf,
    detach_timeout: Duration,
    conns: RwLock<Option<Connections>>,
}

impl ControlChannel {
    /// Open both connections to `path`, attach the monitor and create the cancel pair.
    ///
    /// Any failure closes whatever was already opened before returning.
    pub fn open<P: AsRef<Path>>(path: P, options: &ChannelOptions) -> CtrlResult<Self> {
        let path = path.as_ref();
        Self::open_with(path, options, || CtrlSocket::open(path, &options.client))
    }

    /// Open using a custom connection step.
    pub(crate) fn open_with<F>(path: &Path, options: &ChannelOptions, mut connect: F) -> CtrlResult<Self>
    where
        F: FnMut() -> io::Result<CtrlSocket>,
    {
        // The daemon may still be creating its socket right after start
        let mut attempt = 1;
        let command = loop {
            match connect() {
                Ok(socket) => break socket,
                Err(e) if attempt < options.open_attempts => {
                    debug!(
                        "Connection attempt {} to {:?} failed: {}",
                        attempt, path, e
                    );
                    attempt += 1;
                    thread::sleep(options.open_backoff);
                }
                Err(source) => {
                    warn!("Unable to open connection to supplicant on {:?}: {}", path, source);
                    return Err(CtrlError::Connect {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        };

        let monitor = connect().map_err(|source| CtrlError::Connect {
            path: path.to_path_buf(),
            source,
        })?;

        monitor
            .attach(options.attach_timeout)
            .map_err(|e| CtrlError::Attach {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let cancel = CancelPair::new().map_err(CtrlError::CancelPair)?;

        info!("Opened control channel to {:?}", path);
        telemetry::record(AuditEvent::ChannelOpen {
            path: path.display().to_string(),
        });

        Ok(Self {
            path: path.to_path_buf(),
            detach_timeout: options.detach_timeout,
            conns: RwLock::new(Some(Connections {
                command,
                monitor,
                cancel,
            })),
        })
    }

    /// Path of the daemon endpoint.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the channel has not been closed yet.
    pub fn is_open(&self) -> bool {
        self.connections().is_some()
    }

    /// Wake any reader blocked on this channel without closing it.
    pub fn cancel(&self) {
        if let Some(conns) = self.connections().as_ref()
            && let Err(e) = conns.cancel.signal()
        {
            warn!("Failed to signal cancel pair for {:?}: {}", self.path, e);
        }
    }

    /// Close both connections and both ends of the cancel pair.
    ///
    /// Signals the cancel pair first so a reader blocked in a wait lets go of
    /// the connections. Calling this on a closed channel does nothing.
    pub fn close(&self) {
        self.cancel();

        let taken = self
            .conns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(conns) = taken else {
            debug!("Control channel {:?} already closed", self.path);
            return;
        };

        if let Err(e) = conns.monitor.detach(self.detach_timeout) {
            debug!("Detach from {:?} failed: {}", self.path, e);
        }
        drop(conns);

        info!("Closed control channel to {:?}", self.path);
        telemetry::record(AuditEvent::ChannelClose {
            path: self.path.display().to_string(),
        });
    }

    pub(crate) fn connections(&self) -> RwLockReadGuard<'_, Option<Connections>> {
        self.conns.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::net::UnixDatagram;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::{TempDir, tempdir};

    /// Minimal daemon answering ATTACH/DETACH until told to stop.
    struct AttachServer {
        path: PathBuf,
        stop: Arc<AtomicBool>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl AttachServer {
        fn start(dir: &Path, attach_reply: &'static [u8]) -> Self {
            let path = dir.join("wlan0");
            let socket = UnixDatagram::bind(&path).unwrap();
            socket
                .set_read_timeout(Some(Duration::from_millis(20)))
                .unwrap();
            let stop = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop);
            let handle = thread::spawn(move || {
                let mut buf = [0u8; 256];
                while !flag.load(Ordering::SeqCst) {
                    let Ok((n, addr)) = socket.recv_from(&mut buf) else {
                        continue;
                    };
                    let Some(peer) = addr.as_pathname() else {
                        continue;
                    };
                    let reply: &[u8] = match &buf[..n] {
                        b"ATTACH" => attach_reply,
                        b"DETACH" => b"OK\n",
                        _ => b"UNKNOWN COMMAND\n",
                    };
                    let _ = socket.send_to(reply, peer);
                }
            });
            Self {
                path,
                stop,
                handle: Some(handle),
            }
        }
    }

    impl Drop for AttachServer {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::SeqCst);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn options_in(dir: &TempDir) -> ChannelOptions {
        ChannelOptions {
            client: ClientEndpoint {
                dir: dir.path().join("clients"),
                prefix: "wpa_ctrl_".to_string(),
            },
            open_backoff: Duration::from_millis(10),
            attach_timeout: Duration::from_secs(1),
            detach_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn client_sockets(options: &ChannelOptions) -> usize {
        fs::read_dir(&options.client.dir).unwrap().count()
    }

    #[test]
    fn test_open_and_close() {
        let dir = tempdir().unwrap();
        let options = options_in(&dir);
        fs::create_dir(&options.client.dir).unwrap();
        let server = AttachServer::start(dir.path(), b"OK\n");

        let channel = ControlChannel::open(&server.path, &options).unwrap();
        assert!(channel.is_open());
        assert_eq!(channel.path(), server.path.as_path());
        assert_eq!(client_sockets(&options), 2);

        channel.close();
        assert!(!channel.is_open());
        assert_eq!(client_sockets(&options), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let options = options_in(&dir);
        fs::create_dir(&options.client.dir).unwrap();
        let server = AttachServer::start(dir.path(), b"OK\n");

        let channel = ControlChannel::open(&server.path, &options).unwrap();
        channel.close();
        channel.close();
        channel.cancel();
        assert!(!channel.is_open());
    }

    #[test]
    fn test_monitor_open_failure_rolls_back_command_connection() {
        let dir = tempdir().unwrap();
        let options = options_in(&dir);
        fs::create_dir(&options.client.dir).unwrap();
        let server = AttachServer::start(dir.path(), b"OK\n");

        let mut calls = 0;
        let result = ControlChannel::open_with(&server.path, &options, || {
            calls += 1;
            if calls == 1 {
                CtrlSocket::open(&server.path, &options.client)
            } else {
                Err(io::Error::from(io::ErrorKind::ConnectionRefused))
            }
        });

        let err = result.unwrap_err();
        assert!(matches!(err, CtrlError::Connect { .. }));
        assert_eq!(calls, 2);
        // The command connection's socket file is gone again
        assert_eq!(client_sockets(&options), 0);
    }

    #[test]
    fn test_attach_failure_rolls_back_both_connections() {
        let dir = tempdir().unwrap();
        let options = options_in(&dir);
        fs::create_dir(&options.client.dir).unwrap();
        let server = AttachServer::start(dir.path(), b"FAIL\n");

        let err = ControlChannel::open(&server.path, &options).unwrap_err();
        assert!(matches!(err, CtrlError::Attach { .. }));
        assert!(err.is_open_failure());
        assert_eq!(client_sockets(&options), 0);
    }

    #[test]
    fn test_open_retries_initial_connection() {
        let dir = tempdir().unwrap();
        let options = options_in(&dir);
        fs::create_dir(&options.client.dir).unwrap();
        let server = AttachServer::start(dir.path(), b"OK\n");

        let mut calls = 0;
        let channel = ControlChannel::open_with(&server.path, &options, || {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(io::ErrorKind::NotFound))
            } else {
                CtrlSocket::open(&server.path, &options.client)
            }
        })
        .unwrap();

        // Two failures, the command connection, then the monitor connection
        assert_eq!(calls, 4);
        channel.close();
    }

    #[test]
    fn test_open_gives_up_after_attempts() {
        let dir = tempdir().unwrap();
        let options = options_in(&dir);

        let mut calls = 0;
        let err = ControlChannel::open_with(&dir.path().join("wlan0"), &options, || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::NotFound))
        })
        .unwrap_err();

        assert!(matches!(err, CtrlError::Connect { .. }));
        assert_eq!(calls, DEFAULT_OPEN_ATTEMPTS);
    }
}
