//! Synchronous command exchange over a channel's command connection.

use std::borrow::Cow;
use std::io;
use std::time::Duration;

use tracing::{debug, warn};

use super::channel::ControlChannel;
use super::error::{CtrlError, CtrlResult};
use crate::telemetry::{self, AuditEvent};

/// Default time to wait for a command reply.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default size of the reply buffer.
pub const DEFAULT_REPLY_BUFFER: usize = 4096;

/// Reply marker for a command the daemon rejected.
const FAIL_MARKER: &[u8] = b"FAIL";

/// A successful command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text reply, cut at the first NUL (`PING`).
    Text(String),
    /// Raw reply datagram.
    Raw(Vec<u8>),
}

impl Reply {
    /// The reply bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Reply::Text(text) => text.as_bytes(),
            Reply::Raw(bytes) => bytes,
        }
    }

    /// The reply as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Reply::Text(text) => Cow::Borrowed(text),
            Reply::Raw(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

/// Sends commands and waits for their replies.
///
/// Only one command may be in flight per channel; callers serialize.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    timeout: Duration,
    reply_buffer: usize,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT, DEFAULT_REPLY_BUFFER)
    }
}

impl CommandDispatcher {
    /// Create a dispatcher with the given reply timeout and buffer size.
    pub fn new(timeout: Duration, reply_buffer: usize) -> Self {
        Self {
            timeout,
            reply_buffer: reply_buffer.max(1),
        }
    }

    /// The reply timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `command` on `channel` and wait for the reply.
    ///
    /// On timeout the channel's cancel pair is signalled once, which wakes a
    /// reader blocked on the same channel.
    pub fn send(&self, channel: &ControlChannel, command: &str) -> CtrlResult<Reply> {
        let guard = channel.connections();
        let Some(conns) = guard.as_ref() else {
            debug!("Not connected to supplicant - \"{}\" command dropped", command);
            return Err(CtrlError::Closed);
        };

        let mut buf = vec![0u8; self.reply_buffer];
        let n = match conns.command.request(command.as_bytes(), self.timeout, &mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                debug!("'{}' command timed out", command);
                if let Err(e) = conns.cancel.signal() {
                    warn!("Failed to unblock monitor after timeout: {}", e);
                }
                // Verb only; arguments may carry credentials.
                telemetry::record(AuditEvent::CommandTimeout {
                    path: channel.path().display().to_string(),
                    command: command.split_whitespace().next().unwrap_or_default().to_string(),
                });
                return Err(CtrlError::Timeout {
                    command: command.to_string(),
                });
            }
            Err(e) => return Err(CtrlError::Transport(e)),
        };
        buf.truncate(n);

        if buf.starts_with(FAIL_MARKER) {
            return Err(CtrlError::CommandFailed {
                command: command.to_string(),
                reply: String::from_utf8_lossy(&buf).trim_end().to_string(),
            });
        }

        if command.starts_with("PING") {
            if let Some(end) = buf.iter().position(|&b| b == 0) {
                buf.truncate(end);
            }
            return Ok(Reply::Text(String::from_utf8_lossy(&buf).into_owned()));
        }

        Ok(Reply::Raw(buf))
    }
}
