//! Asynchronous event stream from a channel's monitor connection.
//!
//! Events arrive as datagrams of the form `<N>CTRL-EVENT-XXX ...`, where `N`
//! is the message level. The level is stripped before the event is handed
//! to the caller.
//!
//! A wait never fails: socket errors, peer EOF and cancellation all end the
//! stream with a synthesized `CTRL-EVENT-TERMINATING` event. Consumers
//! watch for [`MonitorEvent::ends_stream`], which also catches the daemon's
//! own shutdown notice.

use std::fmt;
use std::io;
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, trace};

use super::channel::{Connections, ControlChannel};
use crate::telemetry::{self, AuditEvent};

/// Event name the daemon sends on shutdown, also used for the synthesized
/// end-of-stream event.
pub const WPA_EVENT_TERMINATING: &str = "CTRL-EVENT-TERMINATING";

/// Default size of the event buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 4096;

/// Why the event stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The channel was closed or cancelled.
    ConnectionClosed,
    /// Waiting on or reading from the monitor connection failed.
    RecvError,
    /// The monitor connection delivered an empty message.
    Eof,
}

impl Termination {
    /// Human-readable reason appended to the terminating event.
    pub fn reason(self) -> &'static str {
        match self {
            Termination::ConnectionClosed => "connection closed",
            Termination::RecvError => "recv error",
            Termination::Eof => "signal 0 received",
        }
    }
}

/// One item from the monitor connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// An event pushed by the daemon, level prefix removed.
    Message(String),
    /// The stream ended.
    Terminating(Termination),
}

impl MonitorEvent {
    /// Whether this event was synthesized because the stream ended.
    pub fn is_terminating(&self) -> bool {
        matches!(self, MonitorEvent::Terminating(_))
    }

    /// Whether no further events will follow.
    ///
    /// Besides the synthesized sentinel this covers the daemon's own
    /// `CTRL-EVENT-TERMINATING` message. The daemon's socket is gone after
    /// it, so another wait would only block until the channel is cancelled.
    pub fn ends_stream(&self) -> bool {
        match self {
            MonitorEvent::Message(text) => text.starts_with(WPA_EVENT_TERMINATING),
            MonitorEvent::Terminating(_) => true,
        }
    }

    /// The event text as delivered to consumers.
    pub fn into_text(self) -> String {
        match self {
            MonitorEvent::Message(text) => text,
            terminating => terminating.to_string(),
        }
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEvent::Message(text) => f.write_str(text),
            MonitorEvent::Terminating(reason) => {
                write!(f, "{} - {}", WPA_EVENT_TERMINATING, reason.reason())
            }
        }
    }
}

/// Strip a leading `<N>` level marker.
///
/// Text without a leading `<`, or without a closing `>`, is returned as is.
pub fn strip_priority(message: &str) -> &str {
    if message.starts_with('<')
        && let Some(end) = message.find('>')
    {
        return &message[end + 1..];
    }
    message
}

/// Blocks on a channel's monitor connection until an event or cancellation.
#[derive(Debug)]
pub struct EventReader {
    buffer: Vec<u8>,
}

impl Default for EventReader {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl EventReader {
    /// Create a reader with a receive buffer of `buffer_size` bytes.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: vec![0u8; buffer_size.max(1)],
        }
    }

    /// Wait for the next event on `channel`.
    ///
    /// Blocks without timeout until the monitor connection has a message or
    /// the channel's cancel pair is signalled.
    pub fn wait(&mut self, channel: &ControlChannel) -> MonitorEvent {
        let event = {
            let guard = channel.connections();
            match guard.as_ref() {
                Some(conns) => self.wait_on(conns),
                None => {
                    debug!("Connection closed");
                    MonitorEvent::Terminating(Termination::ConnectionClosed)
                }
            }
        };

        if let MonitorEvent::Terminating(reason) = event {
            telemetry::record(AuditEvent::MonitorTerminated {
                path: channel.path().display().to_string(),
                reason: reason.reason().to_string(),
            });
        }
        event
    }

    fn wait_on(&mut self, conns: &Connections) -> MonitorEvent {
        let monitor_ready = match poll_monitor(conns) {
            Ok(ready) => ready,
            Err(e) => {
                debug!("Poll on monitor connection failed: {}", e);
                return MonitorEvent::Terminating(Termination::RecvError);
            }
        };

        if !monitor_ready {
            return MonitorEvent::Terminating(Termination::ConnectionClosed);
        }

        self.receive(|buf| conns.monitor.recv(buf))
    }

    /// Read one datagram through `recv` and turn it into an event.
    fn receive<R>(&mut self, recv: R) -> MonitorEvent
    where
        R: FnOnce(&mut [u8]) -> io::Result<usize>,
    {
        match recv(&mut self.buffer) {
            Ok(0) => {
                debug!("Received EOF on supplicant socket");
                MonitorEvent::Terminating(Termination::Eof)
            }
            Ok(n) => {
                let raw = String::from_utf8_lossy(&self.buffer[..n]);
                trace!("Monitor event: {}", raw);
                MonitorEvent::Message(strip_priority(&raw).to_string())
            }
            Err(e) => {
                debug!("Monitor receive failed: {}", e);
                MonitorEvent::Terminating(Termination::RecvError)
            }
        }
    }
}

/// Wait on the monitor and wake descriptors; `true` when the monitor has data.
fn poll_monitor(conns: &Connections) -> nix::Result<bool> {
    let mut fds = [
        PollFd::new(conns.monitor.as_fd(), PollFlags::POLLIN),
        PollFd::new(conns.cancel.wake_fd(), PollFlags::POLLIN),
    ];

    loop {
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => break,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(fds[0]
        .revents()
        .is_some_and(|events| events.contains(PollFlags::POLLIN)))
}
