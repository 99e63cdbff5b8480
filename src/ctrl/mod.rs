//! Supplicant control-channel client.
//!
//! This module talks to a `wpa_supplicant`-family daemon over its local
//! control interface:
//! - [`ControlChannel`]: command + monitor connections and a cancel pair
//! - [`CommandDispatcher`]: request/reply commands with timeout
//! - [`EventReader`]: blocking, cancellable event stream
//! - [`InterfaceRegistry`]: interface name to channel slot mapping
//!
//! # Threading
//!
//! One thread may block in [`EventReader::wait`] while another issues
//! commands on the same channel. A third party (a timed-out command or
//! [`ControlChannel::close`]) wakes the reader through the cancel pair.

mod cancel;
mod channel;
mod cleanup;
mod dispatch;
mod error;
mod events;
mod registry;
mod socket;

pub use cancel::CancelPair;
pub use channel::{
    ChannelOptions, ControlChannel, DEFAULT_ATTACH_TIMEOUT, DEFAULT_DETACH_TIMEOUT,
    DEFAULT_OPEN_ATTEMPTS, DEFAULT_OPEN_BACKOFF,
};
pub use cleanup::{cleanup_stale_client_sockets, list_stale_client_sockets};
pub use dispatch::{CommandDispatcher, DEFAULT_COMMAND_TIMEOUT, DEFAULT_REPLY_BUFFER, Reply};
pub use error::{CtrlError, CtrlResult};
pub use events::{
    DEFAULT_EVENT_BUFFER, EventReader, MonitorEvent, Termination, WPA_EVENT_TERMINATING,
    strip_priority,
};
pub use registry::{ChannelSlot, InterfaceRegistry};
pub use socket::{ClientEndpoint, CtrlSocket, DEFAULT_CLIENT_DIR, DEFAULT_CLIENT_PREFIX};
