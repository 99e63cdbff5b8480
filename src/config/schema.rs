//! Configuration schema definitions.
//!
//! Every field defaults to its zero value (`0`, `""`, empty path), which
//! means "use the built-in default". The effective values are read through
//! the accessors on [`Config`], so a file only needs to name what it
//! changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::ctrl::{
    ChannelOptions, ClientEndpoint, CommandDispatcher, DEFAULT_ATTACH_TIMEOUT,
    DEFAULT_CLIENT_DIR, DEFAULT_CLIENT_PREFIX, DEFAULT_COMMAND_TIMEOUT, DEFAULT_DETACH_TIMEOUT,
    DEFAULT_EVENT_BUFFER, DEFAULT_OPEN_ATTEMPTS, DEFAULT_OPEN_BACKOFF, DEFAULT_REPLY_BUFFER,
};

/// Default primary interface name.
pub const DEFAULT_PRIMARY_IFACE: &str = "wlan0";

/// Default directory holding the daemon's per-interface sockets.
pub const DEFAULT_IFACE_DIR: &str = "/var/run/wpa_supplicant";

/// Default directory holding secondary-interface sockets.
pub const DEFAULT_CTRL_DIR: &str = "/var/run/wpa_supplicant";

/// Default station service name.
pub const DEFAULT_STATION_SERVICE: &str = "wpa_supplicant";

/// Default P2P service name.
pub const DEFAULT_P2P_SERVICE: &str = "p2p_supplicant";

/// Default time to wait for the daemon to come up.
pub const DEFAULT_START_WAIT: Duration = Duration::from_secs(20);

/// Default time to wait for the daemon to go down.
pub const DEFAULT_STOP_WAIT: Duration = Duration::from_secs(5);

/// The shipped `config/default.toml`, the base every load starts from.
const BUILTIN_CONFIG: &str = include_str!("../../config/default.toml");

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Interface naming and socket locations.
    #[serde(default)]
    pub interface: InterfaceConfig,

    /// Client socket placement.
    #[serde(default)]
    pub client: ClientConfig,

    /// Timeouts and retry policy.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Receive buffer sizes.
    #[serde(default)]
    pub buffers: BufferConfig,

    /// Daemon service names and command lines.
    #[serde(default)]
    pub services: ServicesConfig,
}

impl Config {
    /// Configuration from the shipped defaults, including the daemon
    /// command lines `supervise` needs.
    pub fn builtin() -> Result<Self, ConfigError> {
        toml::from_str(BUILTIN_CONFIG).map_err(|source| ConfigError::ParseError {
            path: PathBuf::from("<built-in>"),
            source,
        })
    }

    /// Merge another config into this one.
    ///
    /// Scalars are overridden when set. Maps are merged by key.
    pub fn merge(&mut self, other: Config) {
        self.interface.merge(other.interface);
        self.client.merge(other.client);
        self.timing.merge(other.timing);
        self.buffers.merge(other.buffers);
        self.services.merge(other.services);
    }

    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.primary.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "interface.primary".to_string(),
                message: format!("'{}' is not an interface name", self.interface.primary),
            });
        }
        if self.client.prefix.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "client.prefix".to_string(),
                message: "must not contain '/'".to_string(),
            });
        }
        for (name, argv) in &self.services.commands {
            if argv.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("services.commands.{}", name),
                    message: "command line is empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Effective primary interface name.
    pub fn primary_iface(&self) -> &str {
        or_default(&self.interface.primary, DEFAULT_PRIMARY_IFACE)
    }

    /// Effective per-interface socket directory.
    pub fn iface_dir(&self) -> &Path {
        path_or_default(&self.interface.iface_dir, DEFAULT_IFACE_DIR)
    }

    /// Effective secondary socket directory.
    pub fn ctrl_dir(&self) -> &Path {
        path_or_default(&self.interface.ctrl_dir, DEFAULT_CTRL_DIR)
    }

    /// Where client sockets are bound.
    pub fn client_endpoint(&self) -> ClientEndpoint {
        ClientEndpoint {
            dir: path_or_default(&self.client.dir, DEFAULT_CLIENT_DIR).to_path_buf(),
            prefix: or_default(&self.client.prefix, DEFAULT_CLIENT_PREFIX).to_string(),
        }
    }

    /// Options for opening control channels.
    pub fn channel_options(&self) -> ChannelOptions {
        let t = &self.timing;
        ChannelOptions {
            client: self.client_endpoint(),
            open_attempts: nonzero(t.open_attempts, DEFAULT_OPEN_ATTEMPTS),
            open_backoff: millis_or(t.open_backoff_ms, DEFAULT_OPEN_BACKOFF),
            attach_timeout: millis_or(t.attach_timeout_ms, DEFAULT_ATTACH_TIMEOUT),
            detach_timeout: millis_or(t.detach_timeout_ms, DEFAULT_DETACH_TIMEOUT),
        }
    }

    /// Dispatcher with the configured timeout and reply buffer.
    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(
            millis_or(self.timing.command_timeout_ms, DEFAULT_COMMAND_TIMEOUT),
            nonzero(self.buffers.reply_size, DEFAULT_REPLY_BUFFER),
        )
    }

    /// Event receive buffer size.
    pub fn event_buffer(&self) -> usize {
        nonzero(self.buffers.event_size, DEFAULT_EVENT_BUFFER)
    }

    /// How long to wait for the daemon to start.
    pub fn start_wait(&self) -> Duration {
        millis_or(self.timing.start_wait_ms, DEFAULT_START_WAIT)
    }

    /// How long to wait for the daemon to stop.
    pub fn stop_wait(&self) -> Duration {
        millis_or(self.timing.stop_wait_ms, DEFAULT_STOP_WAIT)
    }

    /// Service to manage for station or P2P mode.
    pub fn service_name(&self, p2p: bool) -> &str {
        if p2p {
            or_default(&self.services.p2p, DEFAULT_P2P_SERVICE)
        } else {
            or_default(&self.services.station, DEFAULT_STATION_SERVICE)
        }
    }
}

/// `[interface]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct InterfaceConfig {
    /// Primary interface name. Any name starting with it maps to the
    /// primary slot.
    #[serde(default)]
    pub primary: String,

    /// Directory of per-interface sockets, used for the primary when it
    /// exists.
    #[serde(default)]
    pub iface_dir: PathBuf,

    /// Directory of secondary-interface sockets.
    #[serde(default)]
    pub ctrl_dir: PathBuf,
}

impl InterfaceConfig {
    fn merge(&mut self, other: InterfaceConfig) {
        if !other.primary.is_empty() {
            self.primary = other.primary;
        }
        if !other.iface_dir.as_os_str().is_empty() {
            self.iface_dir = other.iface_dir;
        }
        if !other.ctrl_dir.as_os_str().is_empty() {
            self.ctrl_dir = other.ctrl_dir;
        }
    }
}

/// `[client]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientConfig {
    /// Directory for client socket files.
    #[serde(default)]
    pub dir: PathBuf,

    /// Client socket filename prefix.
    #[serde(default)]
    pub prefix: String,
}

impl ClientConfig {
    fn merge(&mut self, other: ClientConfig) {
        if !other.dir.as_os_str().is_empty() {
            self.dir = other.dir;
        }
        if !other.prefix.is_empty() {
            self.prefix = other.prefix;
        }
    }
}

/// `[timing]` section. All durations in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TimingConfig {
    /// Per-command reply timeout.
    #[serde(default)]
    pub command_timeout_ms: u64,

    /// Connection attempts when opening a channel.
    #[serde(default)]
    pub open_attempts: u32,

    /// Pause between connection attempts.
    #[serde(default)]
    pub open_backoff_ms: u64,

    /// ATTACH reply timeout.
    #[serde(default)]
    pub attach_timeout_ms: u64,

    /// DETACH reply timeout on close.
    #[serde(default)]
    pub detach_timeout_ms: u64,

    /// Wait for the daemon to start.
    #[serde(default)]
    pub start_wait_ms: u64,

    /// Wait for the daemon to stop.
    #[serde(default)]
    pub stop_wait_ms: u64,
}

impl TimingConfig {
    fn merge(&mut self, other: TimingConfig) {
        override_nonzero(&mut self.command_timeout_ms, other.command_timeout_ms);
        override_nonzero(&mut self.open_attempts, other.open_attempts);
        override_nonzero(&mut self.open_backoff_ms, other.open_backoff_ms);
        override_nonzero(&mut self.attach_timeout_ms, other.attach_timeout_ms);
        override_nonzero(&mut self.detach_timeout_ms, other.detach_timeout_ms);
        override_nonzero(&mut self.start_wait_ms, other.start_wait_ms);
        override_nonzero(&mut self.stop_wait_ms, other.stop_wait_ms);
    }
}

/// `[buffers]` section. Sizes in bytes.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BufferConfig {
    /// Command reply buffer.
    #[serde(default)]
    pub reply_size: usize,

    /// Event buffer.
    #[serde(default)]
    pub event_size: usize,
}

impl BufferConfig {
    fn merge(&mut self, other: BufferConfig) {
        override_nonzero(&mut self.reply_size, other.reply_size);
        override_nonzero(&mut self.event_size, other.event_size);
    }
}

/// `[services]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServicesConfig {
    /// Station-mode service name.
    #[serde(default)]
    pub station: String,

    /// P2P-mode service name.
    #[serde(default)]
    pub p2p: String,

    /// Command line per service name, for running the daemon as a child
    /// process.
    #[serde(default)]
    pub commands: HashMap<String, Vec<String>>,
}

impl ServicesConfig {
    fn merge(&mut self, other: ServicesConfig) {
        if !other.station.is_empty() {
            self.station = other.station;
        }
        if !other.p2p.is_empty() {
            self.p2p = other.p2p;
        }
        self.commands.extend(other.commands);
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() { default } else { value }
}

fn path_or_default<'a>(value: &'a Path, default: &'a str) -> &'a Path {
    if value.as_os_str().is_empty() {
        Path::new(default)
    } else {
        value
    }
}

fn millis_or(ms: u64, default: Duration) -> Duration {
    if ms == 0 {
        default
    } else {
        Duration::from_millis(ms)
    }
}

fn nonzero<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() { default } else { value }
}

fn override_nonzero<T: Default + PartialEq>(slot: &mut T, value: T) {
    if value != T::default() {
        *slot = value;
    }
}
