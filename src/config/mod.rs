//! Configuration system for supplicant-link.
//!
//! TOML configuration loaded from several sources and merged in order:
//!
//! 1. Built-in defaults (`config/default.toml`, compiled in)
//! 2. System config: `/etc/supplicant-link/config.toml`
//! 3. User config: `~/.config/supplicant-link/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! No file is required on disk.
//!
//! # Merge Behavior
//!
//! - **Scalars** are **overridden** when the later source sets them
//! - **Maps** (`services.commands`) are **merged** (later keys override)
//!
//! ```toml
//! [interface]
//! primary = "wlan0"
//!
//! [timing]
//! command_timeout_ms = 5000
//!
//! [services.commands]
//! wpa_supplicant = ["wpa_supplicant", "-i", "wlan0", "-c", "/etc/wpa_supplicant.conf"]
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    BufferConfig, ClientConfig, Config, DEFAULT_CTRL_DIR, DEFAULT_IFACE_DIR, DEFAULT_P2P_SERVICE,
    DEFAULT_PRIMARY_IFACE, DEFAULT_START_WAIT, DEFAULT_STATION_SERVICE, DEFAULT_STOP_WAIT,
    InterfaceConfig, ServicesConfig, TimingConfig,
};
