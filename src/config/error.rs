//! Errors from reading `config.toml` layers.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration layer could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A system, user or `--config` file exists but could not be read, or
    /// the `--config` file is missing.
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        /// The file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A layer is not valid TOML for the `[interface]`, `[client]`,
    /// `[timing]`, `[buffers]` and `[services]` schema. The compiled-in
    /// defaults are reported with the path `<built-in>`.
    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        /// The file.
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The merged configuration is unusable, e.g. an interface name or
    /// socket prefix containing `/`, or an empty daemon command line.
    #[error("Invalid config value for {field}: {message}")]
    InvalidValue {
        /// Dotted key, such as `services.commands.wpa_supplicant`.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}
