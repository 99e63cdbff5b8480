//! Supplicant lifecycle and per-interface channel management.
//!
//! [`SupplicantHal`] is the entry point a Wi-Fi service uses: start or
//! stop the daemon, connect a channel for an interface, send commands and
//! pull events, all keyed by interface name.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::ctrl::{
    ChannelOptions, ChannelSlot, CommandDispatcher, ControlChannel, CtrlError, EventReader,
    InterfaceRegistry, MonitorEvent, Reply, Termination, cleanup_stale_client_sockets,
};
use crate::daemon::{DaemonControl, DaemonError, DaemonState, ProcessDaemon};
use crate::telemetry::{self, AuditEvent};

/// Errors from HAL operations.
#[derive(Debug, Error)]
pub enum HalError {
    /// Control channel failure.
    #[error(transparent)]
    Ctrl(#[from] CtrlError),

    /// Daemon lifecycle failure.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// The daemon must be running for this operation.
    #[error("Service '{0}' is not running")]
    NotRunning(String),

    /// The daemon did not report running in time.
    #[error("Service '{service}' did not start within {waited:?}")]
    StartTimeout {
        /// The service name.
        service: String,
        /// How long we waited.
        waited: Duration,
    },

    /// The daemon did not report stopped in time.
    #[error("Service '{service}' did not stop within {waited:?}")]
    StopTimeout {
        /// The service name.
        service: String,
        /// How long we waited.
        waited: Duration,
    },

    /// No channel is connected for the interface's slot.
    #[error("No control channel connected in {0} slot")]
    NotConnected(ChannelSlot),
}

/// Path of the daemon endpoint serving `slot`.
///
/// The primary slot uses `<iface_dir>/<primary>` when `iface_dir` exists
/// and the bare primary name otherwise. The secondary slot uses
/// `<ctrl_dir>/<ifname>`.
pub fn endpoint_path(config: &Config, slot: ChannelSlot, ifname: Option<&str>) -> PathBuf {
    match slot {
        ChannelSlot::Primary => {
            let iface_dir = config.iface_dir();
            if iface_dir.exists() {
                iface_dir.join(config.primary_iface())
            } else {
                PathBuf::from(config.primary_iface())
            }
        }
        ChannelSlot::Secondary => {
            config.ctrl_dir().join(ifname.unwrap_or(config.primary_iface()))
        }
    }
}

/// Daemon lifecycle plus one control channel per slot.
pub struct SupplicantHal {
    config: Config,
    registry: InterfaceRegistry,
    dispatcher: CommandDispatcher,
    options: ChannelOptions,
    daemon: Arc<dyn DaemonControl>,
    /// Service selected by the last `start_supplicant`.
    active_service: Mutex<String>,
}

impl SupplicantHal {
    /// Create a HAL over `daemon`.
    pub fn new(config: Config, daemon: Arc<dyn DaemonControl>) -> Self {
        let registry = InterfaceRegistry::new(config.primary_iface());
        let dispatcher = config.dispatcher();
        let options = config.channel_options();
        let active_service = Mutex::new(config.service_name(false).to_string());

        Self {
            config,
            registry,
            dispatcher,
            options,
            daemon,
            active_service,
        }
    }

    /// Create a HAL that runs services from `[services.commands]`.
    pub fn with_process_daemon(config: Config) -> Self {
        let daemon = ProcessDaemon::new(config.services.commands.clone());
        Self::new(config, Arc::new(daemon))
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The slot table.
    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Start the station or P2P service and wait until it runs.
    ///
    /// Succeeds immediately when the service is already running.
    pub fn start_supplicant(&self, p2p: bool) -> Result<(), HalError> {
        let service = self.config.service_name(p2p).to_string();
        self.set_active_service(&service);

        if self.daemon.is_running(&service) {
            debug!("Service '{}' already running", service);
            return Ok(());
        }

        let removed = cleanup_stale_client_sockets(&self.options.client);
        if removed > 0 {
            info!("Removed {} stale client sockets", removed);
        }

        self.daemon.start(&service)?;

        let waited = self.config.start_wait();
        if !self
            .daemon
            .wait_for_state(&service, DaemonState::Running, waited)
        {
            return Err(HalError::StartTimeout { service, waited });
        }

        info!("Service '{}' running", service);
        telemetry::record(AuditEvent::SupplicantStart { service });
        Ok(())
    }

    /// Stop the station or P2P service and wait until it exits.
    ///
    /// Succeeds immediately when the service is already stopped.
    pub fn stop_supplicant(&self, p2p: bool) -> Result<(), HalError> {
        let service = self.config.service_name(p2p).to_string();

        if !self.daemon.is_running(&service) {
            debug!("Service '{}' already stopped", service);
            return Ok(());
        }

        self.daemon.stop(&service)?;

        let waited = self.config.stop_wait();
        if !self
            .daemon
            .wait_for_state(&service, DaemonState::Stopped, waited)
        {
            return Err(HalError::StopTimeout { service, waited });
        }

        info!("Service '{}' stopped", service);
        telemetry::record(AuditEvent::SupplicantStop { service });
        Ok(())
    }

    /// Block until the active service exits, up to `timeout`.
    ///
    /// Returns `true` once the service is stopped.
    pub fn wait_for_supplicant_exit(&self, timeout: Duration) -> bool {
        let service = self.active_service();
        self.daemon
            .wait_for_state(&service, DaemonState::Stopped, timeout)
    }

    /// Open a channel for `ifname` and install it in its slot.
    ///
    /// Any channel already in the slot is closed.
    pub fn connect_to_supplicant(&self, ifname: Option<&str>) -> Result<(), HalError> {
        let service = self.active_service();
        if !self.daemon.is_running(&service) {
            return Err(HalError::NotRunning(service));
        }

        let slot = self.registry.resolve(ifname);
        let path = endpoint_path(&self.config, slot, ifname);
        debug!("Connecting {} slot to {:?}", slot, path);

        let channel = ControlChannel::open(&path, &self.options)?;
        if let Some(previous) = self.registry.install(slot, channel) {
            debug!("Replacing channel to {:?}", previous.path());
            previous.close();
        }
        Ok(())
    }

    /// Send `command` on the channel for `ifname`.
    pub fn command(&self, ifname: Option<&str>, command: &str) -> Result<Reply, HalError> {
        let slot = self.registry.resolve(ifname);
        let channel = self
            .registry
            .channel(slot)
            .ok_or(HalError::NotConnected(slot))?;
        Ok(self.dispatcher.send(&channel, command)?)
    }

    /// Block until the next event on the channel for `ifname`.
    ///
    /// Yields the connection-closed sentinel when no channel is connected.
    pub fn wait_for_event(&self, ifname: Option<&str>) -> MonitorEvent {
        let slot = self.registry.resolve(ifname);
        match self.registry.channel(slot) {
            Some(channel) => EventReader::new(self.config.event_buffer()).wait(&channel),
            None => MonitorEvent::Terminating(Termination::ConnectionClosed),
        }
    }

    /// Close the channel for `ifname`.
    ///
    /// For the primary slot this also waits for the daemon to stop, since
    /// closing the primary connection is how a caller shuts it down.
    pub fn close_supplicant_connection(&self, ifname: Option<&str>) {
        let slot = self.registry.resolve(ifname);
        if let Some(channel) = self.registry.take(slot) {
            channel.close();
        }

        if slot == ChannelSlot::Primary {
            let service = self.active_service();
            let waited = self.config.stop_wait();
            if !self
                .daemon
                .wait_for_state(&service, DaemonState::Stopped, waited)
            {
                warn!("Service '{}' still running after {:?}", service, waited);
            }
        }
    }

    fn active_service(&self) -> String {
        self.active_service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active_service(&self, service: &str) {
        *self
            .active_service
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = service.to_string();
    }
}

impl Drop for SupplicantHal {
    fn drop(&mut self) {
        self.registry.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceConfig;
    use crate::daemon::DaemonStatus;
    use std::path::Path;
    use tempfile::tempdir;

    /// Daemon that flips state on request, or never does when `stuck`.
    struct FlagDaemon {
        status: DaemonStatus,
        stuck: bool,
    }

    impl FlagDaemon {
        fn new(stuck: bool) -> Self {
            Self {
                status: DaemonStatus::new(),
                stuck,
            }
        }
    }

    impl DaemonControl for FlagDaemon {
        fn start(&self, name: &str) -> Result<(), DaemonError> {
            if !self.stuck {
                self.status.set(name, DaemonState::Running);
            }
            Ok(())
        }

        fn stop(&self, name: &str) -> Result<(), DaemonError> {
            if !self.stuck {
                self.status.set(name, DaemonState::Stopped);
            }
            Ok(())
        }

        fn is_running(&self, name: &str) -> bool {
            self.status.get(name) == DaemonState::Running
        }

        fn wait_for_state(&self, name: &str, state: DaemonState, timeout: Duration) -> bool {
            self.status.wait_for(name, state, timeout)
        }
    }

    fn fast_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.client.dir = dir.to_path_buf();
        config.timing.start_wait_ms = 50;
        config.timing.stop_wait_ms = 50;
        config.timing.open_backoff_ms = 1;
        config
    }

    #[test]
    fn test_endpoint_path_primary_and_secondary() {
        let dir = tempdir().unwrap();
        let mut config = Config {
            interface: InterfaceConfig {
                primary: "wlan0".to_string(),
                iface_dir: dir.path().to_path_buf(),
                ctrl_dir: PathBuf::from("/run/sockets"),
            },
            ..Default::default()
        };

        assert_eq!(
            endpoint_path(&config, ChannelSlot::Primary, Some("wlan0")),
            dir.path().join("wlan0")
        );
        assert_eq!(
            endpoint_path(&config, ChannelSlot::Secondary, Some("p2p0")),
            PathBuf::from("/run/sockets/p2p0")
        );

        config.interface.iface_dir = dir.path().join("missing");
        assert_eq!(
            endpoint_path(&config, ChannelSlot::Primary, None),
            PathBuf::from("wlan0")
        );
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let dir = tempdir().unwrap();
        let daemon = Arc::new(FlagDaemon::new(false));
        let hal = SupplicantHal::new(fast_config(dir.path()), daemon.clone());

        hal.start_supplicant(false).unwrap();
        assert!(daemon.is_running("wpa_supplicant"));
        hal.start_supplicant(false).unwrap();

        hal.stop_supplicant(false).unwrap();
        assert!(!daemon.is_running("wpa_supplicant"));
        hal.stop_supplicant(false).unwrap();
    }

    #[test]
    fn test_wait_for_supplicant_exit() {
        let dir = tempdir().unwrap();
        let daemon = Arc::new(FlagDaemon::new(false));
        let hal = SupplicantHal::new(fast_config(dir.path()), daemon.clone());

        hal.start_supplicant(false).unwrap();
        assert!(!hal.wait_for_supplicant_exit(Duration::from_millis(20)));

        // The child going away on its own
        daemon.status.set("wpa_supplicant", DaemonState::Stopped);
        assert!(hal.wait_for_supplicant_exit(Duration::from_millis(20)));
    }

    #[test]
    fn test_start_cleans_stale_client_sockets() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join(format!("wpa_ctrl_{}-0", u32::MAX));
        std::fs::write(&stale, b"").unwrap();

        let hal = SupplicantHal::new(fast_config(dir.path()), Arc::new(FlagDaemon::new(false)));
        hal.start_supplicant(true).unwrap();

        assert!(!stale.exists());
    }

    #[test]
    fn test_start_timeout() {
        let dir = tempdir().unwrap();
        let hal = SupplicantHal::new(fast_config(dir.path()), Arc::new(FlagDaemon::new(true)));

        let err = hal.start_supplicant(true).unwrap_err();
        assert!(matches!(err, HalError::StartTimeout { ref service, .. } if service == "p2p_supplicant"));
    }

    #[test]
    fn test_connect_requires_running_daemon() {
        let dir = tempdir().unwrap();
        let hal = SupplicantHal::new(fast_config(dir.path()), Arc::new(FlagDaemon::new(false)));

        let err = hal.connect_to_supplicant(Some("wlan0")).unwrap_err();
        assert!(matches!(err, HalError::NotRunning(_)));
    }

    #[test]
    fn test_command_without_channel() {
        let dir = tempdir().unwrap();
        let hal = SupplicantHal::new(fast_config(dir.path()), Arc::new(FlagDaemon::new(false)));

        let err = hal.command(Some("p2p0"), "PING").unwrap_err();
        assert!(matches!(err, HalError::NotConnected(ChannelSlot::Secondary)));

        let event = hal.wait_for_event(None);
        assert_eq!(event, MonitorEvent::Terminating(Termination::ConnectionClosed));
    }
}
