use std::collections::HashSet;
use std::fs;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use supplicant_link::config::Config;
use supplicant_link::ctrl::{
    ChannelOptions, ClientEndpoint, CommandDispatcher, ControlChannel, CtrlError, EventReader,
    MonitorEvent, Reply, Termination,
};
use supplicant_link::daemon::{DaemonControl, DaemonError, DaemonState, DaemonStatus};
use supplicant_link::hal::{HalError, SupplicantHal};
use tempfile::{TempDir, tempdir};

/// In-process daemon answering on a datagram control socket.
///
/// `ATTACH`/`DETACH` manage the monitor list, `PING` answers `PONG` with a
/// trailing NUL, `SILENT` never answers, anything else fails.
struct FakeSupplicant {
    socket: Arc<UnixDatagram>,
    monitors: Arc<Mutex<HashSet<PathBuf>>>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeSupplicant {
    fn bind(path: &Path) -> Self {
        let socket = Arc::new(UnixDatagram::bind(path).expect("Failed to bind fake daemon"));
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let monitors = Arc::new(Mutex::new(HashSet::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let socket = Arc::clone(&socket);
            let monitors = Arc::clone(&monitors);
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve(&socket, &monitors, &stop))
        };

        Self {
            socket,
            monitors,
            stop,
            handle: Some(handle),
        }
    }

    fn push(&self, event: &str) {
        let message = format!("<3>{}", event);
        for monitor in self.monitors.lock().unwrap().iter() {
            let _ = self.socket.send_to(message.as_bytes(), monitor);
        }
    }

    fn monitor_count(&self) -> usize {
        self.monitors.lock().unwrap().len()
    }
}

impl Drop for FakeSupplicant {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(socket: &UnixDatagram, monitors: &Mutex<HashSet<PathBuf>>, stop: &AtomicBool) {
    let mut buf = [0u8; 512];
    while !stop.load(Ordering::SeqCst) {
        let Ok((n, addr)) = socket.recv_from(&mut buf) else {
            continue;
        };
        let Some(peer) = addr.as_pathname().map(Path::to_path_buf) else {
            continue;
        };

        let reply: Option<&[u8]> = match &buf[..n] {
            b"ATTACH" => {
                monitors.lock().unwrap().insert(peer.clone());
                Some(b"OK\n".as_slice())
            }
            b"DETACH" => {
                monitors.lock().unwrap().remove(&peer);
                Some(b"OK\n".as_slice())
            }
            b"PING" => Some(b"PONG\0".as_slice()),
            b"SILENT" => None,
            _ => Some(b"FAIL\n".as_slice()),
        };

        if let Some(reply) = reply {
            let _ = socket.send_to(reply, &peer);
        }
    }
}

/// Daemon control that flips state on request.
#[derive(Default)]
struct FakeDaemon {
    status: DaemonStatus,
}

impl DaemonControl for FakeDaemon {
    fn start(&self, name: &str) -> Result<(), DaemonError> {
        self.status.set(name, DaemonState::Running);
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), DaemonError> {
        self.status.set(name, DaemonState::Stopped);
        Ok(())
    }

    fn is_running(&self, name: &str) -> bool {
        self.status.get(name) == DaemonState::Running
    }

    fn wait_for_state(&self, name: &str, state: DaemonState, timeout: Duration) -> bool {
        self.status.wait_for(name, state, timeout)
    }
}

fn client_dir(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("clients");
    fs::create_dir_all(&path).unwrap();
    path
}

fn options(dir: &TempDir) -> ChannelOptions {
    ChannelOptions {
        client: ClientEndpoint {
            dir: client_dir(dir),
            prefix: "wpa_ctrl_".to_string(),
        },
        open_backoff: Duration::from_millis(10),
        ..Default::default()
    }
}

fn client_files(dir: &TempDir) -> usize {
    fs::read_dir(client_dir(dir)).unwrap().count()
}

#[test]
fn test_open_ping_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wlan0");
    let daemon = FakeSupplicant::bind(&path);

    let channel = ControlChannel::open(&path, &options(&dir)).expect("Failed to open channel");
    assert!(channel.is_open());
    assert_eq!(daemon.monitor_count(), 1);
    assert_eq!(client_files(&dir), 2);

    let reply = CommandDispatcher::default().send(&channel, "PING").unwrap();
    assert!(matches!(reply, Reply::Text(_)));
    assert_eq!(reply.text(), "PONG");

    channel.close();
    assert!(!channel.is_open());
    assert_eq!(daemon.monitor_count(), 0);
    assert_eq!(client_files(&dir), 0);
}

#[test]
fn test_failed_command() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wlan0");
    let _daemon = FakeSupplicant::bind(&path);
    let channel = ControlChannel::open(&path, &options(&dir)).unwrap();

    let err = CommandDispatcher::default()
        .send(&channel, "BOGUS")
        .unwrap_err();
    assert!(matches!(err, CtrlError::CommandFailed { .. }));

    channel.close();
}

#[test]
fn test_events_are_delivered_without_level() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wlan0");
    let daemon = FakeSupplicant::bind(&path);
    let channel = ControlChannel::open(&path, &options(&dir)).unwrap();

    daemon.push("CTRL-EVENT-SCAN-STARTED ");
    daemon.push("CTRL-EVENT-SCAN-RESULTS ");

    let mut reader = EventReader::default();
    assert_eq!(
        reader.wait(&channel),
        MonitorEvent::Message("CTRL-EVENT-SCAN-STARTED ".to_string())
    );
    assert_eq!(
        reader.wait(&channel).into_text(),
        "CTRL-EVENT-SCAN-RESULTS "
    );

    channel.close();
}

#[test]
fn test_daemon_shutdown_notice_ends_stream() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wlan0");
    let daemon = FakeSupplicant::bind(&path);
    let channel = ControlChannel::open(&path, &options(&dir)).unwrap();

    daemon.push("CTRL-EVENT-TERMINATING ");
    drop(daemon);

    let event = EventReader::default().wait(&channel);
    assert_eq!(
        event,
        MonitorEvent::Message("CTRL-EVENT-TERMINATING ".to_string())
    );
    assert!(event.ends_stream());

    // DETACH to the vanished daemon fails; close still cleans up
    channel.close();
    assert_eq!(client_files(&dir), 0);
}

#[test]
fn test_close_unblocks_reader() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wlan0");
    let _daemon = FakeSupplicant::bind(&path);
    let channel = Arc::new(ControlChannel::open(&path, &options(&dir)).unwrap());

    let reader_channel = Arc::clone(&channel);
    let reader = thread::spawn(move || EventReader::default().wait(&reader_channel));

    thread::sleep(Duration::from_millis(50));
    channel.close();

    let event = reader.join().unwrap();
    assert_eq!(event, MonitorEvent::Terminating(Termination::ConnectionClosed));
    assert_eq!(
        event.to_string(),
        "CTRL-EVENT-TERMINATING - connection closed"
    );
}

#[test]
fn test_command_timeout_unblocks_reader() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wlan0");
    let _daemon = FakeSupplicant::bind(&path);
    let channel = Arc::new(ControlChannel::open(&path, &options(&dir)).unwrap());

    let reader_channel = Arc::clone(&channel);
    let reader = thread::spawn(move || EventReader::default().wait(&reader_channel));

    let dispatcher = CommandDispatcher::new(Duration::from_millis(100), 256);
    let err = dispatcher.send(&channel, "SILENT").unwrap_err();
    assert!(err.is_timeout());

    assert!(reader.join().unwrap().is_terminating());
    channel.close();
}

#[test]
fn test_hal_lifecycle_with_two_interfaces() {
    let dir = tempdir().unwrap();
    let iface_dir = dir.path().join("iface");
    let ctrl_dir = dir.path().join("ctrl");
    fs::create_dir_all(&iface_dir).unwrap();
    fs::create_dir_all(&ctrl_dir).unwrap();

    let primary = FakeSupplicant::bind(&iface_dir.join("wlan0"));
    let secondary = FakeSupplicant::bind(&ctrl_dir.join("p2p0"));

    let mut config = Config::default();
    config.interface.iface_dir = iface_dir;
    config.interface.ctrl_dir = ctrl_dir;
    config.client.dir = client_dir(&dir);
    config.timing.stop_wait_ms = 200;

    let daemon = Arc::new(FakeDaemon::default());
    let hal = SupplicantHal::new(config, daemon.clone());

    // Not running yet
    assert!(matches!(
        hal.connect_to_supplicant(None),
        Err(HalError::NotRunning(_))
    ));

    hal.start_supplicant(false).unwrap();
    hal.connect_to_supplicant(Some("wlan0")).unwrap();
    hal.connect_to_supplicant(Some("p2p0")).unwrap();
    assert_eq!(primary.monitor_count(), 1);
    assert_eq!(secondary.monitor_count(), 1);

    let reply = hal.command(Some("wlan0"), "PING").unwrap();
    assert_eq!(reply.text(), "PONG");
    let reply = hal.command(Some("p2p0"), "PING").unwrap();
    assert_eq!(reply.text(), "PONG");

    secondary.push("P2P-DEVICE-FOUND 02:00:00:00:01:00");
    assert_eq!(
        hal.wait_for_event(Some("p2p0")).into_text(),
        "P2P-DEVICE-FOUND 02:00:00:00:01:00"
    );

    // Reconnecting the primary replaces the old channel
    hal.connect_to_supplicant(None).unwrap();
    assert_eq!(primary.monitor_count(), 1);

    hal.close_supplicant_connection(Some("p2p0"));
    assert_eq!(secondary.monitor_count(), 0);
    assert!(matches!(
        hal.command(Some("p2p0"), "PING"),
        Err(HalError::NotConnected(_))
    ));

    hal.stop_supplicant(false).unwrap();
    hal.close_supplicant_connection(None);
    assert_eq!(primary.monitor_count(), 0);
    assert!(hal.wait_for_event(None).is_terminating());
}
