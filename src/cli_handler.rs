//! Subcommand handling for supplicant-link.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::Commands;
use crate::config::Config;
use crate::ctrl::{
    ChannelSlot, ControlChannel, EventReader, MonitorEvent, cleanup_stale_client_sockets,
};
use crate::hal::{SupplicantHal, endpoint_path};

/// Run one subcommand against the effective configuration.
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Ping { iface } => send_request(config, iface.as_deref(), "PING"),
        Commands::Command { iface, command } => {
            send_request(config, iface.as_deref(), &command.join(" "))
        }
        Commands::Monitor { iface } => run_monitor(config, iface.as_deref()),
        Commands::Cleanup => {
            let removed = cleanup_stale_client_sockets(&config.client_endpoint());
            println!("Removed {} stale client sockets", removed);
            Ok(())
        }
        Commands::Supervise { p2p, iface } => run_supervised(config.clone(), p2p, iface),
        Commands::ShowConfig => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            print!("{}", rendered);
            Ok(())
        }
    }
}

/// How often the exit watcher rechecks whether supervision is over.
const EXIT_POLL: Duration = Duration::from_millis(500);

/// Open a channel to the daemon serving `iface`.
fn open_channel(config: &Config, iface: Option<&str>) -> Result<ControlChannel> {
    let slot = ChannelSlot::for_interface(config.primary_iface(), iface);
    let path = endpoint_path(config, slot, iface);
    debug!("Opening {} channel to {:?}", slot, path);

    ControlChannel::open(&path, &config.channel_options())
        .with_context(|| format!("Failed to connect to {}", path.display()))
}

fn send_request(config: &Config, iface: Option<&str>, request: &str) -> Result<()> {
    let channel = open_channel(config, iface)?;
    let result = config.dispatcher().send(&channel, request);
    channel.close();

    let reply = result.with_context(|| format!("'{}' failed", request))?;
    println!("{}", reply.text().trim_end());
    Ok(())
}

fn run_monitor(config: &Config, iface: Option<&str>) -> Result<()> {
    let channel = Arc::new(open_channel(config, iface)?);
    let rt = runtime()?;

    let reader_channel = Arc::clone(&channel);
    let mut reader = EventReader::new(config.event_buffer());
    let closer = Arc::clone(&channel);

    let last = rt.block_on(pump_events(
        move || reader.wait(&reader_channel),
        move || closer.close(),
    ))?;

    info!("{}", last);
    channel.close();
    Ok(())
}

fn run_supervised(config: Config, p2p: bool, iface: Option<String>) -> Result<()> {
    let hal = Arc::new(SupplicantHal::with_process_daemon(config));

    hal.start_supplicant(p2p)
        .context("Failed to start supplicant")?;
    hal.connect_to_supplicant(iface.as_deref())
        .context("Failed to connect to supplicant")?;

    let finished = Arc::new(AtomicBool::new(false));
    let watcher = close_on_exit(Arc::clone(&hal), iface.clone(), Arc::clone(&finished));

    let rt = runtime()?;
    let reader_hal = Arc::clone(&hal);
    let reader_iface = iface.clone();
    let stopper = Arc::clone(&hal);
    let stop_iface = iface.clone();

    let last = rt.block_on(pump_events(
        move || reader_hal.wait_for_event(reader_iface.as_deref()),
        move || {
            if let Err(e) = stopper.stop_supplicant(p2p) {
                warn!("Failed to stop supplicant: {}", e);
            }
            stopper.close_supplicant_connection(stop_iface.as_deref());
        },
    ));

    finished.store(true, Ordering::SeqCst);
    if watcher.join().is_err() {
        warn!("Exit watcher panicked");
    }

    info!("{}", last?);
    hal.close_supplicant_connection(iface.as_deref());
    hal.stop_supplicant(p2p).context("Failed to stop supplicant")?;
    Ok(())
}

/// Close the channel for `iface` once the supervised daemon exits.
///
/// A daemon that dies without a shutdown notice leaves the reader blocked
/// on a socket nobody writes to; closing the channel wakes it.
fn close_on_exit(
    hal: Arc<SupplicantHal>,
    iface: Option<String>,
    finished: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !finished.load(Ordering::SeqCst) {
            if hal.wait_for_supplicant_exit(EXIT_POLL) {
                info!("Supplicant exited, closing event stream");
                hal.close_supplicant_connection(iface.as_deref());
                return;
            }
        }
    })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// Print events from `next` until one ends the stream.
///
/// Daemon messages are printed, including its own shutdown notice, and the
/// last event is returned. On Ctrl-C, runs `shutdown` (which must unblock
/// `next`) and returns the terminating event the reader then produces.
async fn pump_events<N, S>(mut next: N, shutdown: S) -> Result<MonitorEvent>
where
    N: FnMut() -> MonitorEvent + Send + 'static,
    S: FnOnce() + Send + 'static,
{
    let mut reader = tokio::task::spawn_blocking(move || {
        loop {
            let event = next();
            if let MonitorEvent::Message(text) = &event {
                println!("{}", text);
            }
            if event.ends_stream() {
                break event;
            }
        }
    });

    tokio::select! {
        result = &mut reader => result.context("Event reader failed"),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down event stream");
            tokio::task::spawn_blocking(shutdown)
                .await
                .context("Shutdown task failed")?;
            reader.await.context("Event reader failed")
        }
    }
}
