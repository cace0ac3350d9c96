//! Picolink host runtime.
//!
//! Wires the communication core to simulated hardware and runs it on a
//! host.
//!
//! ```text
//!   serial (stdin/stdout or a tty) ──▶ Ingest ─┐
//!   rpc-net thread: Wi-Fi ─▶ TCP :8888 ─▶ Ingest ─┤
//!                                                 ▼
//!                                          DispatchEngine
//!                                                 │
//!            FrameLogger ─┐        ┌── DeviceService (LED · echo · DHT22 · Wi-Fi)
//!                         ▼        ▼
//!   sensor-stream thread ─▶ OutputFanout ─▶ serial + attached TCP client
//! ```
#![deny(unused_must_use)]

use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info, warn};

use picolink::adapters::led::SimLed;
use picolink::adapters::log_sink::FrameLogger;
use picolink::adapters::nvs::{FileSettingsStore, MemorySettingsStore};
use picolink::adapters::sensor::SimDht22;
use picolink::adapters::wifi::SimWifiDriver;
use picolink::app::ports::SettingsStore;
use picolink::app::sampler::{RateLimitedSensor, SharedSensor};
use picolink::app::service::DeviceService;
use picolink::config::DeviceConfig;
use picolink::net::NetworkAttachment;
use picolink::rpc::engine::DispatchEngine;
use picolink::rpc::fanout::OutputFanout;
use picolink::rpc::ingest::Ingest;
use picolink::rpc::registry::Registry;
use picolink::rpc::session::StreamSession;
use picolink::rpc::stream::StreamSlot;
use picolink::rpc::transport::{Link, SerialTransport};
use picolink::settings::Settings;

/// Picolink device runtime
#[derive(Parser, Debug)]
#[command(name = "picolink")]
#[command(about = "Framed RPC device core with simulated hardware")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device used as the local link (default: stdin/stdout)
    #[arg(short, long)]
    serial: Option<PathBuf>,

    /// Directory for persisted settings (default: in memory)
    #[arg(long)]
    settings_dir: Option<PathBuf>,

    /// TCP port for the RPC listener
    #[arg(short, long)]
    port: Option<u16>,

    /// Address the RPC listener binds to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Maximum log level sent on the log address
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,

    /// Also print log records to stderr
    #[arg(long)]
    log_stderr: bool,
}

fn load_config(args: &Args) -> Result<DeviceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => DeviceConfig::default(),
    };
    if let Some(serial) = &args.serial {
        config.serial_device = Some(serial.display().to_string());
    }
    if let Some(dir) = &args.settings_dir {
        config.settings_dir = Some(dir.display().to_string());
    }
    if let Some(port) = args.port {
        config.network.port = port;
    }
    Ok(config)
}

/// Open the local link as a (reader, transport) pair.
fn open_serial(device: Option<&str>) -> Result<(Box<dyn Read + Send>, SerialTransport)> {
    match device {
        Some(path) => {
            let port = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .with_context(|| format!("opening serial device {path}"))?;
            let writer = port.try_clone().context("cloning serial handle")?;
            Ok((Box::new(port), SerialTransport::new(writer)))
        }
        None => Ok((Box::new(io::stdin()), SerialTransport::new(io::stdout()))),
    }
}

fn open_settings_store(dir: Option<&str>) -> Box<dyn SettingsStore> {
    match dir.map(FileSettingsStore::open) {
        Some(Ok(store)) => {
            info!("Settings: persisting to {}", store.root().display());
            Box::new(store)
        }
        Some(Err(e)) => {
            warn!("Settings: store unavailable ({e}), keeping settings in memory");
            Box::new(MemorySettingsStore::new())
        }
        None => Box::new(MemorySettingsStore::new()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // ── 1. Local link + logging ───────────────────────────────
    let (serial_rx, serial_tx) = open_serial(config.serial_device.as_deref())?;
    let fanout = Arc::new(OutputFanout::new(serial_tx));
    FrameLogger::new(fanout.clone(), config.rpc.log_address, args.log_level)
        .mirror_to_stderr(args.log_stderr)
        .install()
        .context("installing logger")?;

    info!("Picolink v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 2. Settings + peripherals ─────────────────────────────
    let settings = Arc::new(Settings::load(open_settings_store(
        config.settings_dir.as_deref(),
    )));
    let sensor = SharedSensor::new(RateLimitedSensor::new(
        Box::new(SimDht22::default()),
        config.stream.sensor_min_interval(),
    ));
    let led = SimLed::new();

    // ── 3. RPC service ────────────────────────────────────────
    let slot = Arc::new(StreamSlot::new());
    let service = Arc::new(DeviceService::new(
        led,
        sensor.clone(),
        settings.clone(),
        slot.clone(),
    ));
    let registry = service.register(Registry::builder()).build();
    info!("RPC: {} procedures registered", registry.len());
    let rpc_address = config.rpc.rpc_address;
    let engine = Arc::new(DispatchEngine::new(registry, fanout, rpc_address));

    // ── 4. Background threads ─────────────────────────────────
    StreamSession::new(slot, sensor, config.stream.stream_period())
        .spawn()
        .context("spawning sensor stream thread")?;

    let network = NetworkAttachment::new(
        SimWifiDriver::permissive(),
        settings,
        config.network.clone(),
        engine.clone(),
        rpc_address,
    )
    .with_bind_ip(args.bind);
    let watch = network.watch();
    network.spawn().context("spawning network thread")?;

    // ── 5. Serial ingest on the main thread ───────────────────
    info!("RPC: serial link ready");
    let mut ingest = Ingest::new(&engine, Link::Serial, rpc_address);
    match ingest.run(serial_rx, config.rpc.serial_read_chunk) {
        Ok(()) => info!(
            "RPC: serial link closed after {} requests (network {:?}), shutting down",
            ingest.dispatched(),
            watch.state()
        ),
        Err(e) => {
            error!("RPC: serial read failed: {e}");
            return Err(e).context("serial ingest");
        }
    }
    Ok(())
}
