//! # RC Car Bridge
//!
//! Drive a USB-serial robot car with a gamepad.
//!
//! This application reads stick and d-pad input from an evdev gamepad, maps
//! each input to a single motion command and writes its one-byte encoding to
//! an Arduino-class board over USB serial.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use rc_car_bridge::bridge::Bridge;
use rc_car_bridge::config::{Config, LoggingConfig};
use rc_car_bridge::controller::command_mapper::CommandMapper;
use rc_car_bridge::serial::SerialLink;
use rc_car_bridge::telemetry::{self, TelemetryLogger};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Buffered controller events between the reader thread and the main loop
const CONTROLLER_CHANNEL_CAPACITY: usize = 256;

/// File name prefix for daily rolling log files
const LOG_FILE_PREFIX: &str = "rc-car-bridge.log";

/// Log filter used when `RUST_LOG` is unset or invalid
const DEFAULT_LOG_FILTER: &str = "info";

/// Main entry point for RC Car Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (argument, `config/default.toml`, or defaults)
///    - Set up logging with tracing subscriber
///    - Open the telemetry log and register it as the serial read listener
///
/// 2. **Main Loop**
///    - Every `rescan_interval_ms`: detect a detached serial device, attach a
///      newly available one, and reopen the controller if it went away
///    - Map each controller event to a command and send it
///    - Log the status line whenever it changes
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Send Stop, then close the serial link
///
/// # Errors
///
/// Returns error if the configuration is invalid or the telemetry directory
/// cannot be created.
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO rc_car_bridge: RC Car Bridge v0.1.0 starting...
/// INFO rc_car_bridge::serial::device: Selected reference board at /dev/ttyACM0
/// INFO rc_car_bridge::serial: Serial link established with /dev/ttyACM0
/// INFO rc_car_bridge: USB: Connected | Controller: Connected | Speed: 50% | Last Command: Forward (Speed: 128)
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let (config, source) = load_config(std::env::args().nth(1))?;
    let _log_guard = init_logging(&config.logging);

    info!("RC Car Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", source);

    let telemetry = TelemetryLogger::from_config(&config.telemetry)?
        .map(|logger| Arc::new(Mutex::new(logger)));

    let mut link = SerialLink::default();
    if let Some(shared) = &telemetry {
        link.set_read_listener(telemetry::inbound_listener(Arc::clone(shared)));
    }

    let (controller_tx, mut controller_rx) = mpsc::channel(CONTROLLER_CHANNEL_CAPACITY);
    let mut rescan = interval(Duration::from_millis(config.serial.rescan_interval_ms));
    rescan.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut bridge = Bridge::new(config, CommandMapper::new(link), telemetry, controller_tx);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = rescan.tick() => bridge.rescan().await,

            Some(event) = controller_rx.recv() => bridge.on_controller_event(event).await,

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    bridge.shutdown().await;
    Ok(())
}

/// Loads the configuration and describes where it came from.
fn load_config(path: Option<String>) -> Result<(Config, String)> {
    match path {
        Some(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("failed to load configuration from {}", path))?;
            Ok((config, path))
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::load(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("failed to load configuration from {}", DEFAULT_CONFIG_PATH))?;
            Ok((config, DEFAULT_CONFIG_PATH.to_string()))
        }
        None => Ok((Config::default(), "built-in defaults".to_string())),
    }
}

/// Initializes tracing; the returned guard must live until exit to flush file output.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(directives.as_deref());
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match config.file_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Builds the log filter from `RUST_LOG`-style directives, defaulting to INFO.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
