//! # Telemetry Module
//!
//! Session log in JSONL files with rotation.
//!
//! This module handles:
//! - Recording data received from the car
//! - Recording transmitted commands and connection changes
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

pub mod logger;
pub mod types;

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::serial::ReadListener;
pub use logger::TelemetryLogger;
pub use types::{TelemetryEvent, TelemetryRecord};

/// Logger shared between the read listener and the main loop
pub type SharedTelemetry = Arc<Mutex<TelemetryLogger>>;

/// Records one event, logging (not returning) any failure.
pub fn record(telemetry: &SharedTelemetry, event: TelemetryEvent) {
    match telemetry.lock() {
        Ok(mut logger) => {
            if let Err(e) = logger.log(event) {
                warn!("Failed to write telemetry: {}", e);
            }
        }
        Err(_) => warn!("Telemetry logger poisoned, dropping record"),
    }
}

/// Read listener that logs inbound bytes and records them to telemetry.
pub fn inbound_listener(telemetry: SharedTelemetry) -> ReadListener {
    Arc::new(move |data: &Bytes| {
        debug!("Received from device: {}", String::from_utf8_lossy(data));
        record(&telemetry, TelemetryEvent::inbound(data));
    })
}
