//! # Telemetry Record Types
//!
//! One JSON object per line, e.g.:
//!
//! ```text
//! {"timestamp":"2026-10-18T12:00:00.000000+00:00","kind":"command","direction":"F","speed":128}
//! {"timestamp":"2026-10-18T12:00:00.120000+00:00","kind":"inbound","data":"OK\n"}
//! ```

use serde::Serialize;

use crate::controller::command_mapper::ConnectionState;
use crate::protocol::Command;

/// Something worth recording during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Bytes received from the car, as lossy UTF-8
    Inbound { data: String },
    /// A command written to the car
    Command { direction: String, speed: u8 },
    /// Serial link came up or went down
    Link { state: String, device: Option<String> },
    /// Controller appeared or went away
    Controller { state: String },
}

impl TelemetryEvent {
    pub fn inbound(data: &[u8]) -> Self {
        TelemetryEvent::Inbound {
            data: String::from_utf8_lossy(data).into_owned(),
        }
    }

    pub fn command(command: &Command) -> Self {
        TelemetryEvent::Command {
            direction: char::from(command.direction().wire_byte()).to_string(),
            speed: command.speed(),
        }
    }

    pub fn link(state: ConnectionState, device: Option<&str>) -> Self {
        TelemetryEvent::Link {
            state: state.to_string(),
            device: device.map(str::to_string),
        }
    }

    pub fn controller(state: ConnectionState) -> Self {
        TelemetryEvent::Controller {
            state: state.to_string(),
        }
    }
}

/// A timestamped event, as written to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339, UTC
    pub timestamp: String,
    #[serde(flatten)]
    pub event: TelemetryEvent,
}

impl TelemetryRecord {
    /// Stamps `event` with the current time.
    pub fn now(event: TelemetryEvent) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
        }
    }
}
