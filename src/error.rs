//! # Error Types
//!
//! Custom error types for RC Car Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for RC Car Bridge
#[derive(Debug, Error)]
pub enum CarBridgeError {
    /// The serial device could not be opened
    #[error("Failed to open device: {0}")]
    DeviceOpen(String),

    /// The device opened but the line settings could not be applied
    #[error("Failed to configure serial link: {0}")]
    LinkConfiguration(String),

    /// Writing to an open link failed
    #[error("Failed to write to serial link: {0}")]
    Write(String),

    /// A send was attempted with no open link
    #[error("Serial link is not connected")]
    NotConnected,

    /// No serial device available to connect to
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Controller I/O errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No gamepad found among the input devices
    #[error("No gamepad controller found")]
    ControllerNotFound,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Telemetry serialization errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RC Car Bridge
pub type Result<T> = std::result::Result<T, CarBridgeError>;
