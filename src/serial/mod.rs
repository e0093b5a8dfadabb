//! # Serial Communication Module
//!
//! Handles the serial link to the car's microcontroller.
//!
//! This module handles:
//! - Opening the USB serial device at 9600 baud, 8-N-1, no flow control
//! - Writing command bytes
//! - Passively reading whatever the car sends back, for diagnostics only
//! - Closing the link
//!
//! Every [`SerialLink`] operation absorbs its own failures: callers get a
//! `bool` and the error is logged.

pub mod device;
pub mod port_trait;

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{CarBridgeError, Result};
use device::DeviceHandle;
use port_trait::{OpenedPort, PortOpener, PortReader, SerialPortIO, TokioSerialOpener};

/// Read buffer size for the passive reader
const READ_BUFFER_SIZE: usize = 256;

/// Observer for bytes received from the car
pub type ReadListener = Arc<dyn Fn(&Bytes) + Send + Sync>;

/// Default listener: log inbound data
fn log_inbound(data: &Bytes) {
    debug!("Received from device: {}", String::from_utf8_lossy(data));
}

/// Serial link to the car
///
/// Owns at most one open connection. States: disconnected (no port) and
/// connected (port open, passive reader running).
pub struct SerialLink {
    opener: Box<dyn PortOpener + Send>,
    listener: ReadListener,
    port: Option<Box<dyn SerialPortIO>>,
    reader: Option<JoinHandle<()>>,
    device: Option<DeviceHandle>,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device", &self.device)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new(Box::new(TokioSerialOpener))
    }
}

impl SerialLink {
    /// Creates a disconnected link that opens devices through `opener`.
    pub fn new(opener: Box<dyn PortOpener + Send>) -> Self {
        Self {
            opener,
            listener: Arc::new(log_inbound),
            port: None,
            reader: None,
            device: None,
        }
    }

    /// Registers the observer for inbound bytes.
    ///
    /// Takes effect on the next [`connect`](Self::connect).
    pub fn set_read_listener(&mut self, listener: ReadListener) {
        self.listener = listener;
    }

    /// Opens and configures `device`, then starts the passive reader.
    ///
    /// Returns `false` if the device cannot be opened or configured. Calling
    /// this while already connected leaves the existing link untouched and
    /// returns `false`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&mut self, device: &DeviceHandle) -> bool {
        if let Some(current) = &self.device {
            warn!(
                "Already connected to {}, ignoring connect to {}",
                current.path, device.path
            );
            return false;
        }

        match self.opener.open(device) {
            Ok(OpenedPort { writer, reader }) => {
                self.port = Some(writer);
                self.reader = reader.map(|reader| {
                    tokio::spawn(read_loop(reader, Arc::clone(&self.listener)))
                });
                self.device = Some(device.clone());
                info!("Serial link established with {}", device.path);
                true
            }
            Err(e) => {
                error!("Error connecting to {}: {}", device.path, e);
                false
            }
        }
    }

    /// Writes raw bytes to the link.
    ///
    /// Returns `false` without touching the port when disconnected. A failed
    /// write is logged and the link stays connected.
    pub async fn send(&mut self, data: &[u8]) -> bool {
        match self.try_send(data).await {
            Ok(()) => true,
            Err(CarBridgeError::NotConnected) => {
                warn!("Not connected, cannot send data");
                false
            }
            Err(e) => {
                error!("Error sending data: {}", e);
                false
            }
        }
    }

    async fn try_send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(CarBridgeError::NotConnected)?;

        port.write_all(data)
            .await
            .map_err(|e| CarBridgeError::Write(e.to_string()))?;
        port.flush()
            .await
            .map_err(|e| CarBridgeError::Write(format!("flush failed: {}", e)))?;

        debug!("Sent to device: {}", String::from_utf8_lossy(data));
        Ok(())
    }

    /// Stops the reader and closes the link. Safe to call at any time.
    pub async fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.shutdown().await {
                error!("Error disconnecting: {}", e);
            }
        }

        if let Some(device) = self.device.take() {
            info!("Serial link to {} closed", device.path);
        }
    }

    /// Returns true while a link is open.
    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Returns true when the link is open but its passive reader has ended,
    /// which happens when the device goes away.
    pub fn reader_stopped(&self) -> bool {
        self.reader.as_ref().is_some_and(|reader| reader.is_finished())
    }

    /// The device currently bound to this link, if any.
    pub fn device(&self) -> Option<&DeviceHandle> {
        self.device.as_ref()
    }
}

/// Hands every chunk read from the car to `listener` until EOF or error.
async fn read_loop(mut reader: PortReader, listener: ReadListener) {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        buf.reserve(READ_BUFFER_SIZE);
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("Serial read stream closed");
                break;
            }
            Ok(_) => {
                let chunk = buf.split().freeze();
                listener(&chunk);
            }
            Err(e) => {
                warn!("Serial read failed: {}", e);
                break;
            }
        }
    }
}
