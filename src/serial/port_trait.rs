//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, StopBits};
use tracing::debug;

use super::device::DeviceHandle;
use crate::error::{CarBridgeError, Result};

/// Link baud rate expected by the car firmware
pub const BAUD_RATE: u32 = 9600;

/// Read half of an open link
pub type PortReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Close the write side of the port
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// An opened and configured link, ready for use.
pub struct OpenedPort {
    /// Write side, used for commands
    pub writer: Box<dyn SerialPortIO>,
    /// Read side, handed to the passive reader when present
    pub reader: Option<PortReader>,
}

/// Opens a device and applies the fixed line settings.
///
/// Implementations must report a failure to open the device node as
/// [`CarBridgeError::DeviceOpen`] and a failure to apply line settings as
/// [`CarBridgeError::LinkConfiguration`].
#[cfg_attr(test, mockall::automock)]
pub trait PortOpener {
    fn open(&self, device: &DeviceHandle) -> Result<OpenedPort>;
}

/// Wrapper around any Tokio writer (normally the write half of a
/// `tokio_serial::SerialStream`) that implements SerialPortIO
pub struct TokioSerialPort<W> {
    port: W,
}

impl<W> TokioSerialPort<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> SerialPortIO for TokioSerialPort<W> {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.port.shutdown().await
    }
}

/// Opens real serial devices through `tokio-serial`.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSerialOpener;

impl TokioSerialOpener {
    /// Apply 8-N-1, no flow control
    fn configure(port: &mut tokio_serial::SerialStream) -> std::result::Result<(), tokio_serial::Error> {
        port.set_baud_rate(BAUD_RATE)?;
        port.set_data_bits(DataBits::Eight)?;
        port.set_stop_bits(StopBits::One)?;
        port.set_parity(Parity::None)?;
        port.set_flow_control(FlowControl::None)?;
        Ok(())
    }
}

impl PortOpener for TokioSerialOpener {
    fn open(&self, device: &DeviceHandle) -> Result<OpenedPort> {
        debug!("Opening serial device: {}", device.path);

        let mut port = tokio_serial::new(device.path.as_str(), BAUD_RATE)
            .open_native_async()
            .map_err(|e| CarBridgeError::DeviceOpen(format!("{}: {}", device.path, e)))?;

        Self::configure(&mut port)
            .map_err(|e| CarBridgeError::LinkConfiguration(format!("{}: {}", device.path, e)))?;

        let (reader, writer) = tokio::io::split(port);
        Ok(OpenedPort {
            writer: Box::new(TokioSerialPort::new(writer)),
            reader: Some(Box::new(reader)),
        })
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock serial port for testing
    #[derive(Clone)]
    pub struct MockSerialPort {
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub shutdown_calls: Arc<Mutex<usize>>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                written_data: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
                shutdown_calls: Arc::new(Mutex::new(0)),
            }
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        /// All written chunks concatenated, for wire-level assertions
        pub fn wire(&self) -> Vec<u8> {
            self.get_written_data().concat()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        pub fn clear_write_error(&self) {
            *self.write_error.lock().unwrap() = None;
        }

        pub fn shutdown_count(&self) -> usize {
            *self.shutdown_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        async fn shutdown(&mut self) -> io::Result<()> {
            *self.shutdown_calls.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// Opener that hands out clones of one mock port, with no reader
    pub fn opener_for(port: &MockSerialPort) -> MockPortOpener {
        let port = port.clone();
        let mut opener = MockPortOpener::new();
        opener.expect_open().returning(move |_| {
            Ok(OpenedPort {
                writer: Box::new(port.clone()),
                reader: None,
            })
        });
        opener
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate() {
        assert_eq!(BAUD_RATE, 9600, "Car firmware listens at 9600 baud");
    }

    #[test]
    fn test_open_nonexistent_device_is_device_open_error() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();

        let device = DeviceHandle::from_path("/dev/nonexistent_serial_device_12345");
        match TokioSerialOpener.open(&device) {
            Err(CarBridgeError::DeviceOpen(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
            }
            Err(other) => panic!("Expected DeviceOpen error, got: {:?}", other),
            Ok(_) => panic!("Opening a nonexistent device should fail"),
        }
    }

    #[tokio::test]
    async fn test_tokio_serial_port_writes_through() {
        use tokio::io::AsyncReadExt;

        let (client, mut server) = tokio::io::duplex(16);
        let mut port = TokioSerialPort::new(client);

        port.write_all(b"F").await.unwrap();
        port.flush().await.unwrap();
        port.shutdown().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"F");
    }
}
