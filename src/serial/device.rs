//! # Serial Device Selection
//!
//! Finds the USB serial device the car is attached to.
//!
//! Devices are matched against a reference board by vendor ID **or** product
//! ID. When nothing matches, the first available USB serial device is used.

use tokio_serial::SerialPortType;
use tracing::{debug, info};

use crate::error::{CarBridgeError, Result};

/// Arduino vendor ID
pub const ARDUINO_VENDOR_ID: u16 = 0x2341;

/// Arduino Uno product ID
pub const ARDUINO_UNO_PRODUCT_ID: u16 = 0x0043;

/// A serial device that can be handed to [`SerialLink::connect`](super::SerialLink::connect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Device node, e.g. `/dev/ttyACM0`
    pub path: String,
    /// USB vendor ID, when known
    pub vendor_id: Option<u16>,
    /// USB product ID, when known
    pub product_id: Option<u16>,
}

impl DeviceHandle {
    /// Creates a handle for an explicitly configured device path.
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            vendor_id: None,
            product_id: None,
        }
    }

    /// Creates a handle for a USB device with known identifiers.
    pub fn usb(path: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            path: path.into(),
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }
}

/// Reference board identifiers used to pick a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            vendor_id: ARDUINO_VENDOR_ID,
            product_id: ARDUINO_UNO_PRODUCT_ID,
        }
    }
}

impl DeviceFilter {
    /// Returns true when either identifier matches the reference board.
    #[must_use]
    pub fn matches(&self, device: &DeviceHandle) -> bool {
        device.vendor_id == Some(self.vendor_id) || device.product_id == Some(self.product_id)
    }
}

/// Picks the first device matching `filter`, falling back to the first device.
///
/// # Examples
///
/// ```
/// use rc_car_bridge::serial::device::{select_device, DeviceFilter, DeviceHandle};
///
/// let devices = vec![
///     DeviceHandle::usb("/dev/ttyUSB0", 0x1a86, 0x7523),
///     DeviceHandle::usb("/dev/ttyACM0", 0x2341, 0x0043),
/// ];
/// let selected = select_device(&devices, &DeviceFilter::default()).unwrap();
/// assert_eq!(selected.path, "/dev/ttyACM0");
/// ```
#[must_use]
pub fn select_device<'a>(devices: &'a [DeviceHandle], filter: &DeviceFilter) -> Option<&'a DeviceHandle> {
    devices
        .iter()
        .find(|device| filter.matches(device))
        .or_else(|| devices.first())
}

/// Lists the USB serial devices currently attached.
///
/// Non-USB ports (e.g. on-board UARTs) are skipped, so the fallback in
/// [`select_device`] never lands on one.
///
/// # Errors
///
/// Returns `SerialPortNotFound` if the ports cannot be enumerated.
pub fn enumerate_usb_devices() -> Result<Vec<DeviceHandle>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| CarBridgeError::SerialPortNotFound(format!("enumeration failed: {}", e)))?;

    let devices = ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) => {
                debug!(
                    "Found USB serial device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                    port.port_name, usb.vid, usb.pid
                );
                Some(DeviceHandle::usb(port.port_name, usb.vid, usb.pid))
            }
            _ => None,
        })
        .collect();

    Ok(devices)
}

/// Finds the device to drive: an explicit path wins, otherwise the best USB match.
///
/// # Errors
///
/// Returns `SerialPortNotFound` when no explicit path is configured and no USB
/// serial device is attached.
pub fn find_device(explicit_path: Option<&str>, filter: &DeviceFilter) -> Result<DeviceHandle> {
    if let Some(path) = explicit_path {
        return Ok(DeviceHandle::from_path(path));
    }

    let devices = enumerate_usb_devices()?;
    match select_device(&devices, filter) {
        Some(device) => {
            if filter.matches(device) {
                info!("Selected reference board at {}", device.path);
            } else {
                info!("No reference board found, falling back to {}", device.path);
            }
            Ok(device.clone())
        }
        None => Err(CarBridgeError::SerialPortNotFound("no USB serial devices attached".to_string())),
    }
}
