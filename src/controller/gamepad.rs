//! # Gamepad Module
//!
//! This module handles gamepad detection, connection, and input reading
//! using the Linux evdev interface.
//!
//! ## Controller Detection
//!
//! Any input device is accepted as a gamepad if it reports:
//! - the `BTN_SOUTH` button (the bottom face button on every gamepad layout)
//! - an `ABS_Y` axis (left stick vertical)
//!
//! Sony controllers expose motion sensors and the touchpad as separate event
//! nodes; those lack `BTN_SOUTH` and are skipped.

use evdev::{AbsoluteAxisType, Device, InputEvent, Key};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{CarBridgeError, Result};

/// Events forwarded from the reader thread.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// A raw input event
    Input(InputEvent),
    /// Reading failed; the controller is gone
    Disconnected,
}

/// Gamepad handle
///
/// Represents an open evdev gamepad device.
pub struct Gamepad {
    device: Device,
    device_path: String,
}

impl std::fmt::Debug for Gamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gamepad")
            .field("device_path", &self.device_path)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Gamepad {
    /// Opens a gamepad.
    ///
    /// With `Some(path)` the given event node is opened and must look like a
    /// gamepad. With `None`, `/dev/input/event*` is scanned in sorted order
    /// and the first gamepad found is opened.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no gamepad found on the system
    /// - `Controller`: the device or `/dev/input` could not be read
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_car_bridge::controller::gamepad::Gamepad;
    ///
    /// let gamepad = Gamepad::open(None)?;
    /// println!("Connected to controller at: {}", gamepad.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device_path: Option<&str>) -> Result<Self> {
        match device_path {
            Some(path) => Self::open_path(Path::new(path)),
            None => Self::scan(Path::new("/dev/input")),
        }
    }

    fn open_path(path: &Path) -> Result<Self> {
        let device = Device::open(path).map_err(|e| {
            CarBridgeError::Controller(format!("Failed to open {}: {}", path.display(), e))
        })?;

        if !is_gamepad(&device) {
            return Err(CarBridgeError::Controller(format!(
                "{} is not a gamepad",
                path.display()
            )));
        }

        let device_path = path.to_string_lossy().to_string();
        info!("Opened gamepad at: {}", device_path);
        Ok(Self { device, device_path })
    }

    fn scan(input_dir: &Path) -> Result<Self> {
        if !input_dir.exists() {
            return Err(CarBridgeError::Controller(format!(
                "{} directory not found",
                input_dir.display()
            )));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| {
                CarBridgeError::Controller(format!("Failed to read {}: {}", input_dir.display(), e))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CarBridgeError::Controller(format!("Failed to read directory entry: {}", e)))?;

        // Sorted for deterministic selection when several pads are attached
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("event"));
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    debug!(
                        "Found input device: {} ({})",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );

                    if is_gamepad(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        info!(
                            "Found gamepad \"{}\" at: {}",
                            device.name().unwrap_or("unnamed"),
                            device_path
                        );
                        return Ok(Self { device, device_path });
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(CarBridgeError::ControllerNotFound)
    }

    /// Get the device path of this controller
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Human-readable device name reported by the driver
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    /// Fetch events from the controller
    ///
    /// Blocks until at least one event is available.
    ///
    /// # Errors
    ///
    /// Returns `Controller` error if fetching events fails (e.g., controller disconnected).
    pub fn fetch_events(&mut self) -> Result<impl Iterator<Item = InputEvent> + '_> {
        self.device
            .fetch_events()
            .map_err(|e| CarBridgeError::Controller(format!("Failed to fetch events: {}", e)))
    }

    /// Moves the gamepad to a dedicated reader thread.
    ///
    /// Every event is forwarded to `sender`. When reading fails a final
    /// [`ControllerEvent::Disconnected`] is sent and the thread exits. The
    /// thread also exits once the receiving side is dropped.
    pub fn spawn_reader(
        mut self,
        sender: mpsc::Sender<ControllerEvent>,
    ) -> std::io::Result<std::thread::JoinHandle<()>> {
        let device_path = self.device_path.clone();
        std::thread::Builder::new()
            .name("gamepad-reader".to_string())
            .spawn(move || loop {
                let events: Vec<InputEvent> = match self.fetch_events() {
                    Ok(events) => events.collect(),
                    Err(e) => {
                        warn!("Gamepad {} lost: {}", device_path, e);
                        let _ = sender.blocking_send(ControllerEvent::Disconnected);
                        return;
                    }
                };

                for event in events {
                    if sender.blocking_send(ControllerEvent::Input(event)).is_err() {
                        debug!("Controller event receiver closed, stopping reader");
                        return;
                    }
                }
            })
    }
}

/// Returns true if the device looks like a gamepad.
fn is_gamepad(device: &Device) -> bool {
    let has_face_button = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_SOUTH));
    let has_stick = device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.contains(AbsoluteAxisType::ABS_Y));
    has_face_button && has_stick
}
