//! # Command Mapper Module
//!
//! Turns controller input into motion commands and relays them to the car.
//!
//! ## Analog Arbitration
//!
//! One [`AxisSample`] yields exactly one [`Command`]; there are no diagonal
//! commands.
//!
//! 1. `fb` is the inverted forward/backward axis and `lr` the left/right
//!    axis, each zeroed inside the deadzone (|v| <= 0.2).
//! 2. `speed = round(max(|fb|, |lr|) * 255)`.
//! 3. If `|fb| > |lr|` and `fb` is outside the deadzone: Forward or Backward.
//! 4. Else if `lr` is outside the deadzone: Right or Left.
//! 5. Else: Stop.
//!
//! On a tie (`|fb| == |lr|`) left/right wins.
//!
//! ## Digital Input
//!
//! A d-pad press sends its direction at [`DIGITAL_SPEED`]; a release sends
//! Stop. The d-pad ignores the deadzone and overrides the last stick command.
//!
//! ## Usage
//!
//! ```no_run
//! use rc_car_bridge::controller::command_mapper::CommandMapper;
//! use rc_car_bridge::controller::mapper::AxisSample;
//! use rc_car_bridge::serial::SerialLink;
//! use rc_car_bridge::serial::device::DeviceHandle;
//!
//! # async fn run() {
//! let mut mapper = CommandMapper::new(SerialLink::default());
//! mapper.attach_link(&DeviceHandle::from_path("/dev/ttyACM0")).await;
//!
//! let dispatch = mapper.handle_axes(AxisSample::new(-0.5, 0.0)).await;
//! println!("{} (sent: {})", dispatch.command, dispatch.sent);
//! println!("{}", mapper.status());
//! # }
//! ```

use std::fmt;

use tracing::{debug, info};

use super::calibration::Deadzone;
use super::mapper::{AxisSample, DpadDirection};
use crate::protocol::{Command, Direction, DIGITAL_SPEED, SPEED_MAX};
use crate::serial::device::DeviceHandle;
use crate::serial::SerialLink;

/// Presence of the controller or the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl From<bool> for ConnectionState {
    fn from(connected: bool) -> Self {
        if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => f.write_str("Connected"),
            ConnectionState::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// Snapshot of what the operator sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveStatus {
    pub link: ConnectionState,
    pub controller: ConnectionState,
    /// Speed of the last transmitted command, 0-100
    pub speed_percent: u8,
    /// Label of the last transmitted command, `"None"` before the first one
    pub last_command: String,
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "USB: {} | Controller: {} | Speed: {}% | Last Command: {}",
            self.link, self.controller, self.speed_percent, self.last_command
        )
    }
}

/// Result of handling one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// The command the input mapped to
    pub command: Command,
    /// Whether it reached the link
    pub sent: bool,
}

/// Maps one stick sample to a command.
///
/// Pure function of its inputs.
///
/// # Examples
///
/// ```
/// use rc_car_bridge::controller::calibration::Deadzone;
/// use rc_car_bridge::controller::command_mapper::arbitrate;
/// use rc_car_bridge::controller::mapper::AxisSample;
/// use rc_car_bridge::protocol::{Command, Direction};
///
/// // Stick pushed halfway up
/// let cmd = arbitrate(&AxisSample::new(-0.5, 0.0), &Deadzone::default());
/// assert_eq!(cmd, Command::new(Direction::Forward, 128));
/// ```
#[must_use]
pub fn arbitrate(sample: &AxisSample, deadzone: &Deadzone) -> Command {
    // Up reads negative
    let fb = deadzone.apply(-sample.forward_backward);
    let lr = deadzone.apply(sample.left_right);

    let magnitude = fb.abs().max(lr.abs());
    let speed = (magnitude * f32::from(SPEED_MAX))
        .round()
        .clamp(0.0, f32::from(SPEED_MAX)) as u8;

    if fb.abs() > lr.abs() && deadzone.exceeds(fb) {
        let direction = if fb > 0.0 { Direction::Forward } else { Direction::Backward };
        Command::new(direction, speed)
    } else if deadzone.exceeds(lr) {
        let direction = if lr > 0.0 { Direction::Right } else { Direction::Left };
        Command::new(direction, speed)
    } else {
        Command::stop()
    }
}

/// Converts controller input into commands and forwards them to the link.
///
/// Owns the serial link and the controller presence flag. Display state is
/// updated only when a command is actually written.
#[derive(Debug)]
pub struct CommandMapper {
    link: SerialLink,
    deadzone: Deadzone,
    controller: ConnectionState,
    speed_percent: u8,
    last_command: Option<Command>,
}

impl CommandMapper {
    /// Creates a mapper with the default 0.2 deadzone.
    pub fn new(link: SerialLink) -> Self {
        Self::with_deadzone(link, Deadzone::default())
    }

    pub fn with_deadzone(link: SerialLink, deadzone: Deadzone) -> Self {
        Self {
            link,
            deadzone,
            controller: ConnectionState::Disconnected,
            speed_percent: 0,
            last_command: None,
        }
    }

    /// Connects the link to `device` and sends an initial Stop.
    ///
    /// Returns whether the link came up.
    pub async fn attach_link(&mut self, device: &DeviceHandle) -> bool {
        if !self.link.connect(device) {
            return false;
        }
        self.transmit(Command::stop()).await;
        true
    }

    /// Closes the link (device detached).
    pub async fn detach_link(&mut self) {
        self.link.disconnect().await;
    }

    /// True when the link is open but the device stopped answering reads.
    pub fn link_lost(&self) -> bool {
        self.link.reader_stopped()
    }

    pub fn link_state(&self) -> ConnectionState {
        self.link.is_connected().into()
    }

    /// Device the link is attached to.
    pub fn link_device(&self) -> Option<&DeviceHandle> {
        self.link.device()
    }

    pub fn controller_state(&self) -> ConnectionState {
        self.controller
    }

    /// Records that a controller is present.
    pub fn controller_connected(&mut self) {
        self.controller = ConnectionState::Connected;
    }

    /// Records that the controller went away and stops the car.
    pub async fn controller_disconnected(&mut self) -> Dispatch {
        self.controller = ConnectionState::Disconnected;
        self.dispatch(Command::stop()).await
    }

    /// Maps a stick sample and sends the result.
    pub async fn handle_axes(&mut self, sample: AxisSample) -> Dispatch {
        let command = arbitrate(&sample, &self.deadzone);
        self.dispatch(command).await
    }

    /// Sends a d-pad press at fixed speed, or Stop on release.
    pub async fn handle_dpad(&mut self, direction: DpadDirection, pressed: bool) -> Dispatch {
        let command = if pressed {
            Command::new(direction.direction(), DIGITAL_SPEED)
        } else {
            Command::stop()
        };
        self.dispatch(command).await
    }

    /// Stops the car and closes the link.
    pub async fn shutdown(&mut self) {
        self.transmit(Command::stop()).await;
        self.link.disconnect().await;
        info!("Command mapper shut down");
    }

    /// Current display state.
    pub fn status(&self) -> DriveStatus {
        DriveStatus {
            link: self.link_state(),
            controller: self.controller,
            speed_percent: self.speed_percent,
            last_command: self
                .last_command
                .map_or_else(|| "None".to_string(), |command| command.to_string()),
        }
    }

    async fn dispatch(&mut self, command: Command) -> Dispatch {
        let sent = self.transmit(command).await;
        Dispatch { command, sent }
    }

    /// Writes the command's wire byte; on success updates the display state.
    async fn transmit(&mut self, command: Command) -> bool {
        if !self.link.send(&command.encode()).await {
            debug!("Dropped command: {}", command);
            return false;
        }

        self.last_command = Some(command);
        // Recomputed from the transmitted 0-255 speed
        self.speed_percent = command.speed_percent();
        true
    }
}
