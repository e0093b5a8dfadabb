//! # Drive Protocol
//!
//! Motion commands and their wire encoding.
//!
//! The car firmware reads one ASCII byte per command. There is no framing,
//! no length prefix and no acknowledgment:
//!
//! | Direction | Byte  |
//! |-----------|-------|
//! | Forward   | `'F'` |
//! | Backward  | `'B'` |
//! | Left      | `'L'` |
//! | Right     | `'R'` |
//! | Stop      | `'S'` |
//!
//! The speed carried by a [`Command`] is never written to the wire. It is
//! only used for status reporting; the firmware drives each direction at its
//! own fixed speed.

use std::fmt;

/// Wire byte for [`Direction::Forward`]
pub const WIRE_FORWARD: u8 = b'F';
/// Wire byte for [`Direction::Backward`]
pub const WIRE_BACKWARD: u8 = b'B';
/// Wire byte for [`Direction::Left`]
pub const WIRE_LEFT: u8 = b'L';
/// Wire byte for [`Direction::Right`]
pub const WIRE_RIGHT: u8 = b'R';
/// Wire byte for [`Direction::Stop`]
pub const WIRE_STOP: u8 = b'S';

/// Maximum command speed
pub const SPEED_MAX: u8 = 255;

/// Fixed speed used for digital (d-pad) input
pub const DIGITAL_SPEED: u8 = 200;

/// Direction of a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl Direction {
    /// Returns the single byte sent to the car for this direction.
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_car_bridge::protocol::Direction;
    ///
    /// assert_eq!(Direction::Forward.wire_byte(), b'F');
    /// assert_eq!(Direction::Stop.wire_byte(), b'S');
    /// ```
    #[must_use]
    pub fn wire_byte(self) -> u8 {
        match self {
            Direction::Forward => WIRE_FORWARD,
            Direction::Backward => WIRE_BACKWARD,
            Direction::Left => WIRE_LEFT,
            Direction::Right => WIRE_RIGHT,
            Direction::Stop => WIRE_STOP,
        }
    }

    /// Human-readable name used in status output.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Direction::Forward => "Forward",
            Direction::Backward => "Backward",
            Direction::Left => "Left",
            Direction::Right => "Right",
            Direction::Stop => "Stop",
        }
    }
}

/// A motion command: a direction paired with a speed (0-255).
///
/// Commands are immutable. A stop command always carries speed 0.
///
/// # Examples
///
/// ```
/// use rc_car_bridge::protocol::{Command, Direction};
///
/// let cmd = Command::new(Direction::Left, 77);
/// assert_eq!(cmd.direction(), Direction::Left);
/// assert_eq!(cmd.speed(), 77);
/// assert_eq!(cmd.encode(), [b'L']);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    direction: Direction,
    speed: u8,
}

impl Command {
    /// Creates a command. The speed of a [`Direction::Stop`] command is forced to 0.
    #[must_use]
    pub fn new(direction: Direction, speed: u8) -> Self {
        let speed = if direction == Direction::Stop { 0 } else { speed };
        Self { direction, speed }
    }

    /// The stop command, `Stop(0)`.
    #[must_use]
    pub const fn stop() -> Self {
        Self {
            direction: Direction::Stop,
            speed: 0,
        }
    }

    /// Returns the command direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the command speed (0-255).
    #[must_use]
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Encodes the command for the wire. Only the direction is transmitted.
    #[must_use]
    pub fn encode(&self) -> [u8; 1] {
        [self.direction.wire_byte()]
    }

    /// Speed as an integer percentage of [`SPEED_MAX`], truncated.
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_car_bridge::protocol::{Command, Direction};
    ///
    /// assert_eq!(Command::new(Direction::Forward, 128).speed_percent(), 50);
    /// assert_eq!(Command::new(Direction::Forward, 255).speed_percent(), 100);
    /// ```
    #[must_use]
    pub fn speed_percent(&self) -> u8 {
        // Fits in u8: the quotient is at most 100
        (u32::from(self.speed) * 100 / u32::from(SPEED_MAX)) as u8
    }
}

impl fmt::Display for Command {
    /// Formats the "last command" label, e.g. `Forward (Speed: 128)` or `Stop`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Stop => f.write_str("Stop"),
            direction => write!(f, "{} (Speed: {})", direction.name(), self.speed),
        }
    }
}
