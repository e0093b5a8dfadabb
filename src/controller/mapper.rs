//! # Controller Input Mapper Module
//!
//! This module turns raw evdev events from a gamepad into driving input:
//! analog [`AxisSample`]s and digital d-pad presses.
//!
//! ## Event Types
//!
//! - **EV_ABS (Absolute Axis)**: sticks and the d-pad hat
//! - **EV_KEY (Key/Button)**: d-pad buttons on controllers that report them as keys
//! - **EV_SYN (Synchronization)**: `SYN_REPORT` closes one input frame
//!
//! ## Inputs Used
//!
//! | Input | evdev Code | Use |
//! |-------|------------|-----|
//! | Left Stick Y | ABS_Y | Forward/backward (up reads negative) |
//! | Right Stick X | ABS_RX | Left/right |
//! | D-Pad X | ABS_HAT0X | -1 = left, 1 = right |
//! | D-Pad Y | ABS_HAT0Y | -1 = up, 1 = down |
//! | D-Pad buttons | BTN_DPAD_UP/DOWN/LEFT/RIGHT | Same as the hat |
//!
//! Triggers are not used. Sony drivers report L2 as `ABS_Z`, which rests at
//! the bottom of its range and would read as full deflection.
//!
//! Stick changes are collected until `SYN_REPORT`, so one frame that moves
//! both sticks yields a single sample. D-pad changes are reported at once.
//!
//! ## Usage
//!
//! ```no_run
//! use rc_car_bridge::controller::gamepad::Gamepad;
//! use rc_car_bridge::controller::mapper::EventMapper;
//!
//! let mut gamepad = Gamepad::open(None)?;
//! let mut mapper = EventMapper::new();
//!
//! loop {
//!     for event in gamepad.fetch_events()? {
//!         if let Some(action) = mapper.process_event(&event) {
//!             println!("{:?}", action);
//!         }
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key, Synchronization};

use super::calibration::AxisRange;
use crate::protocol::Direction;

/// D-Pad hat value when released.
pub const DPAD_RELEASED: i32 = 0;
/// D-Pad hat value for left or up.
pub const DPAD_NEGATIVE: i32 = -1;
/// D-Pad hat value for right or down.
pub const DPAD_POSITIVE: i32 = 1;

/// One poll of the two driving axes, normalized to -1.0..=1.0.
///
/// `forward_backward` is kept as the device reports it: pushing the stick
/// up gives a negative value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisSample {
    pub forward_backward: f32,
    pub left_right: f32,
}

impl AxisSample {
    #[must_use]
    pub fn new(forward_backward: f32, left_right: f32) -> Self {
        Self {
            forward_backward,
            left_right,
        }
    }
}

/// A d-pad direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DpadDirection {
    Up,
    Down,
    Left,
    Right,
}

impl DpadDirection {
    /// The drive direction a press of this button requests.
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            DpadDirection::Up => Direction::Forward,
            DpadDirection::Down => Direction::Backward,
            DpadDirection::Left => Direction::Left,
            DpadDirection::Right => Direction::Right,
        }
    }
}

/// Driving input decoded from controller events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    /// The sticks moved
    Axes(AxisSample),
    /// A d-pad button was pressed or released
    Dpad { direction: DpadDirection, pressed: bool },
}

/// Parses raw evdev events into [`InputAction`]s.
///
/// # Thread Safety
///
/// `EventMapper` is not thread-safe. Use from a single task/thread only.
#[derive(Debug)]
pub struct EventMapper {
    range: AxisRange,
    forward_backward: i32,
    left_right: i32,
    axes_dirty: bool,
    hat_x: i32,
    hat_y: i32,
}

impl Default for EventMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl EventMapper {
    /// Creates a mapper for controllers reporting the default 0-255 range.
    #[must_use]
    pub fn new() -> Self {
        Self::with_range(AxisRange::default())
    }

    /// Creates a mapper for a controller with a custom raw axis range.
    #[must_use]
    pub fn with_range(range: AxisRange) -> Self {
        let center = range.min() + (range.max() - range.min()) / 2;
        Self {
            range,
            forward_backward: center,
            left_right: center,
            axes_dirty: false,
            hat_x: DPAD_RELEASED,
            hat_y: DPAD_RELEASED,
        }
    }

    /// Current stick position as a normalized sample.
    #[must_use]
    pub fn sample(&self) -> AxisSample {
        AxisSample::new(
            self.range.normalize(self.forward_backward),
            self.range.normalize(self.left_right),
        )
    }

    /// Processes a single evdev input event.
    ///
    /// Returns an action when the event completes one: a `SYN_REPORT` after
    /// stick movement, or any d-pad press/release.
    pub fn process_event(&mut self, event: &InputEvent) -> Option<InputAction> {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            InputEventKind::Key(key) => self.process_key_event(key, event.value()),
            InputEventKind::Synchronization(Synchronization::SYN_REPORT) => {
                if self.axes_dirty {
                    self.axes_dirty = false;
                    Some(InputAction::Axes(self.sample()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) -> Option<InputAction> {
        match axis {
            AbsoluteAxisType::ABS_Y => {
                self.forward_backward = value;
                self.axes_dirty = true;
                None
            }
            AbsoluteAxisType::ABS_RX => {
                self.left_right = value;
                self.axes_dirty = true;
                None
            }
            AbsoluteAxisType::ABS_HAT0X => {
                let previous = std::mem::replace(&mut self.hat_x, value);
                hat_action(previous, value, DpadDirection::Left, DpadDirection::Right)
            }
            AbsoluteAxisType::ABS_HAT0Y => {
                let previous = std::mem::replace(&mut self.hat_y, value);
                hat_action(previous, value, DpadDirection::Up, DpadDirection::Down)
            }
            _ => None,
        }
    }

    fn process_key_event(&mut self, key: Key, value: i32) -> Option<InputAction> {
        let direction = match key {
            Key::BTN_DPAD_UP => DpadDirection::Up,
            Key::BTN_DPAD_DOWN => DpadDirection::Down,
            Key::BTN_DPAD_LEFT => DpadDirection::Left,
            Key::BTN_DPAD_RIGHT => DpadDirection::Right,
            _ => return None,
        };
        // 1 = press, 2 = autorepeat, 0 = release
        Some(InputAction::Dpad {
            direction,
            pressed: value != 0,
        })
    }

    /// Resets to centered sticks and a released d-pad.
    ///
    /// Used when the controller goes away.
    pub fn reset(&mut self) {
        *self = Self::with_range(self.range);
    }
}

/// Translates a hat axis transition into a press or release.
fn hat_action(
    previous: i32,
    value: i32,
    negative: DpadDirection,
    positive: DpadDirection,
) -> Option<InputAction> {
    let direction_of = |v: i32| match v.signum() {
        DPAD_NEGATIVE => Some(negative),
        DPAD_POSITIVE => Some(positive),
        _ => None,
    };

    match direction_of(value) {
        Some(direction) if value.signum() != previous.signum() => Some(InputAction::Dpad {
            direction,
            pressed: true,
        }),
        Some(_) => None,
        None => direction_of(previous).map(|direction| InputAction::Dpad {
            direction,
            pressed: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::calibration::Deadzone;
    use crate::controller::command_mapper::arbitrate;
    use crate::protocol::Command;
    use evdev::EventType;

    /// Helper to create an axis event for testing.
    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    /// Helper to create a key event for testing.
    fn make_key_event(key: Key, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), value)
    }

    fn make_syn_event() -> InputEvent {
        InputEvent::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0)
    }

    fn press(direction: DpadDirection) -> Option<InputAction> {
        Some(InputAction::Dpad { direction, pressed: true })
    }

    fn release(direction: DpadDirection) -> Option<InputAction> {
        Some(InputAction::Dpad { direction, pressed: false })
    }

    // ==================== AxisSample Tests ====================

    #[test]
    fn test_axis_sample_default_is_centered() {
        assert_eq!(AxisSample::default(), AxisSample::new(0.0, 0.0));
    }

    #[test]
    fn test_dpad_directions() {
        assert_eq!(DpadDirection::Up.direction(), Direction::Forward);
        assert_eq!(DpadDirection::Down.direction(), Direction::Backward);
        assert_eq!(DpadDirection::Left.direction(), Direction::Left);
        assert_eq!(DpadDirection::Right.direction(), Direction::Right);
    }

    // ==================== EventMapper Tests ====================

    #[test]
    fn test_event_mapper_starts_centered() {
        let mapper = EventMapper::new();
        let sample = mapper.sample();
        assert!(sample.forward_backward.abs() < 0.01);
        assert!(sample.left_right.abs() < 0.01);
    }

    #[test]
    fn test_axis_events_wait_for_syn_report() {
        let mut mapper = EventMapper::new();

        assert_eq!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 0)), None);
        assert_eq!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RX, 255)), None);

        match mapper.process_event(&make_syn_event()) {
            Some(InputAction::Axes(sample)) => {
                assert_eq!(sample.forward_backward, -1.0);
                assert_eq!(sample.left_right, 1.0);
            }
            other => panic!("Expected axis sample, got {:?}", other),
        }
    }

    #[test]
    fn test_syn_without_axis_change_is_ignored() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.process_event(&make_syn_event()), None);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 10));
        assert!(mapper.process_event(&make_syn_event()).is_some());
        // Already reported
        assert_eq!(mapper.process_event(&make_syn_event()), None);
    }

    #[test]
    fn test_untracked_axes_are_ignored() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 0)), None);
        assert_eq!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RZ, 0)), None);
        assert_eq!(mapper.process_event(&make_syn_event()), None);
    }

    #[test]
    fn test_right_stick_x_drives_left_right() {
        let deadzone = Deadzone::default();
        let mut mapper = EventMapper::new();

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RX, 255));
        let Some(InputAction::Axes(sample)) = mapper.process_event(&make_syn_event()) else {
            panic!("Expected axis sample");
        };
        assert_eq!(arbitrate(&sample, &deadzone), Command::new(Direction::Right, 255));

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RX, 0));
        let Some(InputAction::Axes(sample)) = mapper.process_event(&make_syn_event()) else {
            panic!("Expected axis sample");
        };
        assert_eq!(arbitrate(&sample, &deadzone), Command::new(Direction::Left, 255));
    }

    #[test]
    fn test_trigger_does_not_steer() {
        let mut mapper = EventMapper::new();

        // L2 pressed fully, then released to its resting value
        for value in [255, 0] {
            assert_eq!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Z, value)), None);
            assert_eq!(mapper.process_event(&make_syn_event()), None);
        }

        // A later stick frame still sees a centered left/right axis
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 128));
        let Some(InputAction::Axes(sample)) = mapper.process_event(&make_syn_event()) else {
            panic!("Expected axis sample");
        };
        assert_eq!(arbitrate(&sample, &Deadzone::default()), Command::stop());
    }

    #[test]
    fn test_custom_range() {
        let mut mapper = EventMapper::with_range(AxisRange::new(-32768, 32767).unwrap());
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, -32768));
        match mapper.process_event(&make_syn_event()) {
            Some(InputAction::Axes(sample)) => {
                assert_eq!(sample.forward_backward, -1.0);
                assert!(sample.left_right.abs() < 0.01);
            }
            other => panic!("Expected axis sample, got {:?}", other),
        }
    }

    #[test]
    fn test_hat_press_and_release() {
        let mut mapper = EventMapper::new();

        let up = make_axis_event(AbsoluteAxisType::ABS_HAT0Y, DPAD_NEGATIVE);
        assert_eq!(mapper.process_event(&up), press(DpadDirection::Up));

        let center = make_axis_event(AbsoluteAxisType::ABS_HAT0Y, DPAD_RELEASED);
        assert_eq!(mapper.process_event(&center), release(DpadDirection::Up));

        let right = make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_POSITIVE);
        assert_eq!(mapper.process_event(&right), press(DpadDirection::Right));

        let center = make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_RELEASED);
        assert_eq!(mapper.process_event(&center), release(DpadDirection::Right));
    }

    #[test]
    fn test_hat_down_and_left() {
        let mut mapper = EventMapper::new();
        assert_eq!(
            mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, DPAD_POSITIVE)),
            press(DpadDirection::Down)
        );
        assert_eq!(
            mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_NEGATIVE)),
            press(DpadDirection::Left)
        );
    }

    #[test]
    fn test_hat_release_without_press_is_ignored() {
        let mut mapper = EventMapper::new();
        let center = make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_RELEASED);
        assert_eq!(mapper.process_event(&center), None);
    }

    #[test]
    fn test_hat_repeat_value_is_ignored() {
        let mut mapper = EventMapper::new();
        let left = make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_NEGATIVE);
        assert!(mapper.process_event(&left).is_some());
        assert_eq!(mapper.process_event(&left), None);
    }

    #[test]
    fn test_hat_direct_reversal_presses_new_side() {
        let mut mapper = EventMapper::new();
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_NEGATIVE));
        assert_eq!(
            mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_POSITIVE)),
            press(DpadDirection::Right)
        );
    }

    #[test]
    fn test_dpad_keys() {
        let mut mapper = EventMapper::new();
        let cases = [
            (Key::BTN_DPAD_UP, DpadDirection::Up),
            (Key::BTN_DPAD_DOWN, DpadDirection::Down),
            (Key::BTN_DPAD_LEFT, DpadDirection::Left),
            (Key::BTN_DPAD_RIGHT, DpadDirection::Right),
        ];
        for (key, direction) in cases {
            assert_eq!(mapper.process_event(&make_key_event(key, 1)), press(direction));
            assert_eq!(mapper.process_event(&make_key_event(key, 2)), press(direction));
            assert_eq!(mapper.process_event(&make_key_event(key, 0)), release(direction));
        }
    }

    #[test]
    fn test_other_keys_are_ignored() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.process_event(&make_key_event(Key::BTN_SOUTH, 1)), None);
        assert_eq!(mapper.process_event(&make_key_event(Key::BTN_TL, 1)), None);
    }

    #[test]
    fn test_reset() {
        let mut mapper = EventMapper::new();
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 0));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_NEGATIVE));

        mapper.reset();

        assert!(mapper.sample().forward_backward.abs() < 0.01);
        assert_eq!(mapper.process_event(&make_syn_event()), None);
        // Hat state cleared, so centering is not a release
        let center = make_axis_event(AbsoluteAxisType::ABS_HAT0X, DPAD_RELEASED);
        assert_eq!(mapper.process_event(&center), None);
    }
}
