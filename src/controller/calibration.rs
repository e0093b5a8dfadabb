//! # Calibration Module
//!
//! Normalizes raw stick readings and applies the deadzone.
//!
//! ## Normalization
//!
//! evdev reports stick positions as integers within a device-specific range
//! (0-255 for Sony controllers). [`AxisRange::normalize`] maps that range
//! linearly onto -1.0..=1.0.
//!
//! ## Deadzone
//!
//! A reading whose magnitude is at or below the deadzone counts as exactly
//! zero. Readings outside the deadzone pass through unchanged; there is no
//! rescaling of the remaining range.
//!
//! ## Usage
//!
//! ```
//! use rc_car_bridge::controller::calibration::{AxisRange, Deadzone};
//!
//! let range = AxisRange::default();
//! let deadzone = Deadzone::default();
//!
//! assert_eq!(range.normalize(0), -1.0);
//! assert_eq!(deadzone.apply(0.15), 0.0);
//! assert_eq!(deadzone.apply(-0.5), -0.5);
//! ```

/// Default deadzone threshold (absolute value)
pub const DEFAULT_DEADZONE: f32 = 0.2;

/// Raw axis range of Sony controllers under evdev
pub const DEFAULT_AXIS_MIN: i32 = 0;
/// Raw axis range of Sony controllers under evdev
pub const DEFAULT_AXIS_MAX: i32 = 255;

/// Maps raw evdev axis values to -1.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    min: i32,
    max: i32,
}

impl Default for AxisRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_AXIS_MIN,
            max: DEFAULT_AXIS_MAX,
        }
    }
}

impl AxisRange {
    /// Creates a range. Returns `None` unless `min < max`.
    #[must_use]
    pub fn new(min: i32, max: i32) -> Option<Self> {
        (min < max).then_some(Self { min, max })
    }

    #[must_use]
    pub fn min(&self) -> i32 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Normalizes a raw reading. Out-of-range readings are clamped.
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_car_bridge::controller::calibration::AxisRange;
    ///
    /// let range = AxisRange::new(-32768, 32767).unwrap();
    /// assert_eq!(range.normalize(-32768), -1.0);
    /// assert_eq!(range.normalize(32767), 1.0);
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: i32) -> f32 {
        let span = (self.max as f64) - (self.min as f64);
        let offset = (raw as f64) - (self.min as f64);
        ((offset / span) * 2.0 - 1.0).clamp(-1.0, 1.0) as f32
    }
}

/// Zeroes readings near center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzone {
    threshold: f32,
}

impl Default for Deadzone {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DEADZONE,
        }
    }
}

impl Deadzone {
    /// Creates a deadzone. The threshold is clamped to 0.0..=1.0.
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns true if `value` lies outside the deadzone.
    #[inline]
    #[must_use]
    pub fn exceeds(&self, value: f32) -> bool {
        value.abs() > self.threshold
    }

    /// Returns `value` unchanged outside the deadzone, 0.0 inside it.
    #[inline]
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        if self.exceeds(value) {
            value
        } else {
            0.0
        }
    }
}
