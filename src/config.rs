//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every key is optional; missing values take the
//! defaults below, so an empty file is a valid configuration.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::controller::calibration::{AxisRange, DEFAULT_AXIS_MAX, DEFAULT_AXIS_MIN};
use crate::error::{CarBridgeError, Result};
use crate::serial::device::{DeviceFilter, ARDUINO_UNO_PRODUCT_ID, ARDUINO_VENDOR_ID};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Explicit device path; empty selects a USB device automatically
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    #[serde(default = "default_product_id")]
    pub product_id: u16,

    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Explicit evdev node; empty scans `/dev/input`
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_axis_min")]
    pub axis_min: i32,

    #[serde(default = "default_axis_max")]
    pub axis_max: i32,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Diagnostic log configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; empty logs to stdout only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_vendor_id() -> u16 { ARDUINO_VENDOR_ID }
fn default_product_id() -> u16 { ARDUINO_UNO_PRODUCT_ID }
fn default_rescan_interval_ms() -> u64 { 1000 }

fn default_axis_min() -> i32 { DEFAULT_AXIS_MIN }
fn default_axis_max() -> i32 { DEFAULT_AXIS_MAX }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            rescan_interval_ms: default_rescan_interval_ms(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            axis_min: default_axis_min(),
            axis_max: default_axis_max(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl SerialConfig {
    /// Explicit port, if one is configured
    pub fn explicit_port(&self) -> Option<&str> {
        (!self.port.is_empty()).then_some(self.port.as_str())
    }

    /// Preferred-device filter for auto-selection
    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }
}

impl ControllerConfig {
    /// Explicit controller node, if one is configured
    pub fn explicit_device(&self) -> Option<&str> {
        (!self.device_path.is_empty()).then_some(self.device_path.as_str())
    }

    /// Raw stick range; falls back to the default range if invalid
    pub fn axis_range(&self) -> AxisRange {
        AxisRange::new(self.axis_min, self.axis_max).unwrap_or_default()
    }
}

impl LoggingConfig {
    /// Log file directory, if file logging is enabled
    pub fn file_dir(&self) -> Option<&str> {
        (!self.log_dir.is_empty()).then_some(self.log_dir.as_str())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_car_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Config` if parsing or validation fails
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.rescan_interval_ms == 0 || self.serial.rescan_interval_ms > 60000 {
            return Err(CarBridgeError::Config(
                toml::de::Error::custom("rescan_interval_ms must be between 1 and 60000")
            ));
        }

        if self.controller.axis_min >= self.controller.axis_max {
            return Err(CarBridgeError::Config(
                toml::de::Error::custom("axis_min must be less than axis_max")
            ));
        }

        // Validate telemetry configuration
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(CarBridgeError::Config(
                toml::de::Error::custom("telemetry log_dir cannot be empty when enabled")
            ));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(CarBridgeError::Config(
                toml::de::Error::custom("max_records_per_file must be greater than 0")
            ));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(CarBridgeError::Config(
                toml::de::Error::custom("max_files_to_keep must be greater than 0")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config {
            serial: SerialConfig {
                port: String::new(),
                vendor_id: default_vendor_id(),
                product_id: default_product_id(),
                rescan_interval_ms: default_rescan_interval_ms(),
            },
            controller: ControllerConfig {
                device_path: String::new(),
                axis_min: default_axis_min(),
                axis_max: default_axis_max(),
            },
            telemetry: TelemetryConfig {
                enabled: default_telemetry_enabled(),
                log_dir: default_log_dir(),
                max_records_per_file: default_max_records_per_file(),
                max_files_to_keep: default_max_files_to_keep(),
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.serial.vendor_id, 0x2341);
        assert_eq!(config.serial.product_id, 0x0043);
        assert_eq!(config.serial.rescan_interval_ms, 1000);
        assert!(config.serial.explicit_port().is_none());
        assert!(config.controller.explicit_device().is_none());
        assert!(config.telemetry.enabled);
        assert!(config.logging.file_dir().is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB0"
vendor_id = 0x1a86
product_id = 0x7523

[controller]
device_path = "/dev/input/event5"
axis_min = -32768
axis_max = 32767

[telemetry]
enabled = false

[logging]
log_dir = "/tmp/rc-car-bridge"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.explicit_port(), Some("/dev/ttyUSB0"));
        assert_eq!(
            config.serial.device_filter(),
            DeviceFilter { vendor_id: 0x1a86, product_id: 0x7523 }
        );
        assert_eq!(config.controller.explicit_device(), Some("/dev/input/event5"));
        assert_eq!(config.controller.axis_range().min(), -32768);
        assert_eq!(config.controller.axis_range().max(), 32767);
        assert!(!config.telemetry.enabled);
        assert_eq!(config.logging.file_dir(), Some("/tmp/rc-car-bridge"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/rc-car-bridge.toml");
        assert!(matches!(result, Err(CarBridgeError::Io(_))));
    }

    #[test]
    fn test_parse_rejects_bad_type() {
        let result = Config::parse("[serial]\nrescan_interval_ms = \"soon\"\n");
        assert!(matches!(result, Err(CarBridgeError::Config(_))));
    }

    #[test]
    fn test_parse_runs_validation() {
        let result = Config::parse("[controller]\naxis_min = 10\naxis_max = 10\n");
        assert!(matches!(result, Err(CarBridgeError::Config(_))));
    }

    #[test]
    fn test_rescan_interval_zero() {
        let mut config = create_valid_config();
        config.serial.rescan_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rescan_interval_too_high() {
        let mut config = create_valid_config();
        config.serial.rescan_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axis_min_equals_max() {
        let mut config = create_valid_config();
        config.controller.axis_min = 128;
        config.controller.axis_max = 128;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axis_min_greater_than_max() {
        let mut config = create_valid_config();
        config.controller.axis_min = 255;
        config.controller.axis_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axis_range_falls_back_when_invalid() {
        let mut config = create_valid_config();
        config.controller.axis_min = 5;
        config.controller.axis_max = 1;
        assert_eq!(config.controller.axis_range(), AxisRange::default());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_vendor_id(), 0x2341);
        assert_eq!(default_product_id(), 0x0043);
        assert_eq!(default_rescan_interval_ms(), 1000);
        assert_eq!(default_axis_min(), 0);
        assert_eq!(default_axis_max(), 255);
        assert!(default_telemetry_enabled());
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
    }
}
