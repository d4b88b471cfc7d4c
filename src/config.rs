//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{LinkError, Result};
use crate::msp::protocol::RC_MID;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path, or "auto" to probe the default paths
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Background loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Transmit scheduler phase period
    #[serde(default = "default_tick_interval_us")]
    pub tick_interval_us: u64,

    /// Receive loop sleep between polls
    #[serde(default = "default_rx_poll_interval_us")]
    pub rx_poll_interval_us: u64,
}

/// Offsets applied by the named directional inputs
#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_roll_step")]
    pub roll_step: i16,

    #[serde(default = "default_pitch_step")]
    pub pitch_step: i16,

    #[serde(default = "default_yaw_step")]
    pub yaw_step: i16,
}

/// Telemetry reporting configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to `<directory>/msp-link.log` instead of stdout
    #[serde(default)]
    pub directory: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "auto".to_string() }
fn default_baud_rate() -> u32 { 115_200 }
fn default_timeout_ms() -> u64 { 100 }

fn default_tick_interval_us() -> u64 { 6_666 }
fn default_rx_poll_interval_us() -> u64 { 1_000 }

fn default_roll_step() -> i16 { 12 }
fn default_pitch_step() -> i16 { 12 }
fn default_yaw_step() -> i16 { 25 }

fn default_log_interval_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tick_interval_us: default_tick_interval_us(),
            rx_poll_interval_us: default_rx_poll_interval_us(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            roll_step: default_roll_step(),
            pitch_step: default_pitch_step(),
            yaw_step: default_yaw_step(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_interval_ms: default_log_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LinkConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(self.tick_interval_us)
    }

    pub fn rx_poll_interval(&self) -> Duration {
        Duration::from_micros(self.rx_poll_interval_us)
    }
}

impl TelemetryConfig {
    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
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
    /// use msp_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
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
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800",
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.link.tick_interval_us < 1000 || self.link.tick_interval_us > 100_000 {
            return Err(invalid("tick_interval_us must be between 1000 and 100000"));
        }

        if self.link.rx_poll_interval_us == 0 || self.link.rx_poll_interval_us > 10_000 {
            return Err(invalid("rx_poll_interval_us must be between 1 and 10000"));
        }

        // Steps are offsets from the channel midpoint
        for (name, value) in [
            ("roll_step", self.control.roll_step),
            ("pitch_step", self.control.pitch_step),
            ("yaw_step", self.control.yaw_step),
        ] {
            if !(0..=RC_MID).contains(&value) {
                return Err(invalid(format!("{} must be between 0 and {}", name, RC_MID)));
            }
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        if matches!(&self.logging.directory, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging directory cannot be empty when set"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> LinkError {
    LinkError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.port, "auto");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.link.tick_interval(), Duration::from_micros(6_666));
        assert_eq!(config.control.roll_step, 12);
        assert_eq!(config.control.yaw_step, 25);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.link.tick_interval_us, 6_666);
        assert_eq!(config.link.rx_poll_interval_us, 1_000);
        assert_eq!(config.telemetry.log_interval_ms, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml(
            r#"
            [serial]
            port = "/dev/ttyAMA0"

            [control]
            yaw_step = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.control.yaw_step, 40);
        assert_eq!(config.control.roll_step, 12);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB1"
baud_rate = 57600
timeout_ms = 50

[link]
tick_interval_us = 10000
rx_poll_interval_us = 500

[control]
roll_step = 10
pitch_step = 10
yaw_step = 20

[telemetry]
log_interval_ms = 250

[logging]
level = "debug"
directory = "./logs"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.serial.timeout(), Duration::from_millis(50));
        assert_eq!(config.link.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.link.rx_poll_interval(), Duration::from_micros(500));
        assert_eq!(config.control.pitch_step, 10);
        assert_eq!(config.telemetry.log_interval_ms, 250);
        assert_eq!(config.logging.directory.as_deref(), Some("./logs"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/msp-link.toml");
        assert!(matches!(result, Err(LinkError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[serial\nport = 3");
        assert!(matches!(result, Err(LinkError::Config(_))));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_zero() {
        let mut config = create_valid_config();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_too_high() {
        let mut config = create_valid_config();
        config.serial.timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_too_low() {
        let mut config = create_valid_config();
        config.link.tick_interval_us = 999;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_too_high() {
        let mut config = create_valid_config();
        config.link.tick_interval_us = 100_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rx_poll_interval_zero() {
        let mut config = create_valid_config();
        config.link.rx_poll_interval_us = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_roll_step() {
        let mut config = create_valid_config();
        config.control.roll_step = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaw_step_past_midpoint() {
        let mut config = create_valid_config();
        config.control.yaw_step = RC_MID + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_at_midpoint_is_valid() {
        let mut config = create_valid_config();
        config.control.pitch_step = RC_MID;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_interval_zero() {
        let mut config = create_valid_config();
        config.telemetry.log_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_level() {
        let mut config = create_valid_config();
        config.logging.level = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_directory() {
        let mut config = create_valid_config();
        config.logging.directory = Some(String::new());
        assert!(config.validate().is_err());
    }
}
