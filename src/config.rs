//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! This is the static configuration of the process. The mutable, persisted
//! state (commander mode and actuator targets) lives in [`crate::store`];
//! the `default_*` actuator keys here only seed that record when it does not
//! exist yet.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::control::clamp::{InputClamp, MAX_DEADZONE};
use crate::control::loops::LoopSettings;
use crate::error::{DroneDropError, Result};
use crate::flight::RetryPolicy;
use crate::store::PersistedConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub platform: PlatformConfig,
    pub actuator: ActuatorConfig,
    pub control: ControlConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote command server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Flying platform configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_address")]
    pub address: String,

    #[serde(default = "default_disconnect_attempts")]
    pub disconnect_attempts: u32,

    #[serde(default = "default_disconnect_backoff_ms")]
    pub disconnect_backoff_ms: u64,

    #[serde(default = "default_disconnect_backoff_max_ms")]
    pub disconnect_backoff_max_ms: u64,
}

/// Payload actuator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ActuatorConfig {
    #[serde(default = "default_actuator_port")]
    pub port: String,

    #[serde(default = "default_actuator_baud_rate")]
    pub baud_rate: u32,

    #[serde(default)]
    pub channel: u8,

    #[serde(default = "default_grab")]
    pub default_grab: u8,

    #[serde(default = "default_load")]
    pub default_load: u8,

    /// No built-in default: deployed units disagree (135 vs 153), so the
    /// value has to be chosen per airframe.
    pub default_drop: u8,
}

/// Control loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_deadzone")]
    pub deadzone: f64,

    #[serde(default = "default_axis_threshold")]
    pub translation_threshold: f64,

    #[serde(default = "default_axis_threshold")]
    pub vertical_threshold: f64,

    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold: f64,
}

/// Persisted state configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; empty logs to stdout only.
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_bind() -> String { "0.0.0.0:8080".to_string() }

fn default_platform_address() -> String { "192.168.1.1:5556".to_string() }
fn default_disconnect_attempts() -> u32 { 20 }
fn default_disconnect_backoff_ms() -> u64 { 10 }
fn default_disconnect_backoff_max_ms() -> u64 { 500 }

fn default_actuator_port() -> String { "/dev/ttyACM0".to_string() }
fn default_actuator_baud_rate() -> u32 { 9600 }
fn default_grab() -> u8 { crate::actuator::DEFAULT_GRAB }
fn default_load() -> u8 { crate::actuator::DEFAULT_LOAD }

fn default_tick_ms() -> u64 { 10 }
fn default_deadzone() -> f64 { 0.1 }
fn default_axis_threshold() -> f64 { 0.1 }
fn default_rotation_threshold() -> f64 { 0.3 }

fn default_storage_path() -> String { "/data/video/dronedrop.json".to_string() }

fn invalid(message: impl std::fmt::Display) -> DroneDropError {
    DroneDropError::Config(toml::de::Error::custom(message))
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
    /// - TOML parsing fails (including a missing `actuator.default_drop`)
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dronedrop::config::Config;
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
    fn validate(&self) -> Result<()> {
        if self.server.bind.is_empty() {
            return Err(invalid("server bind address cannot be empty"));
        }

        if self.platform.address.is_empty() {
            return Err(invalid("platform address cannot be empty"));
        }

        if self.platform.disconnect_attempts == 0 || self.platform.disconnect_attempts > 1000 {
            return Err(invalid("disconnect_attempts must be between 1 and 1000"));
        }

        if self.platform.disconnect_backoff_ms == 0 || self.platform.disconnect_backoff_ms > 10000 {
            return Err(invalid("disconnect_backoff_ms must be between 1 and 10000"));
        }

        if self.platform.disconnect_backoff_max_ms < self.platform.disconnect_backoff_ms {
            return Err(invalid(
                "disconnect_backoff_max_ms must not be less than disconnect_backoff_ms",
            ));
        }

        if self.actuator.port.is_empty() {
            return Err(invalid("actuator port cannot be empty"));
        }

        if ![2400, 9600, 38400, 57600, 115200].contains(&self.actuator.baud_rate) {
            return Err(invalid(
                "actuator baud_rate must be one of: 2400, 9600, 38400, 57600, 115200",
            ));
        }

        // 0xFF is the Mini SSC sync byte
        if self.actuator.channel == u8::MAX {
            return Err(invalid("actuator channel must be between 0 and 254"));
        }

        if self.control.tick_ms == 0 || self.control.tick_ms > 1000 {
            return Err(invalid("tick_ms must be between 1 and 1000"));
        }

        if !(0.0..=MAX_DEADZONE).contains(&self.control.deadzone) {
            return Err(invalid(format!("deadzone must be between 0.0 and {}", MAX_DEADZONE)));
        }

        for (name, value) in [
            ("translation_threshold", self.control.translation_threshold),
            ("vertical_threshold", self.control.vertical_threshold),
            ("rotation_threshold", self.control.rotation_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{} must be between 0.0 and 1.0", name)));
            }
        }

        if self.storage.path.is_empty() {
            return Err(invalid("storage path cannot be empty"));
        }

        Ok(())
    }

    /// Seed record for a missing persisted state file.
    pub fn persisted_defaults(&self) -> PersistedConfig {
        PersistedConfig {
            commander: true,
            grab: self.actuator.default_grab,
            drop: self.actuator.default_drop,
            load: self.actuator.default_load,
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            tick: Duration::from_millis(self.control.tick_ms),
            clamp: InputClamp::new(self.control.deadzone),
            translation_threshold: self.control.translation_threshold,
            vertical_threshold: self.control.vertical_threshold,
            rotation_threshold: self.control.rotation_threshold,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.platform.disconnect_attempts,
            initial_backoff: Duration::from_millis(self.platform.disconnect_backoff_ms),
            max_backoff: Duration::from_millis(self.platform.disconnect_backoff_max_ms),
        }
    }
}
