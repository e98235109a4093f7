//! Standalone configuration loading.
//!
//! A [`StandaloneConfig`] describes one control loop: its segment id,
//! tick frequency, DOF count, history depth, execution mode and the
//! bounds handed to the sink driver. Loadable from TOML:
//!
//! ```toml
//! segment_id = "arm_left"
//! frequency_hz = 1000.0
//! dofs = 2
//! history_capacity = 4096
//! bursting = false
//!
//! [driver_bounds]
//! min = 0.0
//! max = 100.0
//! ```

use crate::consts::{DEFAULT_HISTORY_CAPACITY, MAX_DOFS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Value range the sink driver accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriverBounds {
    /// Lowest accepted output value.
    pub min: f64,
    /// Highest accepted output value.
    pub max: f64,
}

impl Default for DriverBounds {
    fn default() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }
}

/// Configuration for one standalone control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandaloneConfig {
    /// Shared segment id; front ends attach with the same id.
    pub segment_id: String,
    /// Back-end tick frequency in Hz (clocked mode).
    pub frequency_hz: f64,
    /// Number of degrees of freedom.
    pub dofs: usize,
    /// Observation history depth in ticks.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Run as fast as bursts are requested instead of wall-clock paced.
    #[serde(default)]
    pub bursting: bool,
    /// Output range enforced by the sink driver.
    #[serde(default)]
    pub driver_bounds: DriverBounds,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl StandaloneConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate semantic constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_id.is_empty() {
            return Err(ConfigError::Validation("segment_id is empty".into()));
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "frequency_hz must be positive, got {}",
                self.frequency_hz
            )));
        }
        if self.dofs == 0 || self.dofs > MAX_DOFS {
            return Err(ConfigError::Validation(format!(
                "dofs must be in 1..={MAX_DOFS}, got {}",
                self.dofs
            )));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Validation("history_capacity is zero".into()));
        }
        if self.driver_bounds.min > self.driver_bounds.max {
            return Err(ConfigError::Validation(format!(
                "driver bounds inverted: min {} > max {}",
                self.driver_bounds.min, self.driver_bounds.max
            )));
        }
        Ok(())
    }
}
