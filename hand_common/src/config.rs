//! Hand configuration loading and validation.
//!
//! Configuration is read once at startup from a single TOML file and is
//! immutable afterwards. Optional fields fall back to the defaults in
//! [`crate::consts`]; unknown fields are rejected.
//!
//! # TOML Example
//!
//! ```toml
//! [hand]
//! robot_name = "allegro_hand_right"
//! which_hand = "right"
//! serial = "SAH030C033R"
//! version = 4.0
//!
//! [control]
//! cycle_time_us = 1000
//! overrun_policy = "skip"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::consts::{
    BUS_TIMEOUT_US_DEFAULT, CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN,
    DEFAULT_JOINT_NAMES, MAX_CONSECUTIVE_BUS_ERRORS_DEFAULT, MAX_JOINTS,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read {path}: {reason}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O error message.
        reason: String,
    },

    /// TOML parsing failed (includes missing required sections).
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Which hand the hardware is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    /// Left hand.
    Left,
    /// Right hand.
    Right,
}

/// Behaviour of the scheduler when a cycle runs past its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Drop missed ticks and realign to the next period boundary.
    #[default]
    Skip,
    /// Run every missed tick immediately until the schedule catches up.
    BackToBack,
}

/// Hand identity, as printed on the hardware label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandInfo {
    /// Robot model name (e.g. `allegro_hand_right`).
    pub robot_name: String,
    /// Left or right hand.
    pub which_hand: Handedness,
    /// Vendor name.
    #[serde(default)]
    pub manufacturer: String,
    /// Vendor URL.
    #[serde(default)]
    pub origin: String,
    /// Unit serial number.
    #[serde(default)]
    pub serial: String,
    /// Hardware revision.
    #[serde(default)]
    pub version: f64,
}

/// Control loop parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    /// Control period in microseconds (default: 1000 = 1 ms).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Joint labels in bus order (default: the 16-joint table).
    #[serde(default = "default_joint_names")]
    pub joint_names: Vec<String>,

    /// Expected joint count. When set it must equal `joint_names.len()`.
    #[serde(default)]
    pub dof: Option<usize>,

    /// Deadline for a single bus operation [µs].
    #[serde(default = "default_bus_timeout_us")]
    pub bus_timeout_us: u32,

    /// Consecutive failing cycles tolerated before the loop aborts.
    #[serde(default = "default_max_bus_errors")]
    pub max_consecutive_bus_errors: u32,

    /// Scheduler overrun policy.
    #[serde(default)]
    pub overrun_policy: OverrunPolicy,
}

fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US
}
fn default_joint_names() -> Vec<String> {
    DEFAULT_JOINT_NAMES.iter().map(|s| s.to_string()).collect()
}
fn default_bus_timeout_us() -> u32 {
    BUS_TIMEOUT_US_DEFAULT
}
fn default_max_bus_errors() -> u32 {
    MAX_CONSECUTIVE_BUS_ERRORS_DEFAULT
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: default_cycle_time_us(),
            joint_names: default_joint_names(),
            dof: None,
            bus_timeout_us: default_bus_timeout_us(),
            max_consecutive_bus_errors: default_max_bus_errors(),
            overrun_policy: OverrunPolicy::default(),
        }
    }
}

impl ControlConfig {
    /// Number of joints driven by the loop.
    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }

    /// Control period as a [`Duration`].
    #[inline]
    pub fn cycle_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.cycle_time_us))
    }

    /// Bus operation deadline as a [`Duration`].
    #[inline]
    pub fn bus_timeout(&self) -> Duration {
        Duration::from_micros(u64::from(self.bus_timeout_us))
    }

    /// Validate parameter bounds and the joint table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_time_us < CYCLE_TIME_US_MIN || self.cycle_time_us > CYCLE_TIME_US_MAX {
            return Err(ConfigError::ValidationError(format!(
                "cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            )));
        }

        let n = self.joint_names.len();
        if n == 0 || n > MAX_JOINTS {
            return Err(ConfigError::ValidationError(format!(
                "joint count {n} out of range [1, {MAX_JOINTS}]"
            )));
        }
        if let Some(dof) = self.dof {
            if dof != n {
                return Err(ConfigError::ValidationError(format!(
                    "joint count mismatch: dof = {dof} but {n} joint names given"
                )));
            }
        }

        let mut seen = HashSet::with_capacity(n);
        for name in &self.joint_names {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "joint names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate joint name '{name}'"
                )));
            }
        }

        if self.bus_timeout_us == 0 || self.bus_timeout_us >= self.cycle_time_us.saturating_mul(10) {
            return Err(ConfigError::ValidationError(format!(
                "bus_timeout_us {} out of range [1, {})",
                self.bus_timeout_us,
                self.cycle_time_us.saturating_mul(10)
            )));
        }
        if self.max_consecutive_bus_errors == 0 {
            return Err(ConfigError::ValidationError(
                "max_consecutive_bus_errors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete hand configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandConfig {
    /// Hardware identity (required).
    pub hand: HandInfo,
    /// Loop parameters (optional section).
    #[serde(default)]
    pub control: ControlConfig,
}

impl HandConfig {
    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(
            path = %path.display(),
            robot = %config.hand.robot_name,
            joints = config.control.joint_count(),
            "hand configuration loaded"
        );
        Ok(config)
    }

    /// Default configuration for a 16-DOF hand with the given identity.
    pub fn with_identity(robot_name: &str, which_hand: Handedness) -> Self {
        Self {
            hand: HandInfo {
                robot_name: robot_name.to_string(),
                which_hand,
                manufacturer: String::new(),
                origin: String::new(),
                serial: String::new(),
                version: 0.0,
            },
            control: ControlConfig::default(),
        }
    }

    /// Validate hand identity and control parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hand.robot_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "hand.robot_name must not be empty".to_string(),
            ));
        }
        self.control.validate()
    }
}
