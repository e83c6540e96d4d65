//! Stabilizer configuration.
//!
//! All distances are in source-frame pixels; velocities are in pixels per
//! stabilizer tick (one keyframe sample).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tuning for the hysteretic camera stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// Fraction of the remaining offset requested as velocity each tick, in (0, 1]
    pub smoothing_factor: f64,
    /// Maximum camera speed in pixels per tick
    pub max_velocity: f64,
    /// Offset above which a locked camera starts moving
    pub lock_threshold: f64,
    /// Offset below which the camera ignores the target
    pub deadzone: f64,
    /// Low-pass factor applied to velocity changes, in (0, 1]
    pub acceleration_smoothing: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self::heavy_tripod()
    }
}

impl StabilizerConfig {
    /// Heavy, slow mount: long deadzone and low top speed.
    pub fn heavy_tripod() -> Self {
        Self {
            smoothing_factor: 0.12,
            max_velocity: 25.0,
            lock_threshold: 60.0,
            deadzone: 25.0,
            acceleration_smoothing: 0.3,
        }
    }

    /// Faster mount for subjects that move around the frame.
    pub fn responsive() -> Self {
        Self {
            smoothing_factor: 0.25,
            max_velocity: 60.0,
            lock_threshold: 40.0,
            deadzone: 12.0,
            acceleration_smoothing: 0.6,
        }
    }

    /// Check every field is inside its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("smoothing_factor", self.smoothing_factor)?;
        check_unit_interval("acceleration_smoothing", self.acceleration_smoothing)?;

        if !(self.max_velocity.is_finite() && self.max_velocity > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "max_velocity",
                value: self.max_velocity,
                expected: "> 0",
            });
        }
        if !(self.lock_threshold.is_finite() && self.lock_threshold > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "lock_threshold",
                value: self.lock_threshold,
                expected: "> 0",
            });
        }
        if !(self.deadzone.is_finite() && self.deadzone >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "deadzone",
                value: self.deadzone,
                expected: ">= 0",
            });
        }
        if self.deadzone > self.lock_threshold {
            return Err(ConfigError::Inconsistent(format!(
                "deadzone ({}) must not exceed lock_threshold ({})",
                self.deadzone, self.lock_threshold
            )));
        }

        Ok(())
    }
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "in (0, 1]",
        })
    }
}

/// Invalid configuration value.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}
