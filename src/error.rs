/*
 * This file is part of Thermofan.
 *
 * Copyright (C) 2025 Thermofan contributors
 *
 * Thermofan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Thermofan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Thermofan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Unified error handling for Thermofan
//!
//! Sensor faults never leave [`crate::sensor::Sensor`]; missing readings are
//! handled by skipping a fan's tick; actuator faults are fatal to the control
//! loop; configuration faults stop the process before any fan is touched.

use std::io;
use std::path::PathBuf;

/// Result type alias using ThermofanError
pub type Result<T> = std::result::Result<T, ThermofanError>;

#[derive(thiserror::Error, Debug)]
pub enum ThermofanError {
    // ============================================================================
    // Sensor Errors (transient, recovered inside Sensor::update)
    // ============================================================================
    #[error("Failed to read sensor {path}: {source}")]
    SensorRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse sensor {path}: {reason}")]
    SensorParse {
        path: PathBuf,
        reason: String,
    },

    /// A driver's sensor has no current value; the fan skips this tick
    #[error("Sensor {sensor} has no current value")]
    MissingReading {
        sensor: String,
    },

    // ============================================================================
    // Actuator Errors (fatal)
    // ============================================================================
    #[error("Failed to write PWM value {value} to {path}: {source}")]
    PwmWrite {
        path: PathBuf,
        value: u8,
        source: io::Error,
    },

    #[error("Failed to set fan to manual mode via {path}: {source}")]
    EnableWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Configuration file too large: {path} ({size} bytes, max {max_size} bytes)")]
    ConfigTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ThermofanError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-value config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for faults that must stop the control loop
    pub fn is_actuator_fault(&self) -> bool {
        matches!(self, Self::PwmWrite { .. } | Self::EnableWrite { .. })
    }
}
