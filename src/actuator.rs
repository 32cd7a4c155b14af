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

//! PWM actuators
//!
//! # PWM Values
//!
//! Duty cycles range from 0 to 255:
//! - 0 = fan off (or minimum speed on some fans)
//! - 255 = full speed
//!
//! # Enable Modes
//!
//! Linux hwmon exposes `pwmN_enable` next to `pwmN`. Writing `1` selects
//! manual (software) control. Chips without that file are always manual.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::pwm::{enable, ENABLE_SUFFIX};
use crate::error::{Result, ThermofanError};

/// Result of asking an actuator to accept software control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualMode {
    /// The enable switch was written
    Enabled,
    /// No enable switch could be opened; the device is assumed to be manual already
    NotRequired,
}

/// Fan output accepting 8-bit duty cycles
#[cfg_attr(test, mockall::automock)]
pub trait Actuator {
    /// Stable name of the actuator, used in logs (the pwm path for sysfs)
    fn identity(&self) -> String;

    /// Switch the device into manual control
    fn enable_manual(&self) -> Result<ManualMode>;

    /// Command a duty cycle
    fn write_duty(&self, duty: u8) -> Result<()>;
}

/// sysfs `pwmN` file plus its `pwmN_enable` sibling
#[derive(Debug, Clone)]
pub struct FileActuator {
    pwm_path: PathBuf,
    enable_path: PathBuf,
}

impl FileActuator {
    pub fn new(pwm_path: impl Into<PathBuf>) -> Self {
        let pwm_path = pwm_path.into();
        let enable_path = enable_path_for(&pwm_path);
        Self { pwm_path, enable_path }
    }
}

/// `/sys/.../pwm2` -> `/sys/.../pwm2_enable`
pub fn enable_path_for(pwm_path: &Path) -> PathBuf {
    let mut name = pwm_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(ENABLE_SUFFIX);
    pwm_path.with_file_name(name)
}

impl Actuator for FileActuator {
    fn identity(&self) -> String {
        self.pwm_path.display().to_string()
    }

    fn enable_manual(&self) -> Result<ManualMode> {
        // Never create the switch: a missing file means the chip has no modes
        let mut file = match OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.enable_path)
        {
            Ok(file) => file,
            Err(e) => {
                debug!(
                    path = %self.enable_path.display(),
                    error = %e,
                    "Could not open enable file, assuming fan does not need enabling"
                );
                return Ok(ManualMode::NotRequired);
            }
        };

        file.write_all(enable::MANUAL.as_bytes())
            .map_err(|source| ThermofanError::EnableWrite {
                path: self.enable_path.clone(),
                source,
            })?;
        Ok(ManualMode::Enabled)
    }

    fn write_duty(&self, duty: u8) -> Result<()> {
        fs::write(&self.pwm_path, duty.to_string()).map_err(|source| ThermofanError::PwmWrite {
            path: self.pwm_path.clone(),
            value: duty,
            source,
        })
    }
}
