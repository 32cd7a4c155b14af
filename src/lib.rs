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

//! Thermofan - closed-loop fan control for Linux hwmon
//!
//! Temperatures are sampled from sensor files, mapped to a coefficient in
//! `[0, 1]` between per-fan thresholds, combined per fan and written as a
//! PWM duty cycle every poll interval. Fans are forced to full speed before
//! control starts and again when it stops.
//!
//! # Module Structure
//!
//! - `sensor` - sensor providers and last-value tracking
//! - `driver` - threshold mapping of one sensor
//! - `fan` - accumulation and duty computation, reset protocol
//! - `actuator` - sysfs PWM output
//! - `control` - cancellable polling loop
//! - `config` / `topology` - topology file and its construction

pub mod actuator;
pub mod config;
pub mod constants;
pub mod control;
pub mod driver;
pub mod error;
pub mod fan;
pub mod logger;
pub mod sensor;
pub mod topology;

#[cfg(test)]
pub mod test_utils;

pub use actuator::{Actuator, FileActuator, ManualMode};
pub use config::{config_location, load_config, ConfigLocation, TopologyConfig};
pub use control::{reset_fans, CancelToken, Controller, ExitReason, Shutdown};
pub use driver::Driver;
pub use error::{Result, ThermofanError};
pub use fan::{Accumulation, Fan, UpdateOutcome};
pub use sensor::{FileSource, Sensor, SensorSource};
pub use topology::Topology;
