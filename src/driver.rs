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

//! Sensor-to-coefficient mapping
//!
//! A [`Driver`] observes one [`Sensor`] through a `Weak` reference and maps its
//! reading onto `[0.0, 1.0]` between a lower and an upper threshold.

use std::rc::{Rc, Weak};

use crate::error::{Result, ThermofanError};
use crate::sensor::Sensor;

#[derive(Debug, Clone)]
pub struct Driver {
    sensor: Weak<Sensor>,
    sensor_name: String,
    min: i32,
    max: i32,
}

impl Driver {
    /// Bind `sensor` to the `[min, max]` threshold pair.
    ///
    /// # Panics
    /// If `min >= max`. Thresholds are fixed at topology construction, so an
    /// inverted pair is a programming error.
    pub fn new(sensor: &Rc<Sensor>, min: i32, max: i32) -> Self {
        assert!(
            min < max,
            "driver thresholds for sensor {} must satisfy min < max (got {} >= {})",
            sensor.name(),
            min,
            max
        );
        Self {
            sensor: Rc::downgrade(sensor),
            sensor_name: sensor.name().to_string(),
            min,
            max,
        }
    }

    pub fn sensor_name(&self) -> &str {
        &self.sensor_name
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Urgency in `[0.0, 1.0]` for the sensor's current value.
    ///
    /// Fails with [`ThermofanError::MissingReading`] when the sensor has no
    /// current value or no longer exists.
    pub fn coefficient(&self) -> Result<f64> {
        let value = self
            .sensor
            .upgrade()
            .and_then(|sensor| sensor.last_value())
            .ok_or_else(|| ThermofanError::MissingReading {
                sensor: self.sensor_name.clone(),
            })?;

        Ok(coefficient_for(value, self.min, self.max))
    }
}

/// Linear position of `value` between `min` and `max`, clamped to `[0.0, 1.0]`
pub fn coefficient_for(value: i32, min: i32, max: i32) -> f64 {
    if value <= min {
        return 0.0;
    }
    if value >= max {
        return 1.0;
    }
    // i64 keeps extreme i32 thresholds from overflowing
    let scaled = i64::from(value) - i64::from(min);
    let range = i64::from(max) - i64::from(min);
    scaled as f64 / range as f64
}
