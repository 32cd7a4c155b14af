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

//! Sensors, fans and the driver bindings between them

use std::collections::HashMap;
use std::rc::Rc;

use tracing::info;

use crate::actuator::FileActuator;
use crate::config::{validate_config, TopologyConfig};
use crate::error::{Result, ThermofanError};
use crate::fan::Fan;
use crate::sensor::Sensor;

/// Fixed once the control loop starts. Sensors are owned here; drivers only
/// hold weak references to them.
#[derive(Debug, Default)]
pub struct Topology {
    pub sensors: Vec<Rc<Sensor>>,
    pub fans: Vec<Fan>,
}

impl Topology {
    /// Build file-backed sensors and fans from a configuration.
    ///
    /// The configuration is validated first so that fan and driver
    /// constructors never see an invalid value.
    pub fn build(config: &TopologyConfig) -> Result<Self> {
        validate_config(config)?;

        let sensors: Vec<Rc<Sensor>> = config
            .sensors
            .iter()
            .map(|s| Rc::new(Sensor::from_file(s.name.clone(), s.path.clone())))
            .collect();
        let by_name: HashMap<&str, &Rc<Sensor>> =
            sensors.iter().map(|s| (s.name(), s)).collect();

        let mut fans = Vec::with_capacity(config.fans.len());
        for fan_config in &config.fans {
            let mut fan = Fan::new(
                Box::new(FileActuator::new(fan_config.pwm.clone())),
                fan_config.pwm_min,
                fan_config.pwm_max,
                fan_config.accumulation.clone(),
            );
            for driver in &fan_config.drivers {
                let sensor = by_name.get(driver.sensor.as_str()).ok_or_else(|| {
                    ThermofanError::config(format!("unknown sensor '{}'", driver.sensor))
                })?;
                fan.attach_driver(sensor, driver.min, driver.max);
            }
            fans.push(fan);
        }

        Ok(Self { sensors, fans })
    }

    /// Log what the loop is about to control
    pub fn log_summary(&self) {
        info!(
            sensors = self.sensors.len(),
            fans = self.fans.len(),
            "Topology ready"
        );
        for fan in &self.fans {
            let drivers: Vec<String> = fan
                .drivers()
                .iter()
                .map(|d| format!("{}[{}..{}]", d.sensor_name(), d.min(), d.max()))
                .collect();
            info!(
                fan = %fan.identity(),
                pwm_min = fan.pwm_min(),
                pwm_max = fan.pwm_max(),
                accumulation = %fan.accumulation(),
                drivers = ?drivers,
                "Fan configured"
            );
        }
    }
}
