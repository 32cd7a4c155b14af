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

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{limits, paths, timing};
use crate::error::{Result, ThermofanError};
use crate::fan::Accumulation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    /// Unique name drivers refer to
    pub name: String,
    /// File holding the reading, e.g. an hwmon `tempN_input`
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    pub sensor: String,
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FanConfig {
    /// hwmon `pwmN` file; `pwmN_enable` is derived from it
    pub pwm: PathBuf,
    pub pwm_min: u8,
    pub pwm_max: u8,
    #[serde(default)]
    pub accumulation: Accumulation,
    pub drivers: Vec<DriverConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    pub sensors: Vec<SensorConfig>,
    pub fans: Vec<FanConfig>,
}

fn default_poll_interval_ms() -> u64 {
    timing::DEFAULT_POLL_INTERVAL_MS
}

impl Default for TopologyConfig {
    /// Reference machine: CPU package and SATA disk temperatures driving one
    /// nct6775 header.
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            sensors: vec![
                SensorConfig {
                    name: "cpu".to_string(),
                    path: PathBuf::from("/sys/devices/platform/coretemp.0/hwmon/hwmon1/temp1_input"),
                },
                SensorConfig {
                    name: "hdd".to_string(),
                    path: PathBuf::from(
                        "/sys/devices/pci0000:00/0000:00:17.0/ata1/host0/target0:0:0/0:0:0:0/hwmon/hwmon3/temp1_input",
                    ),
                },
            ],
            fans: vec![FanConfig {
                pwm: PathBuf::from("/sys/devices/platform/nct6775.672/hwmon/hwmon2/pwm2"),
                pwm_min: 60,
                pwm_max: 240,
                accumulation: Accumulation::Max,
                drivers: vec![
                    DriverConfig { sensor: "cpu".to_string(), min: 60_000, max: 80_000 },
                    DriverConfig { sensor: "hdd".to_string(), min: 42_000, max: 50_000 },
                ],
            }],
        }
    }
}

impl TopologyConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Where the topology is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    /// Chosen by the user (argument or environment); must exist
    pub explicit: bool,
}

/// Resolve the topology file: command line, then `THERMOFAN_CONFIG`, then
/// `/etc/thermofan/topology.json`.
pub fn config_location(cli_override: Option<PathBuf>) -> ConfigLocation {
    if let Some(path) = cli_override {
        return ConfigLocation { path, explicit: true };
    }
    if let Ok(path) = env::var(paths::CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigLocation { path: PathBuf::from(path), explicit: true };
        }
    }
    ConfigLocation {
        path: PathBuf::from(paths::DEFAULT_CONFIG_FILE),
        explicit: false,
    }
}

/// Load the topology. Validation happens in [`crate::Topology::build`].
///
/// A missing default file falls back to [`TopologyConfig::default`]; a
/// missing explicit file is an error.
pub fn load_config(location: &ConfigLocation) -> Result<TopologyConfig> {
    if !location.explicit && !location.path.exists() {
        warn!(
            path = %location.path.display(),
            "No topology file found, using built-in reference topology"
        );
        return Ok(TopologyConfig::default());
    }

    let config = read_config_file(&location.path)?;
    info!(path = %location.path.display(), "Loaded topology");
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<TopologyConfig> {
    let read_err = |source| ThermofanError::ConfigRead {
        path: path.to_path_buf(),
        source,
    };

    let size = fs::metadata(path).map_err(read_err)?.len();
    if size > limits::MAX_CONFIG_FILE_SIZE {
        return Err(ThermofanError::ConfigTooLarge {
            path: path.to_path_buf(),
            size,
            max_size: limits::MAX_CONFIG_FILE_SIZE,
        });
    }

    let content = fs::read_to_string(path).map_err(read_err)?;
    Ok(serde_json::from_str(&content)?)
}

/// Check every invariant the control engine asserts, so a bad file is
/// reported instead of panicking during topology construction.
pub fn validate_config(config: &TopologyConfig) -> Result<()> {
    if !(timing::MIN_POLL_INTERVAL_MS..=timing::MAX_POLL_INTERVAL_MS)
        .contains(&config.poll_interval_ms)
    {
        return Err(ThermofanError::invalid_config(
            "poll_interval_ms",
            format!(
                "{} is outside {}..={}",
                config.poll_interval_ms,
                timing::MIN_POLL_INTERVAL_MS,
                timing::MAX_POLL_INTERVAL_MS
            ),
        ));
    }

    if config.sensors.is_empty() {
        return Err(ThermofanError::config("at least one sensor is required"));
    }
    if config.fans.is_empty() {
        return Err(ThermofanError::config("at least one fan is required"));
    }

    let mut names = HashSet::new();
    for (i, sensor) in config.sensors.iter().enumerate() {
        if sensor.name.trim().is_empty() {
            return Err(ThermofanError::invalid_config(
                format!("sensors[{}].name", i),
                "must not be empty",
            ));
        }
        if sensor.path.as_os_str().is_empty() {
            return Err(ThermofanError::invalid_config(
                format!("sensors[{}].path", i),
                "must not be empty",
            ));
        }
        if !names.insert(sensor.name.as_str()) {
            return Err(ThermofanError::invalid_config(
                format!("sensors[{}].name", i),
                format!("duplicate sensor name '{}'", sensor.name),
            ));
        }
    }

    for (i, fan) in config.fans.iter().enumerate() {
        validate_fan(i, fan, &names)?;
    }

    Ok(())
}

fn validate_fan(index: usize, fan: &FanConfig, sensor_names: &HashSet<&str>) -> Result<()> {
    let field = |name: &str| format!("fans[{}].{}", index, name);

    if fan.pwm.as_os_str().is_empty() {
        return Err(ThermofanError::invalid_config(field("pwm"), "must not be empty"));
    }
    if fan.pwm_max <= fan.pwm_min {
        return Err(ThermofanError::invalid_config(
            field("pwm_max"),
            format!("{} must be greater than pwm_min {}", fan.pwm_max, fan.pwm_min),
        ));
    }
    fan.accumulation
        .check()
        .map_err(|reason| ThermofanError::invalid_config(field("accumulation"), reason))?;
    if let Accumulation::Weighted(weights) = &fan.accumulation {
        if weights.len() != fan.drivers.len() {
            return Err(ThermofanError::invalid_config(
                field("accumulation"),
                format!(
                    "{} weights given for {} drivers",
                    weights.len(),
                    fan.drivers.len()
                ),
            ));
        }
    }

    for (j, driver) in fan.drivers.iter().enumerate() {
        if !sensor_names.contains(driver.sensor.as_str()) {
            return Err(ThermofanError::invalid_config(
                field(&format!("drivers[{}].sensor", j)),
                format!("unknown sensor '{}'", driver.sensor),
            ));
        }
        if driver.min >= driver.max {
            return Err(ThermofanError::invalid_config(
                field(&format!("drivers[{}]", j)),
                format!("min {} must be below max {}", driver.min, driver.max),
            ));
        }
    }

    Ok(())
}
