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

//! Fan control engine
//!
//! A [`Fan`] collects one coefficient per [`Driver`], reduces them with its
//! [`Accumulation`] strategy and maps the result linearly onto
//! `[pwm_min, pwm_max]`:
//!
//! ```text
//! duty = pwm_min + trunc((pwm_max - pwm_min) * scale)
//! ```
//!
//! If any driver's sensor has no value the whole tick is skipped and the
//! actuator keeps its previous duty.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::actuator::{Actuator, ManualMode};
use crate::constants::pwm::FULL_SPEED;
use crate::driver::Driver;
use crate::error::{Result, ThermofanError};
use crate::sensor::Sensor;

/// Strategy reducing driver coefficients to one scale in `[0.0, 1.0]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Accumulation {
    /// Follow the most urgent driver
    #[default]
    Max,
    /// Arithmetic mean of all drivers
    Mean,
    /// Weighted mean, one weight per driver in attachment order.
    /// Drivers beyond the list weigh 1.0.
    Weighted(Vec<f64>),
}

impl Accumulation {
    /// Check strategy parameters. Only `Weighted` carries any.
    pub fn check(&self) -> std::result::Result<(), String> {
        if let Self::Weighted(weights) = self {
            if weights.is_empty() {
                return Err("weighted accumulation needs at least one weight".into());
            }
            if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(format!("weight {} must be finite and non-negative", w));
            }
            let total = weights.iter().sum::<f64>();
            if total <= 0.0 {
                return Err("weights must not all be zero".into());
            }
            if !total.is_finite() {
                return Err(format!("weights sum to {}, which is not finite", total));
            }
        }
        Ok(())
    }

    /// Reduce `coefficients` to a scale in `[0.0, 1.0]`.
    ///
    /// Total over any input: an empty slice yields 0.0 and a non-finite
    /// intermediate yields 1.0 (full cooling).
    pub fn accumulate(&self, coefficients: &[f64]) -> f64 {
        let raw = match self {
            Self::Max => coefficients.iter().copied().fold(0.0, f64::max),
            Self::Mean => {
                if coefficients.is_empty() {
                    0.0
                } else {
                    coefficients.iter().sum::<f64>() / coefficients.len() as f64
                }
            }
            Self::Weighted(weights) => {
                let (weighted, total) = coefficients.iter().enumerate().fold(
                    (0.0, 0.0),
                    |(weighted, total), (i, c)| {
                        let w = weights.get(i).copied().unwrap_or(1.0);
                        (weighted + w * c, total + w)
                    },
                );
                if total > 0.0 {
                    weighted / total
                } else {
                    0.0
                }
            }
        };

        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

impl fmt::Display for Accumulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Mean => write!(f, "mean"),
            Self::Weighted(weights) => write!(f, "weighted{:?}", weights),
        }
    }
}

/// Map a scale onto `[pwm_min, pwm_max]`, truncating toward `pwm_min`
pub fn duty_for(pwm_min: u8, pwm_max: u8, scale: f64) -> u8 {
    let range = pwm_max.saturating_sub(pwm_min);
    // `as` truncates; NaN maps to 0
    let offset = (f64::from(range) * scale.clamp(0.0, 1.0)) as u8;
    pwm_min + offset.min(range)
}

/// What a call to [`Fan::update`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The duty cycle was written
    Applied { duty: u8 },
    /// A sensor had no value; nothing was written
    Skipped { sensor: String },
    /// No drivers attached; nothing was written
    NoDrivers,
}

pub struct Fan {
    identity: String,
    actuator: Box<dyn Actuator>,
    pwm_min: u8,
    pwm_max: u8,
    accumulation: Accumulation,
    drivers: Vec<Driver>,
    last_duty: Option<u8>,
}

impl Fan {
    /// # Panics
    /// If `pwm_max <= pwm_min` or the accumulation parameters are invalid.
    pub fn new(
        actuator: Box<dyn Actuator>,
        pwm_min: u8,
        pwm_max: u8,
        accumulation: Accumulation,
    ) -> Self {
        let identity = actuator.identity();
        assert!(
            pwm_max > pwm_min,
            "fan {} must satisfy pwm_max > pwm_min (got {} <= {})",
            identity,
            pwm_max,
            pwm_min
        );
        if let Err(reason) = accumulation.check() {
            panic!("fan {} has an invalid accumulation: {}", identity, reason);
        }

        Self {
            identity,
            actuator,
            pwm_min,
            pwm_max,
            accumulation,
            drivers: Vec::new(),
            last_duty: None,
        }
    }

    /// Bind a sensor with its thresholds. Topology is fixed before the loop starts.
    ///
    /// # Panics
    /// If `min >= max`.
    pub fn attach_driver(&mut self, sensor: &Rc<Sensor>, min: i32, max: i32) {
        self.drivers.push(Driver::new(sensor, min, max));
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn pwm_min(&self) -> u8 {
        self.pwm_min
    }

    pub fn pwm_max(&self) -> u8 {
        self.pwm_max
    }

    pub fn accumulation(&self) -> &Accumulation {
        &self.accumulation
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    /// Last duty cycle successfully written, by either `update` or `reset`
    pub fn last_duty(&self) -> Option<u8> {
        self.last_duty
    }

    /// Recompute and write the duty cycle from the current sensor values.
    ///
    /// Returns an error only when the actuator write fails.
    pub fn update(&mut self) -> Result<UpdateOutcome> {
        if self.drivers.is_empty() {
            debug!(fan = %self.identity, "No drivers attached, leaving fan as is");
            return Ok(UpdateOutcome::NoDrivers);
        }

        let mut coefficients = Vec::with_capacity(self.drivers.len());
        for driver in &self.drivers {
            match driver.coefficient() {
                Ok(c) => coefficients.push(c),
                Err(ThermofanError::MissingReading { sensor }) => {
                    warn!(
                        fan = %self.identity,
                        sensor = %sensor,
                        "Sensor has no value, skipping update"
                    );
                    return Ok(UpdateOutcome::Skipped { sensor });
                }
                Err(e) => return Err(e),
            }
        }
        trace!(fan = %self.identity, ?coefficients, "Got coefficients");

        let scale = self.accumulation.accumulate(&coefficients);
        let duty = duty_for(self.pwm_min, self.pwm_max, scale);
        self.set_pwm(duty)?;
        info!(fan = %self.identity, duty, "Fan set to PWM {}", duty);
        Ok(UpdateOutcome::Applied { duty })
    }

    /// Put the fan under manual control at full speed.
    ///
    /// The full-speed write is attempted even when enabling manual mode
    /// failed; the first error is returned.
    pub fn reset(&mut self) -> Result<()> {
        let enabled = self.actuator.enable_manual();
        if let Ok(ManualMode::Enabled) = enabled {
            debug!(fan = %self.identity, "Manual control enabled");
        }
        let full_speed = self.set_pwm(FULL_SPEED);

        enabled?;
        full_speed
    }

    fn set_pwm(&mut self, duty: u8) -> Result<()> {
        self.actuator.write_duty(duty)?;
        self.last_duty = Some(duty);
        trace!(fan = %self.identity, duty, "PWM written");
        Ok(())
    }
}

impl fmt::Debug for Fan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fan")
            .field("identity", &self.identity)
            .field("pwm_min", &self.pwm_min)
            .field("pwm_max", &self.pwm_max)
            .field("accumulation", &self.accumulation)
            .field("drivers", &self.drivers)
            .field("last_duty", &self.last_duty)
            .finish_non_exhaustive()
    }
}
