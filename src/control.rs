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

//! Control loop
//!
//! Runs on a single thread:
//!
//! 1. Reset every fan (manual mode, full speed).
//! 2. Until cancelled: update every sensor, update every fan, then wait for
//!    the poll interval. The wait returns early on cancellation.
//! 3. Reset every fan again, whatever ended the loop.
//!
//! An actuator write failure ends the loop as fatal. Missing sensor values
//! only skip the affected fan for one tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::constants::{exit, timing::WAIT_SLICE};
use crate::error::{Result, ThermofanError};
use crate::fan::{Fan, UpdateOutcome};
use crate::topology::Topology;

/// Shared cancellation flag
///
/// The signal handler only calls [`CancelToken::cancel`]; the loop and its
/// wait observe the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until cancelled, whichever comes first.
    ///
    /// Returns `true` if the token was cancelled. Wake-up latency after
    /// cancellation is bounded by [`WAIT_SLICE`]. A duration too large to
    /// represent as a deadline waits for cancellation only.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return true;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    (deadline - now).min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };
            thread::sleep(slice);
        }
    }
}

/// Why the control loop stopped
#[derive(Debug)]
pub enum ExitReason {
    /// Termination was requested
    Cancelled,
    /// An actuator failed, during the startup reset or a fan update
    Fatal(ThermofanError),
}

/// Outcome of [`Controller::run`]
#[derive(Debug)]
pub struct Shutdown {
    pub reason: ExitReason,
    /// Result of the exit reset pass, reported next to `reason`
    pub final_reset: Result<()>,
}

impl Shutdown {
    pub fn is_clean(&self) -> bool {
        matches!(self.reason, ExitReason::Cancelled) && self.final_reset.is_ok()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            exit::CLEAN
        } else {
            exit::FATAL
        }
    }
}

/// Reset every fan to manual control at full speed.
///
/// Every fan is attempted even after a failure; the first error is returned.
pub fn reset_fans(fans: &mut [Fan]) -> Result<()> {
    info!("Resetting all fans to manual mode and full speed");
    let mut first_error = None;
    for fan in fans.iter_mut() {
        if let Err(e) = fan.reset() {
            error!(fan = %fan.identity(), error = %e, "Failed to reset fan");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

pub struct Controller {
    topology: Topology,
    poll_interval: Duration,
}

impl Controller {
    pub fn new(topology: Topology, poll_interval: Duration) -> Self {
        Self {
            topology,
            poll_interval,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// One control iteration: refresh every sensor, then recompute every fan.
    ///
    /// Stops at the first actuator failure.
    pub fn tick(&mut self) -> Result<()> {
        for sensor in &self.topology.sensors {
            sensor.update();
        }
        for fan in &mut self.topology.fans {
            if let UpdateOutcome::Skipped { .. } = fan.update()? {
                debug!(fan = %fan.identity(), duty = ?fan.last_duty(), "Fan keeps its previous duty");
            }
        }
        Ok(())
    }

    /// Run until `cancel` fires or an actuator fails, then reset all fans.
    pub fn run(&mut self, cancel: &CancelToken) -> Shutdown {
        let reason = match self.control_loop(cancel) {
            Ok(()) => {
                info!("Signal caught, program will now exit");
                ExitReason::Cancelled
            }
            Err(e) => {
                error!(
                    error = %e,
                    actuator_fault = e.is_actuator_fault(),
                    "Fatal error, program will now exit"
                );
                ExitReason::Fatal(e)
            }
        };

        let final_reset = reset_fans(&mut self.topology.fans);
        if let Err(e) = &final_reset {
            error!(error = %e, "Final reset failed, fans may be left below full speed");
        }

        Shutdown {
            reason,
            final_reset,
        }
    }

    fn control_loop(&mut self, cancel: &CancelToken) -> Result<()> {
        reset_fans(&mut self.topology.fans)?;

        let mut iteration: u64 = 0;
        while !cancel.is_cancelled() {
            let started = Instant::now();
            self.tick()?;
            iteration += 1;

            let elapsed = started.elapsed();
            if elapsed > self.poll_interval {
                warn!(
                    iteration,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Control iteration took longer than the poll interval"
                );
            } else {
                debug!(iteration, elapsed_ms = elapsed.as_millis() as u64, "Control iteration complete");
            }

            cancel.wait(self.poll_interval);
        }
        Ok(())
    }
}
