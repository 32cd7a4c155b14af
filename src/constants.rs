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

//! Constants and defaults for Thermofan
//!
//! Paths, PWM values and loop timing live here so the rest of the crate
//! never carries magic numbers.

/// System and configuration paths
pub mod paths {
    /// Default topology file
    pub const DEFAULT_CONFIG_FILE: &str = "/etc/thermofan/topology.json";

    /// Environment variable overriding the topology file location
    pub const CONFIG_ENV_VAR: &str = "THERMOFAN_CONFIG";

    /// Environment variable holding the log filter (trace, debug, info, warn, error)
    pub const LOG_ENV_VAR: &str = "THERMOFAN_LOG";

    /// Present when systemd-journald accepts native log records
    pub const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";
}

/// PWM constants
pub mod pwm {
    /// Full speed duty cycle, written by every reset
    pub const FULL_SPEED: u8 = 255;

    /// Suffix appended to a pwmN file name to form its mode switch (pwmN_enable)
    pub const ENABLE_SUFFIX: &str = "_enable";

    /// PWM enable values
    pub mod enable {
        /// Manual (software) control
        pub const MANUAL: &str = "1";
    }
}

/// Sensor provider constants
pub mod sensor {
    /// Bytes read from a sensor file per sample. hwmon values are far shorter.
    pub const READ_BUFFER_SIZE: usize = 32;
}

/// Control loop timing
pub mod timing {
    use std::time::Duration;

    /// Default poll interval between control iterations
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

    /// Smallest accepted poll interval
    pub const MIN_POLL_INTERVAL_MS: u64 = 100;

    /// Largest accepted poll interval (one hour)
    pub const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;

    /// Granularity at which the interruptible wait checks for cancellation
    pub const WAIT_SLICE: Duration = Duration::from_millis(100);
}

/// Configuration limits
pub mod limits {
    /// Maximum accepted topology file size (1 MiB)
    pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
}

/// Process exit statuses
pub mod exit {
    /// Clean cancellation, fans reset
    pub const CLEAN: i32 = 0;

    /// Fatal actuator or reset failure
    pub const FATAL: i32 = 1;

    /// Configuration or usage error, no fan touched
    pub const CONFIG: i32 = 2;
}
