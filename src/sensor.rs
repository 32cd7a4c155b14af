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

//! Sensor sampling
//!
//! A [`Sensor`] wraps one [`SensorSource`] and remembers the last value it
//! produced. A failed read clears the value instead of keeping a stale one,
//! so consumers only ever see a fresh reading or nothing.

use std::cell::Cell;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::constants::sensor::READ_BUFFER_SIZE;
use crate::error::{Result, ThermofanError};

/// Provider of one scalar reading
#[cfg_attr(test, mockall::automock)]
pub trait SensorSource {
    /// Fetch one fresh value from the provider
    fn read(&self) -> Result<i32>;
}

/// Sensor backed by a sysfs-style file (e.g. hwmon `tempN_input`)
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SensorSource for FileSource {
    fn read(&self) -> Result<i32> {
        let mut buf = Vec::with_capacity(READ_BUFFER_SIZE);
        File::open(&self.path)
            .and_then(|f| f.take(READ_BUFFER_SIZE as u64).read_to_end(&mut buf))
            .map_err(|source| ThermofanError::SensorRead {
                path: self.path.clone(),
                source,
            })?;

        parse_leading_int(&buf).map_err(|reason| ThermofanError::SensorParse {
            path: self.path.clone(),
            reason,
        })
    }
}

/// Parse a signed base-10 integer at the start of `bytes`.
///
/// Anything after the digits (typically hwmon's trailing newline) is ignored.
/// Leading whitespace and `+` are not accepted.
pub fn parse_leading_int(bytes: &[u8]) -> std::result::Result<i32, String> {
    let sign_len = usize::from(bytes.first() == Some(&b'-'));
    let digits = bytes[sign_len..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();

    if digits == 0 {
        return Err(format!(
            "no integer in {:?}",
            String::from_utf8_lossy(bytes)
        ));
    }

    let text = std::str::from_utf8(&bytes[..sign_len + digits]).map_err(|e| e.to_string())?;
    text.parse::<i32>()
        .map_err(|e| format!("'{}': {}", text, e))
}

/// One polled reading with missing-value semantics
pub struct Sensor {
    name: String,
    source: Box<dyn SensorSource>,
    last_value: Cell<Option<i32>>,
}

impl Sensor {
    pub fn new(name: impl Into<String>, source: Box<dyn SensorSource>) -> Self {
        Self {
            name: name.into(),
            source,
            last_value: Cell::new(None),
        }
    }

    /// Sensor reading a file such as `/sys/class/hwmon/hwmon1/temp1_input`
    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, Box::new(FileSource::new(path)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last successfully observed value, if the latest poll succeeded
    pub fn last_value(&self) -> Option<i32> {
        self.last_value.get()
    }

    /// Poll the provider once. Never fails: a provider error clears the value.
    pub fn update(&self) {
        match self.source.read() {
            Ok(value) => {
                self.last_value.set(Some(value));
                trace!(sensor = %self.name, value, "Sensor updated");
            }
            Err(e) => {
                self.last_value.set(None);
                debug!(sensor = %self.name, error = %e, "Sensor read failed, last value cleared");
            }
        }
    }
}

impl fmt::Debug for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("name", &self.name)
            .field("last_value", &self.last_value.get())
            .finish_non_exhaustive()
    }
}
