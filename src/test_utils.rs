/*
 * Test utilities and fakes for Thermofan
 *
 * Hand-written sensor sources and actuators whose state stays observable
 * from the test after ownership moves into a Sensor or Fan.
 */

use std::cell::{Cell, RefCell};
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use crate::actuator::{Actuator, ManualMode};
use crate::error::{Result, ThermofanError};
use crate::sensor::{Sensor, SensorSource};

/// Sensor source returning whatever the shared cell holds; `None` reads as a parse failure
pub struct ManualSource {
    value: Rc<Cell<Option<i32>>>,
}

impl SensorSource for ManualSource {
    fn read(&self) -> Result<i32> {
        self.value.get().ok_or_else(|| ThermofanError::SensorParse {
            path: PathBuf::from("manual"),
            reason: "no value set".to_string(),
        })
    }
}

/// Creates a sensor and the handle controlling what its next `update` sees
pub fn manual_sensor(name: &str) -> (Rc<Sensor>, Rc<Cell<Option<i32>>>) {
    let value = Rc::new(Cell::new(None));
    let sensor = Sensor::new(name, Box::new(ManualSource { value: value.clone() }));
    (Rc::new(sensor), value)
}

/// Creates a sensor already updated to `value`
pub fn sensor_with_value(name: &str, value: Option<i32>) -> Rc<Sensor> {
    let (sensor, handle) = manual_sensor(name);
    handle.set(value);
    sensor.update();
    sensor
}

/// Actuator recording every successful duty write
pub struct RecordingActuator {
    identity: String,
    writes: Rc<RefCell<Vec<u8>>>,
    enables: Rc<Cell<usize>>,
    successful_writes_left: Option<usize>,
    attempted: Cell<usize>,
}

impl RecordingActuator {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            writes: Rc::new(RefCell::new(Vec::new())),
            enables: Rc::new(Cell::new(0)),
            successful_writes_left: None,
            attempted: Cell::new(0),
        }
    }

    /// Only the first `n` duty writes succeed
    pub fn failing_after(mut self, n: usize) -> Self {
        self.successful_writes_left = Some(n);
        self
    }

    pub fn writes(&self) -> Rc<RefCell<Vec<u8>>> {
        self.writes.clone()
    }

    pub fn enables(&self) -> Rc<Cell<usize>> {
        self.enables.clone()
    }
}

impl Actuator for RecordingActuator {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn enable_manual(&self) -> Result<ManualMode> {
        self.enables.set(self.enables.get() + 1);
        Ok(ManualMode::Enabled)
    }

    fn write_duty(&self, duty: u8) -> Result<()> {
        let attempt = self.attempted.get();
        self.attempted.set(attempt + 1);
        if let Some(limit) = self.successful_writes_left {
            if attempt >= limit {
                return Err(ThermofanError::PwmWrite {
                    path: PathBuf::from(&self.identity),
                    value: duty,
                    source: io::Error::new(io::ErrorKind::Other, "simulated write failure"),
                });
            }
        }
        self.writes.borrow_mut().push(duty);
        Ok(())
    }
}
