/*
 * Integration tests for Thermofan
 *
 * These tests drive the public API against sysfs-like trees in temporary
 * directories: sensor files in, PWM files out.
 */

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serial_test::serial;
use thermofan::config::{DriverConfig, FanConfig, SensorConfig};
use thermofan::constants::{exit, paths};
use thermofan::{
    config_location, load_config, reset_fans, Accumulation, CancelToken, Controller,
    ExitReason, Fan, FileActuator, Sensor, ThermofanError, Topology, TopologyConfig,
    UpdateOutcome,
};

// Test utilities
fn reference_config(dir: &Path) -> TopologyConfig {
    TopologyConfig {
        poll_interval_ms: 200,
        sensors: vec![
            SensorConfig { name: "cpu".into(), path: dir.join("temp1_input") },
            SensorConfig { name: "hdd".into(), path: dir.join("temp2_input") },
        ],
        fans: vec![FanConfig {
            pwm: dir.join("pwm2"),
            pwm_min: 60,
            pwm_max: 240,
            accumulation: Accumulation::Max,
            drivers: vec![
                DriverConfig { sensor: "cpu".into(), min: 60_000, max: 80_000 },
                DriverConfig { sensor: "hdd".into(), min: 42_000, max: 50_000 },
            ],
        }],
    }
}

fn write_temps(dir: &Path, cpu: &str, hdd: &str) {
    fs::write(dir.join("temp1_input"), cpu).unwrap();
    fs::write(dir.join("temp2_input"), hdd).unwrap();
}

fn read_pwm(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn single_fan(pwm: &Path) -> Fan {
    Fan::new(Box::new(FileActuator::new(pwm)), 0, 255, Accumulation::Max)
}

#[test]
fn test_reference_scenario_duty() {
    let dir = tempfile::tempdir().unwrap();
    write_temps(dir.path(), "70000\n", "44000\n");
    fs::write(dir.path().join("pwm2"), "0\n").unwrap();

    let topology = Topology::build(&reference_config(dir.path())).unwrap();
    let mut controller = Controller::new(topology, Duration::from_millis(200));
    controller.tick().unwrap();

    // cpu 0.5, hdd 0.25, max 0.5: 60 + trunc(180 * 0.5)
    assert_eq!(read_pwm(&dir.path().join("pwm2")), "150");
    assert_eq!(controller.topology().fans[0].last_duty(), Some(150));
}

#[test]
fn test_saturated_and_idle_sensors() {
    let dir = tempfile::tempdir().unwrap();
    let pwm = dir.path().join("pwm2");
    let mut controller = Controller::new(
        Topology::build(&reference_config(dir.path())).unwrap(),
        Duration::from_millis(200),
    );

    write_temps(dir.path(), "30000\n", "20000\n");
    controller.tick().unwrap();
    assert_eq!(read_pwm(&pwm), "60");

    write_temps(dir.path(), "30000\n", "95000\n");
    controller.tick().unwrap();
    assert_eq!(read_pwm(&pwm), "240");
}

#[test]
fn test_unreadable_sensor_skips_fan() {
    let dir = tempfile::tempdir().unwrap();
    write_temps(dir.path(), "70000\n", "44000\n");
    let pwm = dir.path().join("pwm2");

    let mut topology = Topology::build(&reference_config(dir.path())).unwrap();
    reset_fans(&mut topology.fans).unwrap();
    assert_eq!(read_pwm(&pwm), "255");

    fs::remove_file(dir.path().join("temp2_input")).unwrap();
    for sensor in &topology.sensors {
        sensor.update();
    }
    assert_eq!(topology.sensors[1].last_value(), None);
    assert_eq!(
        topology.fans[0].update().unwrap(),
        UpdateOutcome::Skipped { sensor: "hdd".to_string() }
    );
    assert_eq!(read_pwm(&pwm), "255");
}

#[test]
fn test_garbage_sensor_value_skips_fan() {
    let dir = tempfile::tempdir().unwrap();
    write_temps(dir.path(), "70000\n", "n/a\n");
    fs::write(dir.path().join("pwm2"), "42").unwrap();

    let mut controller = Controller::new(
        Topology::build(&reference_config(dir.path())).unwrap(),
        Duration::from_millis(200),
    );
    controller.tick().unwrap();
    assert_eq!(read_pwm(&dir.path().join("pwm2")), "42");
}

#[test]
fn test_reset_without_enable_file() {
    let dir = tempfile::tempdir().unwrap();
    let pwm = dir.path().join("pwm1");
    fs::write(&pwm, "80").unwrap();

    let mut fan = single_fan(&pwm);
    fan.reset().unwrap();

    assert_eq!(read_pwm(&pwm), "255");
    assert!(!dir.path().join("pwm1_enable").exists());
}

#[test]
fn test_reset_with_enable_file() {
    let dir = tempfile::tempdir().unwrap();
    let pwm = dir.path().join("pwm1");
    let enable = dir.path().join("pwm1_enable");
    fs::write(&pwm, "80").unwrap();
    fs::write(&enable, "5\n").unwrap();

    let mut fan = single_fan(&pwm);
    fan.reset().unwrap();
    assert_eq!(read_pwm(&enable), "1");
    assert_eq!(read_pwm(&pwm), "255");

    // idempotent
    fan.reset().unwrap();
    assert_eq!(read_pwm(&enable), "1");
    assert_eq!(read_pwm(&pwm), "255");
}

#[test]
fn test_reset_enable_write_failure_still_forces_full_speed() {
    if !Path::new("/dev/full").exists() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let pwm = dir.path().join("pwm1");
    fs::write(&pwm, "80").unwrap();
    symlink("/dev/full", dir.path().join("pwm1_enable")).unwrap();

    let mut fan = single_fan(&pwm);
    let err = fan.reset().unwrap_err();
    assert!(matches!(err, ThermofanError::EnableWrite { .. }));
    assert!(err.is_actuator_fault());
    assert_eq!(read_pwm(&pwm), "255");
}

#[test]
fn test_pwm_write_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_temps(dir.path(), "70000\n", "44000\n");
    let mut config = reference_config(dir.path());
    config.fans[0].pwm = dir.path().join("missing-hwmon").join("pwm2");

    let mut controller = Controller::new(
        Topology::build(&config).unwrap(),
        Duration::from_millis(200),
    );
    let err = controller.tick().unwrap_err();
    assert!(matches!(err, ThermofanError::PwmWrite { value: 150, .. }));

    let shutdown = controller.run(&CancelToken::new());
    assert!(matches!(shutdown.reason, ExitReason::Fatal(ThermofanError::PwmWrite { .. })));
    assert!(shutdown.final_reset.is_err());
    assert_eq!(shutdown.exit_code(), exit::FATAL);
}

#[test]
fn test_run_stops_promptly_and_leaves_fans_at_full_speed() {
    let dir = tempfile::tempdir().unwrap();
    write_temps(dir.path(), "70000\n", "44000\n");
    let pwm = dir.path().join("pwm2");
    let enable = dir.path().join("pwm2_enable");
    fs::write(&enable, "2").unwrap();

    let mut config = reference_config(dir.path());
    config.poll_interval_ms = 5000;
    let mut controller = Controller::new(Topology::build(&config).unwrap(), config.poll_interval());

    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        remote.cancel();
        Instant::now()
    });

    let shutdown = controller.run(&cancel);
    let returned = Instant::now();
    let cancelled_at = canceller.join().unwrap();

    assert!(returned.duration_since(cancelled_at) < Duration::from_secs(2));
    assert!(shutdown.is_clean());
    assert_eq!(shutdown.exit_code(), exit::CLEAN);
    assert_eq!(read_pwm(&pwm), "255");
    assert_eq!(read_pwm(&enable), "1");
    assert_eq!(controller.topology().fans[0].last_duty(), Some(255));
}

#[test]
fn test_shared_sensor_drives_two_fans() {
    let dir = tempfile::tempdir().unwrap();
    write_temps(dir.path(), "75000\n", "44000\n");
    let mut config = reference_config(dir.path());
    config.fans.push(FanConfig {
        pwm: dir.path().join("pwm3"),
        pwm_min: 0,
        pwm_max: 200,
        accumulation: Accumulation::Mean,
        drivers: vec![
            DriverConfig { sensor: "cpu".into(), min: 70_000, max: 80_000 },
            DriverConfig { sensor: "hdd".into(), min: 40_000, max: 48_000 },
        ],
    });

    let mut controller = Controller::new(Topology::build(&config).unwrap(), config.poll_interval());
    controller.tick().unwrap();

    // fan 1: max(0.75, 0.25) -> 60 + trunc(180 * 0.75) = 195
    assert_eq!(read_pwm(&dir.path().join("pwm2")), "195");
    // fan 2: mean(0.5, 0.5) -> trunc(200 * 0.5) = 100
    assert_eq!(read_pwm(&dir.path().join("pwm3")), "100");
}

#[test]
fn test_dropped_sensor_reads_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("temp"), "50000").unwrap();
    let pwm = dir.path().join("pwm1");
    fs::write(&pwm, "7").unwrap();

    let sensor = std::rc::Rc::new(Sensor::from_file("board", dir.path().join("temp")));
    let mut fan = single_fan(&pwm);
    fan.attach_driver(&sensor, 40_000, 60_000);
    sensor.update();
    drop(sensor);

    assert_eq!(
        fan.update().unwrap(),
        UpdateOutcome::Skipped { sensor: "board".to_string() }
    );
    assert_eq!(read_pwm(&pwm), "7");
}

#[test]
#[serial]
fn test_config_file_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    write_temps(dir.path(), "70000\n", "44000\n");
    let config_path = dir.path().join("topology.json");
    let json = serde_json::json!({
        "poll_interval_ms": 1000,
        "sensors": [
            { "name": "cpu", "path": dir.path().join("temp1_input") },
            { "name": "hdd", "path": dir.path().join("temp2_input") }
        ],
        "fans": [{
            "pwm": dir.path().join("pwm2"),
            "pwm_min": 60,
            "pwm_max": 240,
            "accumulation": { "weighted": [3.0, 1.0] },
            "drivers": [
                { "sensor": "cpu", "min": 60000, "max": 80000 },
                { "sensor": "hdd", "min": 42000, "max": 50000 }
            ]
        }]
    });
    fs::write(&config_path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    std::env::set_var(paths::CONFIG_ENV_VAR, &config_path);
    let location = config_location(None);
    std::env::remove_var(paths::CONFIG_ENV_VAR);
    assert!(location.explicit);

    let config = load_config(&location).unwrap();
    assert_eq!(config.poll_interval(), Duration::from_secs(1));

    let mut controller = Controller::new(Topology::build(&config).unwrap(), config.poll_interval());
    controller.tick().unwrap();
    // (0.5 * 3 + 0.25 * 1) / 4 = 0.4375 -> 60 + trunc(78.75) = 138
    assert_eq!(read_pwm(&dir.path().join("pwm2")), "138");
}

#[test]
#[serial]
fn test_missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let location = config_location(Some(dir.path().join("absent.json")));
    assert!(matches!(
        load_config(&location),
        Err(ThermofanError::ConfigRead { .. })
    ));
}
