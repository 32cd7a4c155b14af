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

//! Thermofan daemon (thermofand)
//!
//! Loads the topology, forces every fan to full speed, then drives the fans
//! from their sensors until SIGINT/SIGTERM/SIGHUP. Fans are forced back to
//! full speed on the way out.
//!
//! Exit status: 0 after a clean shutdown, 1 after an actuator failure, 2 for
//! configuration or usage errors.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use tracing::{error, info, warn};

use thermofan::constants::exit;
use thermofan::{
    config_location, load_config, logger, CancelToken, Controller, ExitReason, Topology,
    TopologyConfig,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    config: Option<PathBuf>,
    check: bool,
    print_config: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(Options),
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-V" | "--version" => return Ok(Command::Version),
            "--check" => options.check = true,
            "--print-config" => options.print_config = true,
            "-c" | "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| "--config requires a path argument".to_string())?;
                options.config = Some(PathBuf::from(path));
            }
            arg => return Err(format!("Unknown argument: {}", arg)),
        }
        i += 1;
    }
    Ok(Command::Run(options))
}

fn print_help() {
    eprintln!("thermofand {} - temperature driven fan control", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    thermofand [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Topology file (default /etc/thermofan/topology.json)");
    eprintln!("        --check         Validate the topology and exit without touching fans");
    eprintln!("        --print-config  Print the effective topology as JSON and exit");
    eprintln!("    -V, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    THERMOFAN_CONFIG    Topology file when --config is not given");
    eprintln!("    THERMOFAN_LOG       Log level (trace, debug, info, warn, error)");
}

/// sysfs PWM files are root-owned; warn early instead of failing on the first write
fn verify_privileges() {
    // SAFETY: geteuid has no preconditions and only returns the effective user ID.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        warn!(euid, "Not running as root, PWM writes will likely be refused");
    }
}

fn install_signal_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    // The handler only flips the flag; the loop does the logging and cleanup.
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!(
            error = %e,
            "Failed to set signal handler, termination signals will not reset fans"
        );
    }
}

fn load_topology(options: &Options) -> anyhow::Result<(TopologyConfig, Topology)> {
    let location = config_location(options.config.clone());
    let config = load_config(&location)
        .with_context(|| format!("loading topology from {}", location.path.display()))?;
    let topology = Topology::build(&config).context("building topology")?;
    Ok((config, topology))
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print_help();
            return;
        }
        Ok(Command::Version) => {
            println!("thermofand {}", VERSION);
            return;
        }
        Err(msg) => {
            eprintln!("Error: {}", msg);
            print_help();
            process::exit(exit::CONFIG);
        }
    };

    let log_level = logger::log_level();
    let sink = logger::init_logging(&log_level);
    info!("STARTUP: thermofand {} starting", VERSION);
    info!("STARTUP: Logging to {} at level {}", sink.as_str(), log_level);

    let (config, topology) = match load_topology(&options) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{:#}", e);
            process::exit(exit::CONFIG);
        }
    };

    if options.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!(error = %e, "Could not serialize topology");
                process::exit(exit::CONFIG);
            }
        }
        return;
    }

    topology.log_summary();
    if options.check {
        println!(
            "Topology OK: {} sensor(s), {} fan(s), poll interval {} ms",
            topology.sensors.len(),
            topology.fans.len(),
            config.poll_interval_ms
        );
        return;
    }

    verify_privileges();

    let cancel = CancelToken::new();
    install_signal_handler(&cancel);

    let mut controller = Controller::new(topology, config.poll_interval());
    let shutdown = controller.run(&cancel);

    match &shutdown.reason {
        ExitReason::Cancelled => info!("SHUTDOWN: control loop stopped on request"),
        ExitReason::Fatal(e) => error!(error = %e, "SHUTDOWN: control loop stopped on fatal error"),
    }
    if shutdown.final_reset.is_err() {
        error!("SHUTDOWN: fans could not all be returned to full speed");
    }

    process::exit(shutdown.exit_code());
}
