// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! `uvcholder`: list UVC cameras, inspect and change their controls, and
//! record frames through the holder's pull path.

mod control;
mod devices;
mod error;
mod info;
mod metrics;
mod record;
mod session;
mod surface;
mod utils;

use clap::{Parser, Subcommand};
use error::{result_to_exit_code, CliError};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "uvcholder", version, propagate_version = true)]
#[command(about = "UVC Holder CLI - USB camera listing, controls and recording tool")]
struct Cli {
    /// Debug output (RUST_LOG still takes precedence)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Use a simulated colour-bar camera (device 1) instead of libaandusb.so
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List attached UVC devices
    Devices(devices::Args),

    /// Show supported formats, current format and controls of a device
    Info(info::Args),

    /// Query or change a camera control
    Control(control::Args),

    /// Record raw RGBA frames from a device through the pull path
    Record(record::Args),
}

impl Cli {
    fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, true) => "debug",
            (false, false) => "info",
        }
    }

    fn run(self) -> Result<(), CliError> {
        let (simulate, json) = (self.simulate, self.json);
        match self.command {
            Command::Devices(args) => devices::execute(args, simulate, json),
            Command::Info(args) => info::execute(args, simulate, json),
            Command::Control(args) => control::execute(args, simulate, json),
            Command::Record(args) => record::execute(args, simulate, json),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .format_target(false)
        .init();
    log::debug!("log level {}, simulate {}", cli.log_level(), cli.simulate);

    result_to_exit_code(cli.run())
}
