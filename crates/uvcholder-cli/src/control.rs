// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{error::CliError, session::Session, utils};
use clap::{Args as ClapArgs, Subcommand};
use serde::Serialize;
use uvcholder::{config::HolderConfig, controls::control_name};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Device id as reported by `devices`
    id: i32,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Show range, default and current value
    Info {
        /// Control name (e.g. brightness) or identifier (e.g. 0x80000001)
        control: String,
    },
    /// Read the current value
    Get {
        /// Control name (e.g. brightness) or identifier (e.g. 0x80000001)
        control: String,
    },
    /// Write a new value and read it back
    Set {
        /// Control name (e.g. brightness) or identifier (e.g. 0x80000001)
        control: String,
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
}

#[derive(Debug, Serialize)]
struct ControlOutput {
    device_id: i32,
    control: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,
    value: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<[i32; 3]>,
}

impl ControlOutput {
    fn label(&self) -> &str {
        self.name.unwrap_or(self.control.as_str())
    }
}

pub fn execute(args: Args, simulate: bool, json: bool) -> Result<(), CliError> {
    log::debug!("Executing control command: {:?}", args);

    let session = Session::open(simulate, HolderConfig::default())?;
    let holder = session.holder(args.id)?;

    let control = match &args.action {
        Action::Info { control } | Action::Get { control } | Action::Set { control, .. } => {
            utils::parse_control(control)?
        }
    };
    if !holder.supported_controls().contains(control) {
        log::warn!(
            "control 0x{:x} not advertised by device {}, asking anyway",
            control,
            args.id
        );
    }

    let mut output = ControlOutput {
        device_id: args.id,
        control: format!("0x{:x}", control),
        name: control_name(control),
        value: 0,
        default: None,
        range: None,
    };

    match args.action {
        Action::Info { .. } => {
            let info = holder.control_info(control)?;
            output.value = info.current;
            output.default = Some(info.default);
            output.range = info
                .has_min_max
                .then_some([info.min, info.max, info.resolution]);
        }
        Action::Get { .. } => output.value = holder.control_value(control)?,
        Action::Set { value, .. } => {
            holder.set_control_value(control, value)?;
            output.value = holder.control_value(control)?;
            log::info!("{} set to {}", output.label(), output.value);
        }
    }

    if json {
        return utils::print_json(&output);
    }

    print!("{} = {}", output.label(), output.value);
    if let Some(default) = output.default {
        print!(" (default {})", default);
    }
    if let Some([min, max, step]) = output.range {
        print!(" range {}..={} step {}", min, max, step);
    }
    println!();
    Ok(())
}
