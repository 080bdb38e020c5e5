// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Formats, current format and control summary of one device.

use crate::{error::CliError, session::Session, utils};
use clap::Args as ClapArgs;
use serde::Serialize;
use uvcholder::{
    config::HolderConfig,
    controls::{control_name, ControlInfo},
    format::VideoFormat,
};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Device id as reported by `devices`
    id: i32,

    /// Also read range and value of every supported control
    #[arg(short, long)]
    controls: bool,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    id: i32,
    state: String,
    current: FormatEntry,
    formats: Vec<FormatEntry>,
    ctrl_supports: String,
    proc_supports: String,
    controls: Vec<ControlEntry>,
}

#[derive(Debug, Serialize)]
pub struct FormatEntry {
    format: String,
    width: u32,
    height: u32,
    frame_index: i32,
    compressed: bool,
    fps: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_fps: Option<f32>,
}

impl From<&VideoFormat> for FormatEntry {
    fn from(format: &VideoFormat) -> Self {
        FormatEntry {
            format: format.frame_type.to_string(),
            width: format.width,
            height: format.height,
            frame_index: format.frame_index,
            compressed: format.frame_type.is_compressed(),
            fps: format.fps.clone(),
            max_fps: format.max_fps(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ControlEntry {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<i32>,
}

impl ControlEntry {
    fn bare(id: u64) -> Self {
        ControlEntry {
            id: format!("0x{:x}", id),
            name: control_name(id),
            current: None,
            default: None,
            min: None,
            max: None,
            step: None,
        }
    }
}

impl From<&ControlInfo> for ControlEntry {
    fn from(info: &ControlInfo) -> Self {
        let ranged = info.has_min_max;
        ControlEntry {
            current: Some(info.current),
            default: Some(info.default),
            min: ranged.then_some(info.min),
            max: ranged.then_some(info.max),
            step: ranged.then_some(info.resolution),
            ..ControlEntry::bare(info.control)
        }
    }
}

pub fn execute(args: Args, simulate: bool, json: bool) -> Result<(), CliError> {
    log::debug!("Executing info command: {:?}", args);

    let session = Session::open(simulate, HolderConfig::default())?;
    let holder = session.holder(args.id)?;

    let controls = holder
        .supported_controls()
        .iter()
        .map(|id| {
            if !args.controls {
                return ControlEntry::bare(id);
            }
            match holder.control_info(id) {
                Ok(info) => ControlEntry::from(&info),
                Err(err) => {
                    log::warn!("control 0x{:x} unreadable: {}", id, err);
                    ControlEntry::bare(id)
                }
            }
        })
        .collect();

    let output = InfoOutput {
        id: args.id,
        state: session.registry().device_state(args.id).to_string(),
        current: FormatEntry::from(&holder.current_size()),
        formats: holder.supported_sizes().iter().map(FormatEntry::from).collect(),
        ctrl_supports: format!("0x{:08x}", holder.ctrl_supports()),
        proc_supports: format!("0x{:08x}", holder.proc_supports()),
        controls,
    };

    if json {
        return utils::print_json(&output);
    }

    println!("Device {} ({})", output.id, output.state);
    println!("  Current: {}", holder.current_size());
    println!("  Formats ({}):", output.formats.len());
    for (index, format) in holder.supported_sizes().iter().enumerate() {
        let kind = if format.frame_type.is_compressed() {
            "compressed"
        } else {
            "raw"
        };
        match format.max_fps() {
            Some(fps) => println!("    [{}] {} ({}, up to {:.0} fps)", index, format, kind, fps),
            None => println!("    [{}] {} ({})", index, format, kind),
        }
    }
    println!(
        "  Controls ({}): ctrl {} proc {}",
        output.controls.len(),
        output.ctrl_supports,
        output.proc_supports
    );
    for entry in &output.controls {
        let name = entry.name.unwrap_or("unknown");
        match (entry.current, entry.min, entry.max) {
            (Some(current), Some(min), Some(max)) => {
                println!("    {} {} = {} [{}..{}]", entry.id, name, current, min, max)
            }
            (Some(current), _, _) => println!("    {} {} = {}", entry.id, name, current),
            _ => println!("    {} {}", entry.id, name),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvcholder::{
        controls::{PU_BRIGHTNESS, PU_MASK},
        format::FrameIntervals,
        frame_type::RawFrameType,
    };

    #[test]
    fn test_format_entry() {
        let format = VideoFormat::new(RawFrameType::Mjpeg, 1920, 1080)
            .with_index(2)
            .with_intervals(FrameIntervals::Discrete(vec![333_333]));
        let entry = FormatEntry::from(&format);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["format"], "MJPEG");
        assert_eq!(json["frame_index"], 2);
        assert_eq!(json["fps"].as_array().unwrap().len(), 1);
        assert_eq!(json["compressed"], true);
        assert!((json["max_fps"].as_f64().unwrap() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_format_entry_raw_without_rates() {
        let entry = FormatEntry::from(&VideoFormat::new(RawFrameType::Yuyv, 640, 480));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["compressed"], false);
        assert!(json.get("max_fps").is_none());
    }

    #[test]
    fn test_control_entry_without_range() {
        let info = ControlInfo {
            control: PU_BRIGHTNESS | PU_MASK,
            initialized: true,
            current: 5,
            ..ControlInfo::default()
        };
        let json = serde_json::to_value(ControlEntry::from(&info)).unwrap();
        assert_eq!(json["name"], "brightness");
        assert_eq!(json["current"], 5);
        assert!(json.get("min").is_none());
    }
}
