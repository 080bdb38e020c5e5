// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use serde::Serialize;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uvcholder::{controls::ControlId, frame_type::RawFrameType};

/// Parse a resolution given as "WxH" or "W*H".
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width, height) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse a frame type name such as "YUYV" or "MJPEG".
pub fn parse_frame_type(s: &str) -> Result<RawFrameType, CliError> {
    Ok(s.parse::<RawFrameType>()?)
}

/// Parse a control given by name or identifier.
pub fn parse_control(s: &str) -> Result<ControlId, CliError> {
    Ok(uvcholder::controls::parse_control(s)?)
}

/// Install signal handlers for graceful shutdown on Ctrl+C or SIGTERM.
///
/// The returned flag is set once either signal arrives.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(&term))
            .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;
    }

    log::debug!("Installed SIGINT/SIGTERM handlers");
    Ok(term)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::General(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}
