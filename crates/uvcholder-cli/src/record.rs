// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Record raw RGBA frames through the recording surface.

use crate::{
    error::CliError, metrics::RecordMetrics, session::Session, surface::FileSurface, utils,
};
use clap::Args as ClapArgs;
use std::{
    path::PathBuf,
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};
use uvcholder::{
    config::{CaptureConfig, HolderConfig},
    surface::PlatformSurface,
};

/// Give up when the frame counter stalls this long.
const STALL_TIMEOUT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(10);

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Device id as reported by `devices`
    id: i32,

    /// Output file receiving packed RGBA frames
    output: PathBuf,

    /// Requested resolution (WxH)
    #[arg(short, long, default_value = "640x480")]
    resolution: String,

    /// Requested device format (YUYV, MJPEG, NV12, ...)
    #[arg(short, long, default_value = "YUYV")]
    format: String,

    /// Number of frames to record (0 = until interrupted)
    #[arg(short = 'n', long, default_value = "0")]
    frames: u64,

    /// Pull rate limit in frames per second (0 = unlimited)
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Print recording metrics when done
    #[arg(short, long)]
    metrics: bool,
}

pub fn execute(args: Args, simulate: bool, json: bool) -> Result<(), CliError> {
    log::debug!("Executing record command: {:?}", args);

    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let frame_type = utils::parse_frame_type(&args.format)?;
    let term = utils::install_signal_handler()?;

    let config = HolderConfig::default()
        .with_capture(CaptureConfig::default().with_target_fps(args.fps));
    let session = Session::open(simulate, config)?;
    let holder = session.holder(args.id)?;

    holder.set_video_size(frame_type, width, height)?;
    let current = holder.current_size();
    if (current.width, current.height) != (width, height) || current.frame_type != frame_type {
        log::warn!(
            "Device {} settled on {} instead of {} {}x{}",
            args.id,
            current,
            frame_type,
            width,
            height
        );
    }
    holder.start()?;

    let surface = Arc::new(FileSurface::create(&args.output)?);
    if let Err(err) = holder.set_recording_binding(Some(surface.clone() as Arc<dyn PlatformSurface>))
    {
        holder.stop().ok();
        return Err(err.into());
    }
    log::info!(
        "Recording device {} ({}) to {}",
        args.id,
        current,
        args.output.display()
    );

    let stats = holder.capture_stats();
    let mut last_count = 0;
    let mut last_progress = Instant::now();
    let mut stalled = false;

    while !term.load(Ordering::Relaxed) {
        let count = holder.frame_count();
        if args.frames > 0 && count >= args.frames {
            break;
        }
        if count != last_count {
            last_count = count;
            last_progress = Instant::now();
        } else if last_progress.elapsed() >= STALL_TIMEOUT {
            stalled = true;
            break;
        }
        thread::sleep(POLL);
    }

    if term.load(Ordering::Relaxed) {
        log::info!("Interrupted, stopping recording");
    }

    holder.set_recording_binding(None)?;
    holder.stop()?;
    surface.flush()?;

    if stalled {
        return Err(CliError::Timeout(format!(
            "no frames from device {} for {} s",
            args.id,
            STALL_TIMEOUT.as_secs()
        )));
    }

    let metrics = stats
        .map(|stats| RecordMetrics::from_stats(args.id, surface.geometry(), &stats))
        .ok_or_else(|| CliError::General("recording never started".to_owned()))?;
    log::info!(
        "Wrote {} frames ({} captured) to {}",
        surface.frames(),
        metrics.frames,
        args.output.display()
    );

    if json {
        utils::print_json(&metrics)?;
    } else if args.metrics {
        println!("{}", metrics.to_text());
    }
    Ok(())
}
