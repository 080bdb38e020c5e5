// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use crate::frame_type::RawFrameType;
use std::fmt;

/// Frame intervals in 100ns units, as reported by UVC descriptors.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameIntervals {
    Stepwise { min: u32, max: u32, step: u32 },
    Discrete(Vec<u32>),
}

impl FrameIntervals {
    /// Frame rates implied by the intervals, fastest first.
    pub fn frame_rates(&self) -> Vec<f32> {
        let mut fps: Vec<f32> = match self {
            FrameIntervals::Stepwise { min, max, .. } => {
                [*min, *max].iter().filter_map(|iv| interval_fps(*iv)).collect()
            }
            FrameIntervals::Discrete(list) => {
                list.iter().filter_map(|iv| interval_fps(*iv)).collect()
            }
        };
        fps.sort_by(|a, b| b.total_cmp(a));
        fps.dedup();
        fps
    }
}

impl Default for FrameIntervals {
    fn default() -> Self {
        FrameIntervals::Discrete(Vec::new())
    }
}

fn interval_fps(interval: u32) -> Option<f32> {
    (interval > 0).then(|| 10_000_000.0 / interval as f32)
}

/// A video format supported by, or selected on, a device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoFormat {
    pub frame_type: RawFrameType,
    pub frame_index: i32,
    pub width: u32,
    pub height: u32,
    pub intervals: FrameIntervals,
    pub fps: Vec<f32>,
}

impl VideoFormat {
    pub fn new(frame_type: RawFrameType, width: u32, height: u32) -> Self {
        VideoFormat {
            frame_type,
            frame_index: 0,
            width,
            height,
            intervals: FrameIntervals::default(),
            fps: Vec::new(),
        }
    }

    pub fn with_index(self, frame_index: i32) -> Self {
        VideoFormat {
            frame_index,
            ..self
        }
    }

    /// Set the intervals and derive the frame-rate list from them.
    pub fn with_intervals(self, intervals: FrameIntervals) -> Self {
        let fps = intervals.frame_rates();
        VideoFormat {
            intervals,
            fps,
            ..self
        }
    }

    /// True when either dimension is zero, as reported before the driver
    /// has negotiated a size.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn max_fps(&self) -> Option<f32> {
        self.fps.iter().copied().reduce(f32::max)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}x{}", self.frame_type, self.width, self.height)?;
        if !self.fps.is_empty() {
            let rates: Vec<String> = self.fps.iter().map(|r| format!("{:.0}", r)).collect();
            write!(f, " @ {} fps", rates.join("/"))?;
        }
        Ok(())
    }
}
