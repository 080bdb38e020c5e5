// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use crate::frame_type::RawFrameType;
use std::time::Duration;

/// Settings of the recording pull loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// pull rate limit in frames per second, 0 disables the limit
    target_fps: u32,

    /// sleep between attempts while rate limited or while no frame is ready
    idle_backoff: Duration,

    /// recording geometry used when the current format reports no size
    fallback_width: u32,
    fallback_height: u32,

    /// encoding requested from the driver on each pull
    pull_encoding: RawFrameType,
}

impl CaptureConfig {
    pub fn with_target_fps(self, target_fps: u32) -> CaptureConfig {
        CaptureConfig { target_fps, ..self }
    }

    pub fn with_idle_backoff(self, idle_backoff: Duration) -> CaptureConfig {
        CaptureConfig {
            idle_backoff,
            ..self
        }
    }

    pub fn with_fallback_size(self, width: u32, height: u32) -> CaptureConfig {
        CaptureConfig {
            fallback_width: width,
            fallback_height: height,
            ..self
        }
    }

    pub fn with_pull_encoding(self, pull_encoding: RawFrameType) -> CaptureConfig {
        CaptureConfig {
            pull_encoding,
            ..self
        }
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn idle_backoff(&self) -> Duration {
        self.idle_backoff
    }

    pub fn fallback_size(&self) -> (u32, u32) {
        (self.fallback_width, self.fallback_height)
    }

    pub fn pull_encoding(&self) -> RawFrameType {
        self.pull_encoding
    }

    /// Minimum time between two accepted frames.
    pub fn frame_period(&self) -> Duration {
        match self.target_fps {
            0 => Duration::ZERO,
            fps => Duration::from_nanos(1_000_000_000 / u64::from(fps)),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> CaptureConfig {
        CaptureConfig {
            target_fps: 30,
            idle_backoff: Duration::from_millis(1),
            fallback_width: 1280,
            fallback_height: 720,
            pull_encoding: RawFrameType::Rgbx,
        }
    }
}

/// Settings applied when a holder is created for a newly attached device.
#[derive(Debug, Clone, PartialEq)]
pub struct HolderConfig {
    /// initial format requested from the device
    frame_type: RawFrameType,
    width: u32,
    height: u32,

    capture: CaptureConfig,
}

impl HolderConfig {
    pub fn with_format(self, frame_type: RawFrameType) -> HolderConfig {
        HolderConfig { frame_type, ..self }
    }

    pub fn with_resolution(self, width: u32, height: u32) -> HolderConfig {
        HolderConfig {
            width,
            height,
            ..self
        }
    }

    pub fn with_capture(self, capture: CaptureConfig) -> HolderConfig {
        HolderConfig { capture, ..self }
    }

    pub fn frame_type(&self) -> RawFrameType {
        self.frame_type
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn capture(&self) -> &CaptureConfig {
        &self.capture
    }
}

impl Default for HolderConfig {
    fn default() -> HolderConfig {
        HolderConfig {
            frame_type: RawFrameType::Mjpeg,
            width: 640,
            height: 480,
            capture: CaptureConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HolderConfig::default();
        assert_eq!(config.frame_type(), RawFrameType::Mjpeg);
        assert_eq!(config.resolution(), (640, 480));
        assert_eq!(config.capture().target_fps(), 30);
        assert_eq!(config.capture().fallback_size(), (1280, 720));
        assert_eq!(config.capture().pull_encoding(), RawFrameType::Rgbx);
        assert_eq!(config.capture().idle_backoff(), Duration::from_millis(1));
    }

    #[test]
    fn test_frame_period() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.frame_period(), Duration::from_nanos(33_333_333));
        assert_eq!(
            capture.with_target_fps(0).frame_period(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_builders() {
        let config = HolderConfig::default()
            .with_format(RawFrameType::Yuyv)
            .with_resolution(1920, 1080)
            .with_capture(CaptureConfig::default().with_target_fps(60));
        assert_eq!(config.frame_type(), RawFrameType::Yuyv);
        assert_eq!(config.resolution(), (1920, 1080));
        assert_eq!(config.capture().target_fps(), 60);
    }
}
