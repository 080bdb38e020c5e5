// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use crate::Error;
use std::{fmt, str::FromStr};
use uvcholder_sys as ffi;

/// Pixel encoding of a frame as tagged by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RawFrameType {
    #[default]
    Unknown,
    Yuyv,
    Nv21,
    Nv12,
    Rgb565,
    Rgbx,
    Mjpeg,
    H264,
}

impl RawFrameType {
    pub const ALL: [RawFrameType; 7] = [
        RawFrameType::Yuyv,
        RawFrameType::Nv21,
        RawFrameType::Nv12,
        RawFrameType::Rgb565,
        RawFrameType::Rgbx,
        RawFrameType::Mjpeg,
        RawFrameType::H264,
    ];

    /// Map a driver value, unrecognised values become `Unknown`.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_YUYV => RawFrameType::Yuyv,
            ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_NV21 => RawFrameType::Nv21,
            ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_NV12 => RawFrameType::Nv12,
            ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_RGB565 => RawFrameType::Rgb565,
            ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_RGBX => RawFrameType::Rgbx,
            ffi::uvc_raw_frame_RAW_FRAME_MJPEG => RawFrameType::Mjpeg,
            ffi::uvc_raw_frame_RAW_FRAME_H264 => RawFrameType::H264,
            _ => RawFrameType::Unknown,
        }
    }

    pub const fn as_raw(self) -> u32 {
        match self {
            RawFrameType::Unknown => ffi::uvc_raw_frame_RAW_FRAME_UNKNOWN,
            RawFrameType::Yuyv => ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_YUYV,
            RawFrameType::Nv21 => ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_NV21,
            RawFrameType::Nv12 => ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_NV12,
            RawFrameType::Rgb565 => ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_RGB565,
            RawFrameType::Rgbx => ffi::uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_RGBX,
            RawFrameType::Mjpeg => ffi::uvc_raw_frame_RAW_FRAME_MJPEG,
            RawFrameType::H264 => ffi::uvc_raw_frame_RAW_FRAME_H264,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RawFrameType::Unknown => "UNKNOWN",
            RawFrameType::Yuyv => "YUYV",
            RawFrameType::Nv21 => "NV21",
            RawFrameType::Nv12 => "NV12",
            RawFrameType::Rgb565 => "RGB565",
            RawFrameType::Rgbx => "RGBX",
            RawFrameType::Mjpeg => "MJPEG",
            RawFrameType::H264 => "H264",
        }
    }

    pub const fn is_compressed(self) -> bool {
        matches!(self, RawFrameType::Mjpeg | RawFrameType::H264)
    }

    /// Size in bytes of one uncompressed frame, `None` for compressed or
    /// unknown encodings.
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            RawFrameType::Yuyv | RawFrameType::Rgb565 => pixels.checked_mul(2),
            RawFrameType::Nv21 | RawFrameType::Nv12 => pixels.checked_mul(3).map(|n| n / 2),
            RawFrameType::Rgbx => pixels.checked_mul(4),
            _ => None,
        }
    }
}

impl fmt::Display for RawFrameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<u32> for RawFrameType {
    fn from(raw: u32) -> Self {
        RawFrameType::from_raw(raw)
    }
}

impl From<RawFrameType> for u32 {
    fn from(frame_type: RawFrameType) -> u32 {
        frame_type.as_raw()
    }
}

impl FromStr for RawFrameType {
    type Err = Error;

    /// Accepts the encoding name in any case, with `MJPG` and `RGBA` as
    /// aliases, or a raw driver value in hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        if let Some(hex) = upper.strip_prefix("0X") {
            let raw = u32::from_str_radix(hex, 16)
                .map_err(|e| Error::InvalidArgument(format!("{}: {}", s, e)))?;
            return match RawFrameType::from_raw(raw) {
                RawFrameType::Unknown => Err(Error::InvalidArgument(format!(
                    "unknown frame type 0x{:08x}",
                    raw
                ))),
                known => Ok(known),
            };
        }
        match upper.as_str() {
            "MJPG" => return Ok(RawFrameType::Mjpeg),
            "RGBA" => return Ok(RawFrameType::Rgbx),
            _ => {}
        }
        RawFrameType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == upper)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown frame type '{}'", s)))
    }
}
