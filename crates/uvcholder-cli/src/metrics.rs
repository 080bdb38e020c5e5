// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Serialize;
use uvcholder::capture::CaptureStats;

/// Summary of one recording
#[derive(Debug, Clone, Serialize)]
pub struct RecordMetrics {
    /// Device the frames came from
    pub device_id: i32,
    /// Recording geometry
    pub width: u32,
    pub height: u32,
    /// Frames posted to the recording surface
    pub frames: u64,
    /// RGBA bytes copied into the recording surface
    pub bytes: u64,
    /// Failed frame pulls (retried)
    pub pull_errors: u64,
    /// Recording duration in milliseconds
    pub duration_ms: u64,
    /// Average posted frames per second
    pub fps: f64,
    /// Average bandwidth in megabits per second
    pub bandwidth_mbps: f64,
}

impl RecordMetrics {
    pub fn from_stats(device_id: i32, (width, height): (u32, u32), stats: &CaptureStats) -> Self {
        let duration = stats.elapsed();
        let secs = duration.as_secs_f64();
        let bytes = stats.bytes();
        RecordMetrics {
            device_id,
            width,
            height,
            frames: stats.frame_count(),
            bytes,
            pull_errors: stats.pull_errors(),
            duration_ms: duration.as_millis() as u64,
            fps: stats.frame_rate(),
            bandwidth_mbps: if secs > 0.0 {
                (bytes as f64 * 8.0) / (secs * 1_000_000.0)
            } else {
                0.0
            },
        }
    }

    /// Human readable multi-line summary
    pub fn to_text(&self) -> String {
        format!(
            "Device:      {}\n\
             Geometry:    {}x{}\n\
             Frames:      {}\n\
             Bytes:       {}\n\
             Pull errors: {}\n\
             Duration:    {:.2} s\n\
             Frame rate:  {:.2} fps\n\
             Bandwidth:   {:.2} Mbps",
            self.device_id,
            self.width,
            self.height,
            self.frames,
            self.bytes,
            self.pull_errors,
            self.duration_ms as f64 / 1000.0,
            self.fps,
            self.bandwidth_mbps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_all_fields() {
        let metrics = RecordMetrics {
            device_id: 1,
            width: 640,
            height: 480,
            frames: 30,
            bytes: 30 * 640 * 480 * 4,
            pull_errors: 0,
            duration_ms: 1000,
            fps: 30.0,
            bandwidth_mbps: 294.9,
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["frames"], 30);
        assert_eq!(json["width"], 640);
        assert_eq!(json["fps"], 30.0);

        let text = metrics.to_text();
        assert!(text.contains("Frames:      30"));
        assert!(text.contains("640x480"));
    }
}
