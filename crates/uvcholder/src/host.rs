// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Host boundary
//!
//! The embedding application sees two things: a stream of [`DeviceEvent`]s
//! delivered through a [`HostNotifier`], and the id-keyed entry points of
//! [`HostBridge`]. Commands return `0` on success or a negative status,
//! queries return the value or the negative status as `Err`. Nothing
//! panics across this boundary.

use crate::{
    capture::FrameCallback,
    controls::{ControlId, ControlInfo},
    driver::{DeviceInfo, Transform},
    format::VideoFormat,
    frame_type::RawFrameType,
    registry::DeviceRegistry,
    surface::PlatformSurface,
    DeviceId, Error,
};
use log::debug;
use std::sync::{mpsc, Arc, Mutex};

/// An attach or detach the registry has finished processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEvent {
    pub device_id: DeviceId,
    pub attached: bool,
}

/// Receiver of registry events on the host side.
pub trait HostNotifier: Send + Sync {
    fn notify(&self, event: DeviceEvent);
}

/// Delivers events over an mpsc channel, dropping them once the receiver
/// is gone.
pub struct ChannelNotifier {
    sender: Mutex<mpsc::Sender<DeviceEvent>>,
}

impl HostNotifier for ChannelNotifier {
    fn notify(&self, event: DeviceEvent) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if sender.send(event).is_err() {
            debug!("host receiver gone, dropped {:?}", event);
        }
    }
}

/// Create a notifier and the receiving end of its channel.
pub fn channel() -> (ChannelNotifier, mpsc::Receiver<DeviceEvent>) {
    let (sender, receiver) = mpsc::channel();
    (
        ChannelNotifier {
            sender: Mutex::new(sender),
        },
        receiver,
    )
}

fn status(result: Result<(), Error>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            debug!("host call failed: {}", err);
            err.status()
        }
    }
}

fn value<T>(result: Result<T, Error>) -> Result<T, i32> {
    result.map_err(|err| {
        debug!("host query failed: {}", err);
        err.status()
    })
}

/// Integer-status entry points keyed by device id.
#[derive(Debug, Clone)]
pub struct HostBridge {
    registry: Arc<DeviceRegistry>,
}

impl HostBridge {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        HostBridge { registry }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn is_available(&self, id: DeviceId) -> bool {
        self.registry.is_available(id)
    }

    /// Raw device state value, see [`DeviceState::as_raw`](crate::driver::DeviceState::as_raw).
    pub fn device_state(&self, id: DeviceId) -> i32 {
        self.registry.device_state(id).as_raw()
    }

    pub fn device_info(&self, id: DeviceId) -> Result<DeviceInfo, i32> {
        value(self.registry.device_info(id))
    }

    pub fn set_config(&self, id: DeviceId, enabled: i32, use_first_config: bool) -> i32 {
        status(
            self.registry
                .holder(id)
                .and_then(|h| h.set_config(enabled, use_first_config)),
        )
    }

    pub fn start(&self, id: DeviceId) -> i32 {
        status(self.registry.holder(id).and_then(|h| h.start()))
    }

    /// Stop streaming. Succeeds when no holder exists for `id`.
    pub fn stop(&self, id: DeviceId) -> i32 {
        match self.registry.holder(id) {
            Ok(holder) => status(holder.stop()),
            Err(_) => 0,
        }
    }

    /// Resize using the driver's raw frame type value. Waits for the
    /// registry lock.
    pub fn set_video_size(&self, id: DeviceId, frame_type: u32, width: u32, height: u32) -> i32 {
        let frame_type = RawFrameType::from_raw(frame_type);
        status(
            self.registry
                .with_holder(id, |h| h.set_video_size(frame_type, width, height)),
        )
    }

    /// Current format, waiting for the registry lock.
    pub fn current_size(&self, id: DeviceId) -> Result<VideoFormat, i32> {
        value(self.registry.with_holder(id, |h| Ok(h.current_size())))
    }

    pub fn supported_size_count(&self, id: DeviceId) -> Result<usize, i32> {
        value(self.registry.holder(id).map(|h| h.supported_sizes().len()))
    }

    pub fn supported_size(&self, id: DeviceId, index: i32) -> Result<VideoFormat, i32> {
        value(self.registry.holder(id).and_then(|h| h.supported_size(index)))
    }

    /// Supported controls as a sorted list of identifiers.
    pub fn supported_controls(&self, id: DeviceId) -> Result<Vec<ControlId>, i32> {
        value(
            self.registry
                .holder(id)
                .map(|h| h.supported_controls().ids().to_vec()),
        )
    }

    pub fn ctrl_supports(&self, id: DeviceId) -> Result<u64, i32> {
        value(self.registry.holder(id).map(|h| h.ctrl_supports()))
    }

    pub fn proc_supports(&self, id: DeviceId) -> Result<u64, i32> {
        value(self.registry.holder(id).map(|h| h.proc_supports()))
    }

    pub fn control_info(&self, id: DeviceId, control: ControlId) -> Result<ControlInfo, i32> {
        value(self.registry.holder(id).and_then(|h| h.control_info(control)))
    }

    pub fn control_value(&self, id: DeviceId, control: ControlId) -> Result<i32, i32> {
        value(self.registry.holder(id).and_then(|h| h.control_value(control)))
    }

    pub fn set_control_value(&self, id: DeviceId, control: ControlId, value: i32) -> i32 {
        status(
            self.registry
                .holder(id)
                .and_then(|h| h.set_control_value(control, value)),
        )
    }

    pub fn set_preview_surface(
        &self,
        id: DeviceId,
        surface: Option<Arc<dyn PlatformSurface>>,
    ) -> i32 {
        status(
            self.registry
                .holder(id)
                .and_then(|h| h.set_preview_binding(surface)),
        )
    }

    pub fn set_recording_surface(
        &self,
        id: DeviceId,
        surface: Option<Arc<dyn PlatformSurface>>,
    ) -> i32 {
        status(
            self.registry
                .holder(id)
                .and_then(|h| h.set_recording_binding(surface)),
        )
    }

    pub fn set_software_preview_surface(
        &self,
        id: DeviceId,
        surface: Option<Arc<dyn PlatformSurface>>,
    ) -> i32 {
        status(
            self.registry
                .holder(id)
                .and_then(|h| h.set_software_preview_binding(surface)),
        )
    }

    pub fn set_frame_callback(&self, id: DeviceId, callback: Option<FrameCallback>) -> i32 {
        status(
            self.registry
                .holder(id)
                .and_then(|h| h.set_frame_callback(callback)),
        )
    }

    /// Open a pull session using the driver's raw frame type value. Waits
    /// for the registry lock.
    pub fn start_capture(&self, id: DeviceId, frame_type: u32, width: u32, height: u32) -> i32 {
        let frame_type = RawFrameType::from_raw(frame_type);
        status(
            self.registry
                .with_holder(id, |h| h.start_capture(frame_type, width, height)),
        )
    }

    /// Close the pull session. Succeeds when no holder exists for `id`.
    pub fn stop_capture(&self, id: DeviceId) -> i32 {
        match self.registry.holder(id) {
            Ok(holder) => status(holder.stop_capture()),
            Err(_) => 0,
        }
    }

    pub fn set_mvp_matrix(&self, id: DeviceId, mvp: Option<Transform>) -> i32 {
        status(self.registry.holder(id).and_then(|h| h.set_mvp_matrix(mvp)))
    }

    /// Frames delivered by the capture loop, 0 without a holder.
    pub fn frame_count(&self, id: DeviceId) -> u64 {
        self.registry
            .holder(id)
            .map(|h| h.frame_count())
            .unwrap_or(0)
    }

    /// Recording frame rate, 0 without a holder or before the first frame.
    pub fn frame_rate(&self, id: DeviceId) -> f64 {
        self.registry
            .holder(id)
            .map(|h| h.frame_rate())
            .unwrap_or(0.0)
    }

    pub fn terminate_all(&self) {
        self.registry.terminate_all();
    }
}
