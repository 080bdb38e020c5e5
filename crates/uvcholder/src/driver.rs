// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    controls::{ControlId, ControlInfo},
    format::VideoFormat,
    frame_type::RawFrameType,
    surface::PlatformSurface,
    DeviceId, Error,
};
use std::fmt;

/// Connection state of a device as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DeviceState {
    #[default]
    Uninitialized,
    Disconnected,
    Connected,
    Streaming,
}

impl DeviceState {
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => DeviceState::Disconnected,
            1 => DeviceState::Connected,
            2 => DeviceState::Streaming,
            _ => DeviceState::Uninitialized,
        }
    }

    pub const fn as_raw(self) -> i32 {
        match self {
            DeviceState::Uninitialized => -1,
            DeviceState::Disconnected => 0,
            DeviceState::Connected => 1,
            DeviceState::Streaming => 2,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceState::Uninitialized => write!(f, "uninitialized"),
            DeviceState::Disconnected => write!(f, "disconnected"),
            DeviceState::Connected => write!(f, "connected"),
            DeviceState::Streaming => write!(f, "streaming"),
        }
    }
}

/// USB descriptor information of an attached device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub bcd_usb: u16,
    pub vendor_id: u32,
    pub product_id: u32,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub name: String,
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
}

/// Parameters of a single frame pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    /// Encoding the driver should convert to, `Unknown` for the native one.
    pub frame_type: RawFrameType,
    pub width: u32,
    pub height: u32,
}

/// Description of a pulled frame, the bytes are in the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_type: RawFrameType,
    pub width: u32,
    pub height: u32,
    pub len: usize,
    pub pts_us: i64,
    pub flags: u32,
}

/// Outcome of a non-blocking frame pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Frame(FrameInfo),
    /// Nothing ready yet; not an error.
    NotReady,
}

/// Column-major 4x4 model-view-projection matrix.
pub type Transform = [f32; 16];

pub const IDENTITY: Transform = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// The device driver operations used by holders.
///
/// Implemented over the native driver library by
/// [`NativeDriver`](crate::native::NativeDriver) and in software by
/// [`SimulatedDevice`](crate::sim::SimulatedDevice). Driver rejections are
/// reported as [`Error::Driver`] carrying the driver's status.
pub trait DeviceDriver: Send + Sync {
    fn device_state(&self, id: DeviceId) -> DeviceState;

    fn device_info(&self, id: DeviceId) -> Result<DeviceInfo, Error>;

    fn set_config(&self, id: DeviceId, enabled: i32, use_first_config: bool) -> Result<(), Error>;

    /// Request a new format. The driver may settle on a different size, so
    /// callers re-read [`current_size`](Self::current_size) afterwards.
    fn resize(
        &self,
        id: DeviceId,
        frame_type: RawFrameType,
        width: u32,
        height: u32,
    ) -> Result<(), Error>;

    fn start(&self, id: DeviceId) -> Result<(), Error>;

    fn stop(&self, id: DeviceId) -> Result<(), Error>;

    /// Supported format at `index` together with the total count. Past the
    /// last entry this returns [`Error::IndexOutOfRange`].
    fn supported_size(&self, id: DeviceId, index: i32) -> Result<(usize, VideoFormat), Error>;

    fn current_size(&self, id: DeviceId) -> Result<VideoFormat, Error>;

    /// Camera-terminal control bitmask.
    fn ctrl_supports(&self, id: DeviceId) -> u64;

    /// Processing-unit control bitmask.
    fn proc_supports(&self, id: DeviceId) -> u64;

    fn control_info(&self, id: DeviceId, control: ControlId) -> Result<ControlInfo, Error>;

    fn control_value(&self, id: DeviceId, control: ControlId) -> Result<i32, Error>;

    fn set_control_value(&self, id: DeviceId, control: ControlId, value: i32)
        -> Result<(), Error>;

    /// Pull one frame into `buf` without blocking.
    fn get_frame(&self, id: DeviceId, request: &FrameRequest, buf: &mut [u8])
        -> Result<Pull, Error>;

    /// Register the surface the driver composites frames into, or clear it.
    fn set_surface(
        &self,
        id: DeviceId,
        surface: Option<&dyn PlatformSurface>,
        mvp: &Transform,
    ) -> Result<(), Error>;

    fn set_mvp_matrix(&self, id: DeviceId, mvp: &Transform) -> Result<(), Error>;
}

/// Receiver of device attach and detach events.
pub trait OnDeviceEvent: Send + Sync {
    fn on_device_event(&self, id: DeviceId, attached: bool);
}
