// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Software stand-ins for the driver and for platform surfaces.
//!
//! [`SimulatedDevice`] implements [`DeviceDriver`] for any number of virtual
//! cameras producing a moving colour-bar pattern, and [`MemorySurface`]
//! implements [`PlatformSurface`] over a heap buffer. Both count the calls
//! made on them so tests can check ordering and balance.
#![forbid(unsafe_code)]

use crate::{
    controls::{
        ControlCapabilities, ControlId, ControlInfo, CTRL_AE, CTRL_AE_ABS, CTRL_FOCUS_AUTO,
        CTRL_PAN_ABS, CTRL_TILT_ABS, CTRL_ZOOM_ABS, PU_BRIGHTNESS, PU_CONTRAST, PU_GAIN,
        PU_MASK, PU_SATURATION, PU_WB_TEMP_AUTO,
    },
    driver::{
        DeviceDriver, DeviceInfo, DeviceState, FrameInfo, FrameRequest, OnDeviceEvent, Pull,
        Transform, IDENTITY,
    },
    format::{FrameIntervals, VideoFormat},
    frame_type::RawFrameType,
    surface::{PlatformSurface, WindowBuffer},
    DeviceId, Error,
};
use log::{debug, trace};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering},
        Mutex, MutexGuard, Weak,
    },
    thread,
    time::Duration,
};

const ENODEV: i32 = -19;
const EINVAL: i32 = -22;
const ERANGE: i32 = -34;
const EOVERFLOW: i32 = -75;

// 0x800 is the combined pan/tilt bit
const SIM_CTRLS: u64 = CTRL_AE | CTRL_AE_ABS | 0x800 | CTRL_ZOOM_ABS | CTRL_FOCUS_AUTO;
const SIM_PROCS: u64 = PU_BRIGHTNESS | PU_CONTRAST | PU_SATURATION | PU_GAIN | PU_WB_TEMP_AUTO;

const BRIGHTNESS: ControlId = PU_BRIGHTNESS | PU_MASK;
const CONTRAST: ControlId = PU_CONTRAST | PU_MASK;
const SATURATION: ControlId = PU_SATURATION | PU_MASK;
const GAIN: ControlId = PU_GAIN | PU_MASK;

// white, yellow, cyan, green, magenta, red, blue, black
const BARS: [[u8; 3]; 8] = [
    [235, 235, 235],
    [235, 235, 16],
    [16, 235, 235],
    [16, 235, 16],
    [235, 16, 235],
    [235, 16, 16],
    [16, 16, 235],
    [16, 16, 16],
];

/// Frame period of the simulated sensor in microseconds.
const PTS_STEP_US: i64 = 33_333;

fn supported_formats() -> Vec<VideoFormat> {
    vec![
        VideoFormat::new(RawFrameType::Yuyv, 640, 480)
            .with_index(1)
            .with_intervals(FrameIntervals::Discrete(vec![333_333, 666_666])),
        VideoFormat::new(RawFrameType::Yuyv, 1280, 720)
            .with_index(2)
            .with_intervals(FrameIntervals::Discrete(vec![1_000_000])),
        VideoFormat::new(RawFrameType::Mjpeg, 640, 480)
            .with_index(1)
            .with_intervals(FrameIntervals::Stepwise {
                min: 166_666,
                max: 333_333,
                step: 166_667,
            }),
        VideoFormat::new(RawFrameType::Mjpeg, 1920, 1080)
            .with_index(2)
            .with_intervals(FrameIntervals::Discrete(vec![333_333])),
    ]
}

fn control_range(control: ControlId) -> (i32, i32, i32, i32) {
    // (min, max, resolution, default)
    match control {
        CTRL_AE => (1, 8, 1, 8),
        CTRL_AE_ABS => (3, 2047, 1, 166),
        CTRL_PAN_ABS | CTRL_TILT_ABS => (-36000, 36000, 3600, 0),
        CTRL_ZOOM_ABS => (100, 500, 1, 100),
        BRIGHTNESS => (-64, 64, 1, 0),
        CONTRAST => (0, 95, 1, 32),
        SATURATION => (0, 100, 1, 64),
        GAIN => (0, 100, 1, 0),
        _ => (0, 1, 1, 1),
    }
}

struct Camera {
    state: DeviceState,
    current: VideoFormat,
    controls: Vec<ControlInfo>,
    frames: u64,
    config: Option<(i32, bool)>,
    surface_bound: bool,
}

impl Camera {
    fn new(current: VideoFormat) -> Self {
        let controls = ControlCapabilities::from_masks(SIM_CTRLS, SIM_PROCS)
            .iter()
            .map(|control| {
                let (min, max, resolution, default) = control_range(control);
                ControlInfo {
                    control,
                    initialized: true,
                    has_min_max: true,
                    default,
                    current: default,
                    resolution,
                    min,
                    max,
                }
            })
            .collect();
        Camera {
            state: DeviceState::Connected,
            current,
            controls,
            frames: 0,
            config: None,
            surface_bound: false,
        }
    }

    fn control_mut(&mut self, control: ControlId) -> Result<&mut ControlInfo, Error> {
        self.controls
            .iter_mut()
            .find(|info| info.control == control)
            .ok_or(Error::Driver(EINVAL))
    }
}

/// A software UVC driver serving colour-bar cameras.
///
/// Cameras start in the connected state with a YUYV 640x480 format. Frames
/// are only produced while a camera is streaming. RGBX pulls are served
/// directly unless disabled with
/// [`with_rgbx_output`](SimulatedDevice::with_rgbx_output), in which case
/// the camera's own encoding is returned.
pub struct SimulatedDevice {
    formats: Vec<VideoFormat>,
    cameras: Mutex<HashMap<DeviceId, Camera>>,
    listener: Mutex<Option<Weak<dyn OnDeviceEvent>>>,
    rgbx_output: bool,
    pull_latency: Duration,
    not_ready: AtomicU64,
    pull_error: AtomicI32,
    pulls: AtomicU64,
    active_pulls: AtomicUsize,
    max_active_pulls: AtomicUsize,
    last_mvp: Mutex<Transform>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        SimulatedDevice {
            formats: supported_formats(),
            cameras: Mutex::new(HashMap::new()),
            listener: Mutex::new(None),
            rgbx_output: true,
            pull_latency: Duration::ZERO,
            not_ready: AtomicU64::new(0),
            pull_error: AtomicI32::new(0),
            pulls: AtomicU64::new(0),
            active_pulls: AtomicUsize::new(0),
            max_active_pulls: AtomicUsize::new(0),
            last_mvp: Mutex::new(IDENTITY),
        }
    }

    /// Add a camera without emitting an attach event.
    pub fn with_camera(mut self, id: DeviceId) -> Self {
        let current = self.formats[0].clone();
        self.cameras
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Camera::new(current));
        self
    }

    pub fn with_rgbx_output(self, rgbx_output: bool) -> Self {
        SimulatedDevice {
            rgbx_output,
            ..self
        }
    }

    /// Answer the next `count` pulls with "no frame ready".
    pub fn with_not_ready(self, count: u64) -> Self {
        self.not_ready.store(count, Ordering::SeqCst);
        self
    }

    /// Delay every pull, emulating a driver waiting on USB transfers.
    pub fn with_pull_latency(self, pull_latency: Duration) -> Self {
        SimulatedDevice {
            pull_latency,
            ..self
        }
    }

    /// Register the receiver of attach and detach events.
    pub fn subscribe(&self, listener: Weak<dyn OnDeviceEvent>) {
        *lock(&self.listener) = Some(listener);
    }

    /// Plug in a camera and notify the listener.
    pub fn attach(&self, id: DeviceId) {
        let current = self.formats[0].clone();
        lock(&self.cameras)
            .entry(id)
            .or_insert_with(|| Camera::new(current));
        debug!("SimulatedDevice::attach() - device {}", id);
        self.notify(id, true);
    }

    /// Unplug a camera and notify the listener.
    pub fn detach(&self, id: DeviceId) {
        lock(&self.cameras).remove(&id);
        debug!("SimulatedDevice::detach() - device {}", id);
        self.notify(id, false);
    }

    fn notify(&self, id: DeviceId, attached: bool) {
        let listener = lock(&self.listener).as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.on_device_event(id, attached);
        }
    }

    /// Make every pull fail with the given driver status, `None` to recover.
    pub fn set_pull_error(&self, code: Option<i32>) {
        self.pull_error.store(code.unwrap_or(0), Ordering::SeqCst);
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = lock(&self.cameras).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Total frame pulls, including ones answered with "not ready".
    pub fn pulls(&self) -> u64 {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Highest number of pulls that were in progress at the same time.
    pub fn max_concurrent_pulls(&self) -> usize {
        self.max_active_pulls.load(Ordering::SeqCst)
    }

    pub fn last_mvp(&self) -> Transform {
        *lock(&self.last_mvp)
    }

    pub fn surface_bound(&self, id: DeviceId) -> bool {
        lock(&self.cameras)
            .get(&id)
            .map(|cam| cam.surface_bound)
            .unwrap_or(false)
    }

    pub fn config(&self, id: DeviceId) -> Option<(i32, bool)> {
        lock(&self.cameras).get(&id).and_then(|cam| cam.config)
    }

    fn with_cam<T>(
        &self,
        id: DeviceId,
        f: impl FnOnce(&mut Camera) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut cameras = lock(&self.cameras);
        let cam = cameras.get_mut(&id).ok_or(Error::Driver(ENODEV))?;
        f(cam)
    }

    fn pull(&self, id: DeviceId, request: &FrameRequest, buf: &mut [u8]) -> Result<Pull, Error> {
        if !self.pull_latency.is_zero() {
            thread::sleep(self.pull_latency);
        }

        let code = self.pull_error.load(Ordering::SeqCst);
        if code != 0 {
            return Err(Error::Driver(code));
        }

        if self
            .not_ready
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(Pull::NotReady);
        }

        let rgbx_output = self.rgbx_output;
        self.with_cam(id, |cam| {
            if cam.state != DeviceState::Streaming {
                return Ok(Pull::NotReady);
            }
            let (width, height) = (cam.current.width, cam.current.height);
            let frame_type = match request.frame_type {
                RawFrameType::Rgbx if rgbx_output => RawFrameType::Rgbx,
                _ => cam.current.frame_type,
            };
            cam.frames += 1;
            let shift = (cam.frames / 30) as usize;

            let len = match frame_type {
                RawFrameType::Rgbx => {
                    let len = width as usize * height as usize * 4;
                    let dst = buf.get_mut(..len).ok_or(Error::Driver(EOVERFLOW))?;
                    fill_rgbx(dst, width as usize, shift);
                    len
                }
                RawFrameType::Yuyv => {
                    let len = width as usize * height as usize * 2;
                    let dst = buf.get_mut(..len).ok_or(Error::Driver(EOVERFLOW))?;
                    fill_yuyv(dst, width as usize, shift);
                    len
                }
                _ => {
                    // minimal JPEG framing around the frame number
                    let mut data = vec![0xFF, 0xD8];
                    data.extend_from_slice(&cam.frames.to_be_bytes());
                    data.extend_from_slice(&[0xFF, 0xD9]);
                    let dst = buf.get_mut(..data.len()).ok_or(Error::Driver(EOVERFLOW))?;
                    dst.copy_from_slice(&data);
                    data.len()
                }
            };
            trace!("SimulatedDevice::pull() - device {} frame {}", id, cam.frames);

            Ok(Pull::Frame(FrameInfo {
                frame_type,
                width,
                height,
                len,
                pts_us: cam.frames as i64 * PTS_STEP_US,
                flags: 0,
            }))
        })
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        SimulatedDevice::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn bar(x: usize, width: usize, shift: usize) -> [u8; 3] {
    BARS[(x * BARS.len() / width.max(1) + shift) % BARS.len()]
}

fn fill_rgbx(dst: &mut [u8], width: usize, shift: usize) {
    let pitch = width * 4;
    if pitch == 0 {
        return;
    }
    let mut rows = dst.chunks_exact_mut(pitch);
    let Some(first) = rows.next() else {
        return;
    };
    for (x, px) in first.chunks_exact_mut(4).enumerate() {
        let [r, g, b] = bar(x, width, shift);
        px.copy_from_slice(&[r, g, b, 255]);
    }
    let first = first.to_vec();
    for row in rows {
        row.copy_from_slice(&first);
    }
}

fn fill_yuyv(dst: &mut [u8], width: usize, shift: usize) {
    let pitch = width * 2;
    if pitch == 0 {
        return;
    }
    let mut rows = dst.chunks_exact_mut(pitch);
    let Some(first) = rows.next() else {
        return;
    };
    for (pair, group) in first.chunks_exact_mut(4).enumerate() {
        let [r, g, b] = bar(pair * 2, width, shift);
        let (r, g, b) = (r as i32, g as i32, b as i32);
        let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
        let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
        let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
        let (y, u, v) = (
            y.clamp(0, 255) as u8,
            u.clamp(0, 255) as u8,
            v.clamp(0, 255) as u8,
        );
        group.copy_from_slice(&[y, u, y, v]);
    }
    let first = first.to_vec();
    for row in rows {
        row.copy_from_slice(&first);
    }
}

impl DeviceDriver for SimulatedDevice {
    fn device_state(&self, id: DeviceId) -> DeviceState {
        lock(&self.cameras)
            .get(&id)
            .map(|cam| cam.state)
            .unwrap_or(DeviceState::Disconnected)
    }

    fn device_info(&self, id: DeviceId) -> Result<DeviceInfo, Error> {
        self.with_cam(id, |_| {
            Ok(DeviceInfo {
                bcd_usb: 0x0200,
                vendor_id: 0x1d6b,
                product_id: 0x0100 + id as u32,
                device_class: 0xef,
                device_subclass: 0x02,
                device_protocol: 0x01,
                name: format!("/dev/bus/usb/001/{:03}", id),
                manufacturer: "Simulated".to_owned(),
                product: "Colour Bar Camera".to_owned(),
                serial: format!("SIM{:04}", id),
            })
        })
    }

    fn set_config(&self, id: DeviceId, enabled: i32, use_first_config: bool) -> Result<(), Error> {
        self.with_cam(id, |cam| {
            cam.config = Some((enabled, use_first_config));
            Ok(())
        })
    }

    fn resize(
        &self,
        id: DeviceId,
        frame_type: RawFrameType,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        let wanted = width as i64 * height as i64;
        let chosen = self
            .formats
            .iter()
            .filter(|f| f.frame_type == frame_type)
            .min_by_key(|f| (f.width as i64 * f.height as i64 - wanted).abs())
            .cloned()
            .ok_or(Error::Driver(EINVAL))?;
        self.with_cam(id, |cam| {
            debug!(
                "SimulatedDevice::resize() - device {} asked {} {}x{}, using {}",
                id, frame_type, width, height, chosen
            );
            cam.current = chosen;
            Ok(())
        })
    }

    fn start(&self, id: DeviceId) -> Result<(), Error> {
        self.with_cam(id, |cam| {
            cam.state = DeviceState::Streaming;
            Ok(())
        })
    }

    fn stop(&self, id: DeviceId) -> Result<(), Error> {
        self.with_cam(id, |cam| {
            cam.state = DeviceState::Connected;
            Ok(())
        })
    }

    fn supported_size(&self, id: DeviceId, index: i32) -> Result<(usize, VideoFormat), Error> {
        self.with_cam(id, |_| Ok(()))?;
        let count = self.formats.len();
        usize::try_from(index)
            .ok()
            .and_then(|i| self.formats.get(i))
            .map(|f| (count, f.clone()))
            .ok_or(Error::IndexOutOfRange { index, count })
    }

    fn current_size(&self, id: DeviceId) -> Result<VideoFormat, Error> {
        self.with_cam(id, |cam| Ok(cam.current.clone()))
    }

    fn ctrl_supports(&self, id: DeviceId) -> u64 {
        self.with_cam(id, |_| Ok(SIM_CTRLS)).unwrap_or(0)
    }

    fn proc_supports(&self, id: DeviceId) -> u64 {
        self.with_cam(id, |_| Ok(SIM_PROCS)).unwrap_or(0)
    }

    fn control_info(&self, id: DeviceId, control: ControlId) -> Result<ControlInfo, Error> {
        self.with_cam(id, |cam| cam.control_mut(control).map(|info| *info))
    }

    fn control_value(&self, id: DeviceId, control: ControlId) -> Result<i32, Error> {
        self.with_cam(id, |cam| cam.control_mut(control).map(|info| info.current))
    }

    fn set_control_value(
        &self,
        id: DeviceId,
        control: ControlId,
        value: i32,
    ) -> Result<(), Error> {
        self.with_cam(id, |cam| {
            let info = cam.control_mut(control)?;
            if info.has_min_max && (value < info.min || value > info.max) {
                return Err(Error::Driver(ERANGE));
            }
            info.current = value;
            Ok(())
        })
    }

    fn get_frame(
        &self,
        id: DeviceId,
        request: &FrameRequest,
        buf: &mut [u8],
    ) -> Result<Pull, Error> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let active = self.active_pulls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_pulls.fetch_max(active, Ordering::SeqCst);
        let result = self.pull(id, request, buf);
        self.active_pulls.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn set_surface(
        &self,
        id: DeviceId,
        surface: Option<&dyn PlatformSurface>,
        mvp: &Transform,
    ) -> Result<(), Error> {
        self.with_cam(id, |cam| {
            cam.surface_bound = surface.is_some();
            Ok(())
        })?;
        *lock(&self.last_mvp) = *mvp;
        Ok(())
    }

    fn set_mvp_matrix(&self, id: DeviceId, mvp: &Transform) -> Result<(), Error> {
        self.with_cam(id, |_| Ok(()))?;
        *lock(&self.last_mvp) = *mvp;
        Ok(())
    }
}

struct MemoryBuffer {
    width: u32,
    height: u32,
    stride: u32,
    pixels: Vec<u8>,
}

impl MemoryBuffer {
    fn new(width: u32, height: u32) -> Self {
        // rows padded to 16 pixels like most gralloc allocations
        let stride = (width + 15) & !15;
        MemoryBuffer {
            width,
            height,
            stride,
            pixels: vec![0; stride as usize * height as usize * 4],
        }
    }
}

/// An RGBA_8888 surface backed by memory.
///
/// A fixed surface keeps its buffer size no matter what geometry is
/// requested, a resizable one reallocates on every geometry change.
pub struct MemorySurface {
    buffer: Mutex<MemoryBuffer>,
    resizable: bool,
    geometry: Mutex<Option<(u32, u32)>>,
    fail_lock: AtomicBool,
    acquires: AtomicUsize,
    releases: AtomicUsize,
    posts: AtomicUsize,
    lock_failures: AtomicUsize,
}

impl MemorySurface {
    /// Surface with a fixed `width` x `height` buffer.
    pub fn new(width: u32, height: u32) -> Self {
        MemorySurface::build(width, height, false)
    }

    /// Surface whose buffer follows the configured geometry.
    pub fn resizable() -> Self {
        MemorySurface::build(0, 0, true)
    }

    fn build(width: u32, height: u32, resizable: bool) -> Self {
        MemorySurface {
            buffer: Mutex::new(MemoryBuffer::new(width, height)),
            resizable,
            geometry: Mutex::new(None),
            fail_lock: AtomicBool::new(false),
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            posts: AtomicUsize::new(0),
            lock_failures: AtomicUsize::new(0),
        }
    }

    /// Make buffer locking fail until cleared.
    pub fn set_fail_lock(&self, fail: bool) {
        self.fail_lock.store(fail, Ordering::SeqCst);
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Acquisitions not yet released.
    pub fn outstanding(&self) -> isize {
        self.acquires() as isize - self.releases() as isize
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn lock_failures(&self) -> usize {
        self.lock_failures.load(Ordering::SeqCst)
    }

    /// Last geometry requested through `set_buffers_geometry`.
    pub fn geometry(&self) -> Option<(u32, u32)> {
        *lock(&self.geometry)
    }

    pub fn buffer_size(&self) -> (u32, u32) {
        let buffer = lock(&self.buffer);
        (buffer.width, buffer.height)
    }

    /// RGBA value at `(x, y)`, zero outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let buffer = lock(&self.buffer);
        if x >= buffer.width || y >= buffer.height {
            return [0; 4];
        }
        let at = (y as usize * buffer.stride as usize + x as usize) * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&buffer.pixels[at..at + 4]);
        px
    }
}

impl PlatformSurface for MemorySurface {
    fn acquire(&self) {
        self.acquires.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn set_buffers_geometry(&self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Err(Error::Surface(EINVAL));
        }
        *lock(&self.geometry) = Some((width, height));
        if self.resizable {
            *lock(&self.buffer) = MemoryBuffer::new(width, height);
        }
        Ok(())
    }

    fn lock_and_post(&self, render: &mut dyn FnMut(&mut WindowBuffer<'_>)) -> Result<(), Error> {
        if self.fail_lock.load(Ordering::SeqCst) {
            self.lock_failures.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Surface(EINVAL));
        }
        let mut guard = lock(&self.buffer);
        let buffer = &mut *guard;
        render(&mut WindowBuffer {
            width: buffer.width,
            height: buffer.height,
            stride: buffer.stride,
            bits: buffer.pixels.as_mut_slice(),
        });
        self.posts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        let sim = SimulatedDevice::new().with_camera(1);
        let (count, first) = sim.supported_size(1, 0).unwrap();
        assert_eq!(count, 4);
        assert_eq!(first.frame_type, RawFrameType::Yuyv);
        assert!(matches!(
            sim.supported_size(1, 4),
            Err(Error::IndexOutOfRange { index: 4, count: 4 })
        ));
        assert!(matches!(
            sim.supported_size(1, -1),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(sim.supported_size(2, 0), Err(Error::Driver(ENODEV))));
    }

    #[test]
    fn test_resize_negotiates() {
        let sim = SimulatedDevice::new().with_camera(1);
        sim.resize(1, RawFrameType::Mjpeg, 1900, 1000).unwrap();
        let current = sim.current_size(1).unwrap();
        assert_eq!((current.width, current.height), (1920, 1080));
        assert!(sim.resize(1, RawFrameType::H264, 640, 480).is_err());
        assert_eq!(sim.current_size(1).unwrap(), current);
    }

    #[test]
    fn test_frames_need_streaming() {
        let sim = SimulatedDevice::new().with_camera(1);
        let request = FrameRequest {
            frame_type: RawFrameType::Rgbx,
            width: 640,
            height: 480,
        };
        let mut buf = vec![0u8; 640 * 480 * 4];
        assert_eq!(sim.get_frame(1, &request, &mut buf).unwrap(), Pull::NotReady);

        sim.start(1).unwrap();
        let Pull::Frame(info) = sim.get_frame(1, &request, &mut buf).unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(info.frame_type, RawFrameType::Rgbx);
        assert_eq!(info.len, 640 * 480 * 4);
        assert_eq!(&buf[0..4], &[235, 235, 235, 255]);
        assert_eq!(sim.pulls(), 2);

        let mut small = vec![0u8; 16];
        assert!(matches!(
            sim.get_frame(1, &request, &mut small),
            Err(Error::Driver(EOVERFLOW))
        ));
    }

    #[test]
    fn test_native_yuyv_output() {
        let sim = SimulatedDevice::new()
            .with_camera(1)
            .with_rgbx_output(false);
        sim.start(1).unwrap();
        let request = FrameRequest {
            frame_type: RawFrameType::Rgbx,
            width: 640,
            height: 480,
        };
        let mut buf = vec![0u8; 640 * 480 * 4];
        let Pull::Frame(info) = sim.get_frame(1, &request, &mut buf).unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(info.frame_type, RawFrameType::Yuyv);
        assert_eq!(info.len, 640 * 480 * 2);
        // white bar has neutral chroma
        assert_eq!(buf[1], 128);
        assert_eq!(buf[3], 128);
    }

    #[test]
    fn test_controls() {
        let sim = SimulatedDevice::new().with_camera(1);
        let gain = PU_GAIN | PU_MASK;
        assert_eq!(sim.control_value(1, gain).unwrap(), 0);
        sim.set_control_value(1, gain, 42).unwrap();
        assert_eq!(sim.control_value(1, gain).unwrap(), 42);
        assert!(matches!(
            sim.set_control_value(1, gain, 1000),
            Err(Error::Driver(ERANGE))
        ));
        assert!(matches!(
            sim.control_info(1, 0x4000),
            Err(Error::Driver(EINVAL))
        ));
        let caps = ControlCapabilities::from_masks(sim.ctrl_supports(1), sim.proc_supports(1));
        assert!(caps.contains(CTRL_TILT_ABS));
        assert_eq!(sim.ctrl_supports(9), 0);
    }

    #[test]
    fn test_memory_surface_geometry() {
        let fixed = MemorySurface::new(8, 8);
        fixed.set_buffers_geometry(640, 480).unwrap();
        assert_eq!(fixed.geometry(), Some((640, 480)));
        assert_eq!(fixed.buffer_size(), (8, 8));

        let resizable = MemorySurface::resizable();
        resizable.set_buffers_geometry(20, 10).unwrap();
        assert_eq!(resizable.buffer_size(), (20, 10));
        assert!(resizable.set_buffers_geometry(0, 10).is_err());

        resizable
            .lock_and_post(&mut |buf: &mut WindowBuffer<'_>| {
                assert_eq!(buf.stride, 32);
                assert_eq!(buf.bits.len(), 32 * 10 * 4);
                buf.bits[0..4].copy_from_slice(&[1, 2, 3, 4]);
            })
            .unwrap();
        assert_eq!(resizable.pixel(0, 0), [1, 2, 3, 4]);
        assert_eq!(resizable.posts(), 1);
        assert_eq!(resizable.pixel(99, 0), [0; 4]);
    }
}
