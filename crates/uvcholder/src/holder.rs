// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    capture::{
        lock_callback, CallbackSlot, CaptureLoop, CaptureSinks, CaptureSource, CaptureStats,
        FrameCallback,
    },
    config::HolderConfig,
    controls::{ControlCapabilities, ControlId, ControlInfo},
    driver::{DeviceDriver, DeviceState, Transform, IDENTITY},
    format::VideoFormat,
    frame_type::RawFrameType,
    surface::{lock_slot, PlatformSurface, SurfaceBinding, SurfaceSlot},
    DeviceId, Error,
};
use log::{debug, warn};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

struct HolderState {
    current: VideoFormat,
    mvp: Transform,
    preview: Option<SurfaceBinding>,
    capture: Option<CaptureLoop>,
    stats: Option<Arc<CaptureStats>>,
    /// A pull session opened by `start_capture` keeps the loop running
    /// without a recording surface.
    pulling: bool,
    closed: bool,
}

/// Streaming state of one attached device.
///
/// Caches the supported formats and controls read when the holder is
/// opened, tracks the current format, and owns the preview and recording
/// surface bindings. Mutating operations are serialised by an internal
/// lock; the capture loop itself runs on its own thread and only shares the
/// recording and software preview [`SurfaceSlot`]s and the frame callback
/// with the holder.
pub struct StreamHolder {
    driver: Arc<dyn DeviceDriver>,
    device_id: DeviceId,
    config: HolderConfig,
    supported: Vec<VideoFormat>,
    controls: ControlCapabilities,
    state: Mutex<HolderState>,
    recording: SurfaceSlot,
    software_preview: SurfaceSlot,
    callback: CallbackSlot,
}

impl StreamHolder {
    /// Open a holder for an attached device.
    ///
    /// Requests the configured initial format (failure is only logged),
    /// reads the supported-format table until the driver reports the end or
    /// an error, reads back the format actually selected and derives the
    /// supported controls.
    pub fn open(driver: Arc<dyn DeviceDriver>, device_id: DeviceId, config: HolderConfig) -> Self {
        let (width, height) = config.resolution();
        if let Err(err) = driver.resize(device_id, config.frame_type(), width, height) {
            warn!(
                "device {} rejected initial format {} {}x{}: {}",
                device_id,
                config.frame_type(),
                width,
                height,
                err
            );
        }

        let supported = read_supported(driver.as_ref(), device_id);
        debug!(
            "StreamHolder::open() - device {} supports {} formats",
            device_id,
            supported.len()
        );

        let current = match driver.current_size(device_id) {
            Ok(format) => format,
            Err(err) => {
                debug!("device {} current size unavailable: {}", device_id, err);
                VideoFormat::default()
            }
        };

        let controls = ControlCapabilities::from_masks(
            driver.ctrl_supports(device_id),
            driver.proc_supports(device_id),
        );

        StreamHolder {
            driver,
            device_id,
            config,
            supported,
            controls,
            state: Mutex::new(HolderState {
                current,
                mvp: IDENTITY,
                preview: None,
                capture: None,
                stats: None,
                pulling: false,
                closed: false,
            }),
            recording: Arc::new(Mutex::new(None)),
            software_preview: Arc::new(Mutex::new(None)),
            callback: Arc::new(Mutex::new(None)),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn config(&self) -> &HolderConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, HolderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open_state(&self) -> Result<MutexGuard<'_, HolderState>, Error> {
        let state = self.state();
        if state.closed {
            return Err(Error::DeviceNotFound(self.device_id));
        }
        Ok(state)
    }

    /// Whether the driver reports the device as streaming.
    pub fn is_running(&self) -> bool {
        self.driver.device_state(self.device_id) > DeviceState::Connected
    }

    pub fn set_config(&self, enabled: i32, use_first_config: bool) -> Result<(), Error> {
        let _state = self.open_state()?;
        self.driver
            .set_config(self.device_id, enabled, use_first_config)
    }

    pub fn start(&self) -> Result<(), Error> {
        let _state = self.open_state()?;
        debug!("StreamHolder::start() - device {}", self.device_id);
        self.driver.start(self.device_id)
    }

    /// Stop streaming. Does nothing and succeeds when the device is not
    /// streaming. The recording loop is left alone.
    pub fn stop(&self) -> Result<(), Error> {
        let _state = self.state();
        if !self.is_running() {
            return Ok(());
        }
        debug!("StreamHolder::stop() - device {}", self.device_id);
        self.driver.stop(self.device_id)
    }

    /// Request a new format and refresh the cached current format from the
    /// driver, whatever the outcome of the request.
    ///
    /// A running capture loop is stopped before the request and restarted
    /// afterwards with buffers and surface geometry for the new format. The
    /// restarted loop keeps counting into the same statistics.
    pub fn set_video_size(
        &self,
        frame_type: RawFrameType,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        let mut state = self.open_state()?;
        let stats = state.stats.clone();
        let restart = self.stop_capture_loop(&mut state);
        let result = self.resize(&mut state, frame_type, width, height);
        let restarted = if restart {
            self.start_capture_loop(&mut state, stats)
        } else {
            Ok(())
        };
        result.and(restarted)
    }

    fn resize(
        &self,
        state: &mut HolderState,
        frame_type: RawFrameType,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        let result = self
            .driver
            .resize(self.device_id, frame_type, width, height);
        match self.driver.current_size(self.device_id) {
            Ok(current) => state.current = current,
            Err(err) => debug!("device {} current size unavailable: {}", self.device_id, err),
        }
        debug!(
            "StreamHolder::set_video_size() - device {} asked {} {}x{}, now {}",
            self.device_id, frame_type, width, height, state.current
        );

        let size = self.capture_size(state);
        for (slot, sink) in [(&self.recording, "recording"), (&self.software_preview, "preview")] {
            if let Some(binding) = lock_slot(slot).as_ref() {
                self.apply_geometry(binding, size, sink);
            }
        }
        result
    }

    pub fn supported_sizes(&self) -> &[VideoFormat] {
        &self.supported
    }

    pub fn supported_size(&self, index: i32) -> Result<VideoFormat, Error> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.supported.get(i))
            .cloned()
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.supported.len(),
            })
    }

    pub fn current_size(&self) -> VideoFormat {
        self.state().current.clone()
    }

    /// Controls supported by the device, sorted by identifier.
    pub fn supported_controls(&self) -> &ControlCapabilities {
        &self.controls
    }

    /// Raw camera-terminal control bitmask.
    pub fn ctrl_supports(&self) -> u64 {
        self.driver.ctrl_supports(self.device_id)
    }

    /// Raw processing-unit control bitmask.
    pub fn proc_supports(&self) -> u64 {
        self.driver.proc_supports(self.device_id)
    }

    pub fn control_info(&self, control: ControlId) -> Result<ControlInfo, Error> {
        let _state = self.open_state()?;
        self.driver.control_info(self.device_id, control)
    }

    pub fn control_value(&self, control: ControlId) -> Result<i32, Error> {
        let _state = self.open_state()?;
        self.driver.control_value(self.device_id, control)
    }

    pub fn set_control_value(&self, control: ControlId, value: i32) -> Result<(), Error> {
        let _state = self.open_state()?;
        self.driver
            .set_control_value(self.device_id, control, value)
    }

    /// Route frames to a preview surface through the driver's own
    /// compositor, or detach it with `None`. The current model-view
    /// transform is passed along.
    pub fn set_preview_binding(&self, surface: Option<Arc<dyn PlatformSurface>>) -> Result<(), Error> {
        let mut state = self.open_state()?;
        self.driver
            .set_surface(self.device_id, surface.as_deref(), &state.mvp)?;
        state.preview = None;
        state.preview = surface.map(SurfaceBinding::new);
        debug!(
            "StreamHolder::set_preview_binding() - device {} preview {}",
            self.device_id,
            if state.preview.is_some() { "bound" } else { "cleared" }
        );
        Ok(())
    }

    /// Set the model-view transform, identity when `None`.
    pub fn set_mvp_matrix(&self, mvp: Option<Transform>) -> Result<(), Error> {
        let mut state = self.open_state()?;
        let mvp = mvp.unwrap_or(IDENTITY);
        self.driver.set_mvp_matrix(self.device_id, &mvp)?;
        state.mvp = mvp;
        Ok(())
    }

    /// Bind the recording surface and run a capture loop into it, or with
    /// `None` stop the loop and release the surface.
    ///
    /// Any running loop is stopped and joined before the old surface is
    /// released, and the old surface is released before the new one is
    /// acquired. The whole sequence runs under the holder lock so two loops
    /// never run for the same holder. An open pull session keeps a loop
    /// running after the recording surface is cleared.
    pub fn set_recording_binding(
        &self,
        surface: Option<Arc<dyn PlatformSurface>>,
    ) -> Result<(), Error> {
        let mut state = self.open_state()?;
        self.stop_capture_loop(&mut state);

        let mut slot = lock_slot(&self.recording);
        *slot = None;
        if let Some(surface) = surface {
            let binding = SurfaceBinding::new(surface);
            self.apply_geometry(&binding, self.capture_size(&state), "recording");
            *slot = Some(binding);
        }
        let bound = slot.is_some();
        drop(slot);

        let result = self.start_capture_loop(&mut state, None);
        if result.is_err() {
            lock_slot(&self.recording).take();
        }
        debug!(
            "StreamHolder::set_recording_binding() - device {} recording {}",
            self.device_id,
            if bound { "bound" } else { "cleared" }
        );
        result
    }

    /// Bind a surface the capture loop blits every frame into before the
    /// recording surface, or release it with `None`. Unlike
    /// [`set_preview_binding`](Self::set_preview_binding) the driver is not
    /// involved and frames only arrive while a capture loop runs.
    pub fn set_software_preview_binding(
        &self,
        surface: Option<Arc<dyn PlatformSurface>>,
    ) -> Result<(), Error> {
        let state = self.open_state()?;
        let mut slot = lock_slot(&self.software_preview);
        *slot = None;
        if let Some(surface) = surface {
            let binding = SurfaceBinding::new(surface);
            self.apply_geometry(&binding, self.capture_size(&state), "preview");
            *slot = Some(binding);
        }
        debug!(
            "StreamHolder::set_software_preview_binding() - device {} preview {}",
            self.device_id,
            if slot.is_some() { "bound" } else { "cleared" }
        );
        Ok(())
    }

    /// Hand every raw frame pulled by the capture loop to `callback`, or
    /// remove it with `None`. The callback runs on the capture thread and
    /// must not call back into this method.
    pub fn set_frame_callback(&self, callback: Option<FrameCallback>) -> Result<(), Error> {
        let _state = self.open_state()?;
        *lock_callback(&self.callback) = callback;
        Ok(())
    }

    /// Open a pull session: select the format, start streaming and run the
    /// capture loop whether or not a recording surface is bound. Fails with
    /// [`Error::Unavailable`] while a session is already open.
    pub fn start_capture(
        &self,
        frame_type: RawFrameType,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        let mut state = self.open_state()?;
        if state.pulling {
            return Err(Error::Unavailable(self.device_id));
        }

        let stats = state.stats.clone();
        let was_running = self.stop_capture_loop(&mut state);
        let opened = self
            .resize(&mut state, frame_type, width, height)
            .and_then(|()| self.driver.start(self.device_id));

        match opened {
            Ok(()) => {
                state.pulling = true;
                let started = self.start_capture_loop(&mut state, None);
                if started.is_err() {
                    state.pulling = false;
                }
                debug!(
                    "StreamHolder::start_capture() - device {} pulling {}",
                    self.device_id, state.current
                );
                started
            }
            Err(err) => {
                // back to the recording loop that ran before, if any
                if was_running {
                    if let Err(restart) = self.start_capture_loop(&mut state, stats) {
                        warn!("device {} recording restart: {}", self.device_id, restart);
                    }
                }
                Err(err)
            }
        }
    }

    /// Close the pull session. Without a recording surface the capture
    /// loop is joined and the stream stopped, otherwise both keep running
    /// for the recording.
    pub fn stop_capture(&self) -> Result<(), Error> {
        let mut state = self.open_state()?;
        if !state.pulling {
            return Ok(());
        }
        state.pulling = false;
        if lock_slot(&self.recording).is_some() {
            debug!(
                "StreamHolder::stop_capture() - device {} still recording",
                self.device_id
            );
            return Ok(());
        }

        self.stop_capture_loop(&mut state);
        debug!("StreamHolder::stop_capture() - device {}", self.device_id);
        if self.is_running() {
            self.driver.stop(self.device_id)?;
        }
        Ok(())
    }

    /// Whether a pull session opened by [`start_capture`](Self::start_capture)
    /// is active.
    pub fn is_capturing(&self) -> bool {
        self.state().pulling
    }

    fn capture_size(&self, state: &HolderState) -> (u32, u32) {
        if state.current.is_degenerate() {
            self.config.capture().fallback_size()
        } else {
            (state.current.width, state.current.height)
        }
    }

    fn apply_geometry(&self, binding: &SurfaceBinding, (width, height): (u32, u32), sink: &str) {
        if let Err(err) = binding.surface().set_buffers_geometry(width, height) {
            warn!(
                "device {} {} geometry {}x{}: {}",
                self.device_id, sink, width, height, err
            );
        }
    }

    /// Stop and join the capture loop, returning whether one was running.
    fn stop_capture_loop(&self, state: &mut HolderState) -> bool {
        let Some(mut capture) = state.capture.take() else {
            return false;
        };
        debug!(
            "StreamHolder::stop_capture_loop() - device {} stopping loop",
            self.device_id
        );
        capture.stop();
        true
    }

    /// Start a capture loop sized for the current format if a recording
    /// surface is bound or a pull session is open. `stats` continues the
    /// counters of an earlier loop.
    fn start_capture_loop(
        &self,
        state: &mut HolderState,
        stats: Option<Arc<CaptureStats>>,
    ) -> Result<(), Error> {
        if lock_slot(&self.recording).is_none() && !state.pulling {
            return Ok(());
        }

        let (width, height) = self.capture_size(state);
        let len = RawFrameType::Rgbx
            .frame_len(width, height)
            .ok_or_else(|| Error::InvalidArgument(format!("frame {}x{}", width, height)))?;
        let mut scratch = Vec::new();
        if let Err(err) = scratch.try_reserve_exact(len) {
            warn!(
                "device {} capture buffer of {} bytes: {}",
                self.device_id, len, err
            );
            return Err(err.into());
        }
        scratch.resize(len, 0);

        let source = CaptureSource {
            driver: Arc::clone(&self.driver),
            device_id: self.device_id,
            width,
            height,
        };
        let sinks = CaptureSinks::new(Arc::clone(&self.recording))
            .with_preview(Arc::clone(&self.software_preview))
            .with_callback_slot(Arc::clone(&self.callback));
        let config = self.config.capture().clone();
        let capture = match stats {
            Some(stats) => CaptureLoop::resume(source, sinks, scratch, config, stats)?,
            None => CaptureLoop::start(source, sinks, scratch, config)?,
        };

        state.stats = Some(capture.stats());
        state.capture = Some(capture);
        debug!(
            "StreamHolder::start_capture_loop() - device {} capturing {}x{}",
            self.device_id, width, height
        );
        Ok(())
    }

    /// Whether a capture loop is active.
    pub fn is_recording(&self) -> bool {
        self.state()
            .capture
            .as_ref()
            .map(CaptureLoop::is_running)
            .unwrap_or(false)
    }

    /// Statistics of the current or most recent capture loop.
    pub fn capture_stats(&self) -> Option<Arc<CaptureStats>> {
        self.state().stats.clone()
    }

    /// Frames delivered by the current or most recent capture loop.
    pub fn frame_count(&self) -> u64 {
        self.capture_stats()
            .map(|stats| stats.frame_count())
            .unwrap_or(0)
    }

    /// Frame rate of the current or most recent capture loop, 0 before
    /// the first frame.
    pub fn frame_rate(&self) -> f64 {
        self.capture_stats()
            .map(|stats| stats.frame_rate())
            .unwrap_or(0.0)
    }

    /// Stop the capture loop, release every surface, drop the frame
    /// callback and stop the stream. Later calls do nothing, as do all
    /// mutating operations.
    pub fn shutdown(&self) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.closed = true;
        debug!("StreamHolder::shutdown() - device {}", self.device_id);

        self.stop_capture_loop(&mut state);
        state.pulling = false;
        lock_slot(&self.recording).take();
        lock_slot(&self.software_preview).take();
        lock_callback(&self.callback).take();

        if state.preview.is_some() {
            if let Err(err) = self.driver.set_surface(self.device_id, None, &state.mvp) {
                debug!("device {} preview detach: {}", self.device_id, err);
            }
            state.preview = None;
        }

        if let Err(err) = self.driver.stop(self.device_id) {
            debug!("device {} stop on shutdown: {}", self.device_id, err);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl Drop for StreamHolder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for StreamHolder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StreamHolder")
            .field("device_id", &self.device_id)
            .field("supported", &self.supported.len())
            .field("controls", &self.controls.len())
            .finish()
    }
}

fn read_supported(driver: &dyn DeviceDriver, device_id: DeviceId) -> Vec<VideoFormat> {
    let mut supported = Vec::new();
    let mut index = 0;
    loop {
        match driver.supported_size(device_id, index) {
            Ok((count, format)) => {
                supported.push(format);
                if supported.len() >= count {
                    break;
                }
                index += 1;
            }
            Err(Error::IndexOutOfRange { .. }) => break,
            Err(err) => {
                warn!("device {} supported size {}: {}", device_id, index, err);
                break;
            }
        }
    }
    supported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::FrameInfo,
        sim::{MemorySurface, SimulatedDevice},
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::{Duration, Instant},
    };

    fn open(sim: &Arc<SimulatedDevice>, id: DeviceId) -> StreamHolder {
        StreamHolder::open(sim.clone(), id, HolderConfig::default())
    }

    fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_open_reads_device() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);

        assert_eq!(holder.supported_sizes().len(), 4);
        // MJPEG 640x480 requested by the default config
        let current = holder.current_size();
        assert_eq!(current.frame_type, RawFrameType::Mjpeg);
        assert_eq!((current.width, current.height), (640, 480));
        assert!(!holder.supported_controls().is_empty());
        assert!(holder
            .supported_controls()
            .ids()
            .windows(2)
            .all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_open_without_device() {
        let sim = Arc::new(SimulatedDevice::new());
        let holder = open(&sim, 3);
        assert!(holder.supported_sizes().is_empty());
        assert!(holder.current_size().is_degenerate());
        assert!(holder.supported_controls().is_empty());
    }

    #[test]
    fn test_supported_size_range() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        assert!(holder.supported_size(0).is_ok());
        assert!(holder.supported_size(3).is_ok());
        assert!(matches!(
            holder.supported_size(4),
            Err(Error::IndexOutOfRange { index: 4, count: 4 })
        ));
        assert!(holder.supported_size(-1).is_err());
    }

    #[test]
    fn test_set_video_size_refreshes() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);

        holder.set_video_size(RawFrameType::Yuyv, 1280, 700).unwrap();
        let current = holder.current_size();
        assert_eq!((current.width, current.height), (1280, 720));

        assert!(holder.set_video_size(RawFrameType::H264, 640, 480).is_err());
        assert_eq!(holder.current_size(), current);
    }

    #[test]
    fn test_controls_pass_through() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        let brightness = crate::controls::PU_BRIGHTNESS | crate::controls::PU_MASK;

        holder.set_control_value(brightness, -10).unwrap();
        assert_eq!(holder.control_value(brightness).unwrap(), -10);
        assert_eq!(holder.control_info(brightness).unwrap().current, -10);
        assert!(matches!(
            holder.control_value(0x10),
            Err(Error::Driver(code)) if code < 0
        ));
        assert_eq!(holder.ctrl_supports(), sim.ctrl_supports(1));
        assert_eq!(holder.proc_supports(), sim.proc_supports(1));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        assert!(holder.stop().is_ok());
        assert!(holder.stop().is_ok());
        assert!(!holder.is_recording());

        holder.start().unwrap();
        assert!(holder.is_running());
        holder.stop().unwrap();
        assert!(!holder.is_running());
        assert!(holder.stop().is_ok());
    }

    #[test]
    fn test_preview_uses_driver_path() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        let surface = Arc::new(MemorySurface::new(64, 64));

        let mut mvp = IDENTITY;
        mvp[12] = 0.5;
        holder.set_mvp_matrix(Some(mvp)).unwrap();
        holder.set_preview_binding(Some(surface.clone())).unwrap();
        assert!(sim.surface_bound(1));
        assert_eq!(sim.last_mvp(), mvp);
        assert_eq!(surface.acquires(), 1);
        assert_eq!(sim.pulls(), 0, "preview must not start the pull loop");
        assert!(!holder.is_recording());

        holder.set_mvp_matrix(None).unwrap();
        assert_eq!(sim.last_mvp(), IDENTITY);

        holder.set_preview_binding(None).unwrap();
        assert!(!sim.surface_bound(1));
        assert_eq!(surface.outstanding(), 0);
    }

    #[test]
    fn test_preview_rejected_keeps_binding() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        let first = Arc::new(MemorySurface::new(64, 64));
        holder.set_preview_binding(Some(first.clone())).unwrap();

        sim.detach(1);
        let second = Arc::new(MemorySurface::new(64, 64));
        assert!(holder.set_preview_binding(Some(second.clone())).is_err());
        assert_eq!(first.outstanding(), 1);
        assert_eq!(second.acquires(), 0);
    }

    #[test]
    fn test_recording_geometry_and_frames() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.set_video_size(RawFrameType::Yuyv, 640, 480).unwrap();
        holder.start().unwrap();

        let surface = Arc::new(MemorySurface::resizable());
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        assert_eq!(surface.geometry(), Some((640, 480)));
        assert!(holder.is_recording());
        assert!(wait_for(Duration::from_secs(5), || holder.frame_count() >= 1));
        assert!(holder.frame_rate() > 0.0);

        holder.set_recording_binding(None).unwrap();
        assert!(!holder.is_recording());
        assert_eq!(surface.outstanding(), 0);

        // statistics of the finished loop stay readable
        let frames = holder.frame_count();
        assert!(frames >= 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(holder.frame_count(), frames);
    }

    #[test]
    fn test_recording_fallback_geometry() {
        // no camera: the current format stays degenerate
        let sim = Arc::new(SimulatedDevice::new());
        let holder = open(&sim, 1);
        let surface = Arc::new(MemorySurface::resizable());
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        assert_eq!(surface.geometry(), Some((1280, 720)));
        holder.set_recording_binding(None).unwrap();
        assert_eq!(surface.outstanding(), 0);
    }

    #[test]
    fn test_recording_clips_to_small_surface() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.set_video_size(RawFrameType::Yuyv, 640, 480).unwrap();
        holder.start().unwrap();

        let surface = Arc::new(MemorySurface::new(100, 50));
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        assert!(wait_for(Duration::from_secs(5), || holder.frame_count() >= 1));
        holder.set_recording_binding(None).unwrap();

        let stats = holder.capture_stats().unwrap();
        assert_eq!(stats.bytes(), stats.frame_count() * 100 * 50 * 4);
        assert_eq!(surface.pixel(99, 49)[3], 255);
        assert_eq!(surface.pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_rebinding_never_overlaps_loops() {
        let sim = Arc::new(
            SimulatedDevice::new()
                .with_camera(1)
                .with_pull_latency(Duration::from_millis(2)),
        );
        let holder = open(&sim, 1);
        holder.set_video_size(RawFrameType::Yuyv, 640, 480).unwrap();
        holder.start().unwrap();

        let surfaces: Vec<Arc<MemorySurface>> =
            (0..4).map(|_| Arc::new(MemorySurface::resizable())).collect();
        for surface in &surfaces {
            holder.set_recording_binding(Some(surface.clone())).unwrap();
            assert!(wait_for(Duration::from_secs(5), || surface.posts() >= 1));
        }
        holder.set_recording_binding(None).unwrap();

        assert_eq!(sim.max_concurrent_pulls(), 1);
        for surface in &surfaces {
            assert_eq!(surface.acquires(), 1);
            assert_eq!(surface.releases(), 1);
        }

        // earlier surfaces receive nothing once replaced
        let posts: Vec<usize> = surfaces.iter().map(|s| s.posts()).collect();
        thread::sleep(Duration::from_millis(30));
        let after: Vec<usize> = surfaces.iter().map(|s| s.posts()).collect();
        assert_eq!(posts, after);
    }

    #[test]
    fn test_rebinding_same_surface() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        let surface = Arc::new(MemorySurface::resizable());
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        assert_eq!(surface.outstanding(), 1);
        holder.set_recording_binding(None).unwrap();
        assert_eq!(surface.acquires(), 2);
        assert_eq!(surface.outstanding(), 0);
    }

    #[test]
    fn test_resize_while_recording() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.set_video_size(RawFrameType::Yuyv, 640, 480).unwrap();
        holder.start().unwrap();

        let surface = Arc::new(MemorySurface::resizable());
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        assert!(wait_for(Duration::from_secs(5), || holder.frame_count() >= 2));
        let stats = holder.capture_stats().unwrap();

        holder.set_video_size(RawFrameType::Yuyv, 1280, 720).unwrap();
        assert_eq!(surface.geometry(), Some((1280, 720)));
        assert!(holder.is_recording());
        let frames = holder.frame_count();
        assert!(wait_for(Duration::from_secs(5), || holder.frame_count() > frames + 2));

        // same counters, and no pull ever overflowed the scratch buffer
        assert!(Arc::ptr_eq(&holder.capture_stats().unwrap(), &stats));
        assert_eq!(stats.pull_errors(), 0);
        assert_eq!(surface.pixel(1279, 719)[3], 255);
        assert_eq!(sim.max_concurrent_pulls(), 1);

        holder.set_recording_binding(None).unwrap();
        assert_eq!(surface.outstanding(), 0);
    }

    #[test]
    fn test_resize_without_loop_starts_nothing() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.start().unwrap();
        holder.set_video_size(RawFrameType::Yuyv, 1280, 720).unwrap();
        assert!(!holder.is_recording());
        assert!(holder.capture_stats().is_none());
        assert_eq!(sim.pulls(), 0);
    }

    #[test]
    fn test_software_preview_and_callback() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        let preview = Arc::new(MemorySurface::resizable());
        holder
            .set_software_preview_binding(Some(preview.clone()))
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            holder
                .set_frame_callback(Some(Box::new(move |raw: &[u8], info: FrameInfo| {
                    assert_eq!(raw.len(), info.len);
                    calls.fetch_add(1, Ordering::SeqCst);
                })))
                .unwrap();
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(preview.posts(), 0, "no loop before start_capture");

        holder.start_capture(RawFrameType::Yuyv, 640, 480).unwrap();
        assert!(holder.is_capturing());
        assert!(holder.is_recording());
        assert!(holder.is_running());
        assert_eq!(preview.geometry(), Some((640, 480)));
        assert!(wait_for(Duration::from_secs(5), || {
            preview.posts() >= 2 && calls.load(Ordering::SeqCst) >= 2
        }));
        assert!(!sim.surface_bound(1), "software preview bypasses the driver");

        holder.stop_capture().unwrap();
        assert!(!holder.is_capturing());
        assert!(!holder.is_recording());
        assert!(!holder.is_running());
        let posts = preview.posts();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(preview.posts(), posts);

        holder.set_software_preview_binding(None).unwrap();
        assert_eq!(preview.outstanding(), 0);
    }

    #[test]
    fn test_start_capture_twice_is_busy() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.start_capture(RawFrameType::Yuyv, 640, 480).unwrap();
        assert!(matches!(
            holder.start_capture(RawFrameType::Yuyv, 640, 480),
            Err(Error::Unavailable(1))
        ));
        holder.stop_capture().unwrap();
        assert!(holder.stop_capture().is_ok());
        assert_eq!(sim.max_concurrent_pulls(), 1);
    }

    #[test]
    fn test_start_capture_rejected_format() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        assert!(holder.start_capture(RawFrameType::H264, 640, 480).is_err());
        assert!(!holder.is_capturing());
        assert!(!holder.is_recording());
        assert!(!holder.is_running());
    }

    #[test]
    fn test_recording_outlives_capture_session() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.start_capture(RawFrameType::Yuyv, 640, 480).unwrap();

        let surface = Arc::new(MemorySurface::resizable());
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        holder.stop_capture().unwrap();
        assert!(holder.is_recording());
        assert!(holder.is_running());
        let posts = surface.posts();
        assert!(wait_for(Duration::from_secs(5), || surface.posts() > posts));

        holder.set_recording_binding(None).unwrap();
        assert!(!holder.is_recording());
        assert_eq!(surface.outstanding(), 0);
    }

    #[test]
    fn test_capture_session_outlives_recording() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.start_capture(RawFrameType::Yuyv, 640, 480).unwrap();
        let surface = Arc::new(MemorySurface::resizable());
        holder.set_recording_binding(Some(surface.clone())).unwrap();
        holder.set_recording_binding(None).unwrap();
        assert!(holder.is_recording());
        assert_eq!(surface.outstanding(), 0);
        holder.stop_capture().unwrap();
        assert!(!holder.is_recording());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let holder = open(&sim, 1);
        holder.start().unwrap();
        let preview = Arc::new(MemorySurface::new(8, 8));
        let recording = Arc::new(MemorySurface::resizable());
        let software = Arc::new(MemorySurface::resizable());
        holder.set_preview_binding(Some(preview.clone())).unwrap();
        holder.set_recording_binding(Some(recording.clone())).unwrap();
        holder
            .set_software_preview_binding(Some(software.clone()))
            .unwrap();
        holder
            .set_frame_callback(Some(Box::new(|_: &[u8], _: FrameInfo| {})))
            .unwrap();

        holder.shutdown();
        assert_eq!(software.outstanding(), 0);
        assert!(holder.set_frame_callback(None).is_err());
        assert!(holder.is_closed());
        assert!(!holder.is_recording());
        assert!(!holder.is_running());
        assert_eq!(preview.outstanding(), 0);
        assert_eq!(recording.outstanding(), 0);
        assert!(!sim.surface_bound(1));

        holder.shutdown();
        assert!(matches!(holder.start(), Err(Error::DeviceNotFound(1))));
        assert!(holder
            .set_recording_binding(Some(recording.clone()))
            .is_err());
        assert_eq!(recording.acquires(), 1);
    }

    #[test]
    fn test_drop_joins_loop() {
        let sim = Arc::new(SimulatedDevice::new().with_camera(1));
        let surface = Arc::new(MemorySurface::resizable());
        {
            let holder = open(&sim, 1);
            holder.start().unwrap();
            holder.set_recording_binding(Some(surface.clone())).unwrap();
            assert!(wait_for(Duration::from_secs(5), || surface.posts() >= 1));
        }
        assert_eq!(surface.outstanding(), 0);
        assert_eq!(sim.device_state(1), DeviceState::Connected);
        let posts = surface.posts();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(surface.posts(), posts);
    }
}
