// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Recording pull loop
//!
//! A [`CaptureLoop`] owns one worker thread which repeatedly pulls a frame
//! from the driver and hands it to its [`CaptureSinks`]: the RGBA rendition
//! is blitted into the software preview surface and then the recording
//! surface, and the raw frame goes to the frame callback. The loop is
//! stopped by clearing an atomic flag which the worker checks at the top of
//! every iteration; [`CaptureLoop::stop`] then joins the thread.

use crate::{
    config::CaptureConfig,
    convert::yuyv_to_rgba,
    driver::{DeviceDriver, FrameInfo, FrameRequest, Pull},
    frame_type::RawFrameType,
    surface::{lock_slot, SurfaceSlot, WindowBuffer},
    DeviceId, Error,
};
use log::{debug, error, trace, warn};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Frame counters of one capture loop, readable while and after it runs.
#[derive(Debug)]
pub struct CaptureStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    pull_errors: AtomicU64,
    started: Instant,
    stopped: Mutex<Option<Instant>>,
}

impl CaptureStats {
    fn new() -> Self {
        CaptureStats {
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            pull_errors: AtomicU64::new(0),
            started: Instant::now(),
            stopped: Mutex::new(None),
        }
    }

    /// Frames delivered to at least one sink.
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// RGBA bytes copied into the recording surface.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn pull_errors(&self) -> u64 {
        self.pull_errors.load(Ordering::Relaxed)
    }

    /// Time from the loop start until it stopped, or until now if running.
    pub fn elapsed(&self) -> Duration {
        let stopped = *self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        stopped
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started)
    }

    /// Delivered frames per second since the loop started, 0 until the first
    /// frame.
    pub fn frame_rate(&self) -> f64 {
        let frames = self.frame_count();
        if frames == 0 {
            return 0.0;
        }
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            frames as f64 / secs
        } else {
            0.0
        }
    }

    fn record_frame(&self, bytes: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_error(&self) -> u64 {
        self.pull_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn resume(&self) {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn mark_stopped(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        if stopped.is_none() {
            *stopped = Some(Instant::now());
        }
    }
}

/// Device and frame size a loop pulls from.
#[derive(Clone)]
pub struct CaptureSource {
    pub driver: Arc<dyn DeviceDriver>,
    pub device_id: DeviceId,
    pub width: u32,
    pub height: u32,
}

/// Receives the raw bytes and description of every pulled frame.
pub type FrameCallback = Box<dyn Fn(&[u8], FrameInfo) + Send>;

/// Frame callback shared between its owner and a capture loop.
pub type CallbackSlot = Arc<Mutex<Option<FrameCallback>>>;

/// Destinations of a capture loop.
///
/// The recording slot is always present, the software preview slot and the
/// frame callback are optional. Slots are shared, so their contents can be
/// swapped while the loop runs.
#[derive(Clone)]
pub struct CaptureSinks {
    recording: SurfaceSlot,
    preview: Option<SurfaceSlot>,
    callback: Option<CallbackSlot>,
}

impl CaptureSinks {
    pub fn new(recording: SurfaceSlot) -> Self {
        CaptureSinks {
            recording,
            preview: None,
            callback: None,
        }
    }

    /// Also blit every frame into the surface bound in `preview`.
    pub fn with_preview(mut self, preview: SurfaceSlot) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Hand every raw frame to the callback held in `callback`.
    pub fn with_callback_slot(mut self, callback: CallbackSlot) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Hand every raw frame to `callback`.
    pub fn with_frame_callback(self, callback: FrameCallback) -> Self {
        self.with_callback_slot(Arc::new(Mutex::new(Some(callback))))
    }
}

impl fmt::Debug for CaptureSinks {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CaptureSinks")
            .field("preview", &self.preview.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

pub(crate) fn lock_callback(slot: &CallbackSlot) -> MutexGuard<'_, Option<FrameCallback>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle to a running capture worker.
///
/// Each instance runs at most once: it is created running and, once
/// stopped, stays stopped. Dropping the handle stops and joins the worker.
#[derive(Debug)]
pub struct CaptureLoop {
    device_id: DeviceId,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<CaptureStats>,
}

impl CaptureLoop {
    /// Spawn the worker. `scratch` receives pulled frames and should hold
    /// at least `width * height * 4` bytes.
    pub fn start(
        source: CaptureSource,
        sinks: CaptureSinks,
        scratch: Vec<u8>,
        config: CaptureConfig,
    ) -> Result<CaptureLoop, Error> {
        Self::spawn(source, sinks, scratch, config, Arc::new(CaptureStats::new()))
    }

    /// Spawn a worker which keeps counting into the statistics of an
    /// earlier, stopped loop.
    pub fn resume(
        source: CaptureSource,
        sinks: CaptureSinks,
        scratch: Vec<u8>,
        config: CaptureConfig,
        stats: Arc<CaptureStats>,
    ) -> Result<CaptureLoop, Error> {
        stats.resume();
        Self::spawn(source, sinks, scratch, config, stats)
    }

    fn spawn(
        source: CaptureSource,
        sinks: CaptureSinks,
        scratch: Vec<u8>,
        config: CaptureConfig,
        stats: Arc<CaptureStats>,
    ) -> Result<CaptureLoop, Error> {
        let device_id = source.device_id;
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            source,
            sinks,
            scratch,
            rgba: Vec::new(),
            config,
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
        };

        let thread = thread::Builder::new()
            .name(format!("uvc-capture-{}", device_id))
            .spawn(move || worker.run())?;

        debug!("CaptureLoop::start() - device {} worker spawned", device_id);

        Ok(CaptureLoop {
            device_id,
            running,
            thread: Some(thread),
            stats,
        })
    }

    /// Clear the running flag and join the worker. Returns once the worker
    /// has exited; later calls do nothing.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        debug!("CaptureLoop::stop() - device {} stopping", self.device_id);
        self.running.store(false, Ordering::Release);
        if thread.join().is_err() {
            error!("capture worker for device {} panicked", self.device_id);
        }
        self.stats.mark_stopped();
        debug!(
            "CaptureLoop::stop() - device {} joined after {} frames",
            self.device_id,
            self.stats.frame_count()
        );
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Rgba {
    InPlace,
    Converted(usize),
}

struct Worker {
    source: CaptureSource,
    sinks: CaptureSinks,
    scratch: Vec<u8>,
    rgba: Vec<u8>,
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl Worker {
    fn run(mut self) {
        let id = self.source.device_id;
        let period = self.config.frame_period();
        let backoff = self.config.idle_backoff();
        let request = FrameRequest {
            frame_type: self.config.pull_encoding(),
            width: self.source.width,
            height: self.source.height,
        };
        let mut last_frame: Option<Instant> = None;

        debug!(
            "capture worker for device {} running, {}x{} {} every {:?}",
            id, request.width, request.height, request.frame_type, period
        );

        while self.running.load(Ordering::Acquire) {
            if let Some(last) = last_frame {
                if last.elapsed() < period {
                    thread::sleep(backoff);
                    continue;
                }
            }

            let info = match self
                .source
                .driver
                .get_frame(id, &request, &mut self.scratch)
            {
                Ok(Pull::Frame(info)) if info.len > 0 => info,
                Ok(_) => {
                    thread::sleep(backoff);
                    continue;
                }
                Err(err) => {
                    let count = self.stats.record_error();
                    if count == 1 || count % 100 == 0 {
                        warn!("device {} frame pull failed ({} so far): {}", id, count, err);
                    }
                    thread::sleep(backoff);
                    continue;
                }
            };
            last_frame = Some(Instant::now());

            self.present(&info);
        }

        self.stats.mark_stopped();
        debug!(
            "capture worker for device {} exiting, total frames: {}",
            id,
            self.stats.frame_count()
        );
    }

    fn present(&mut self, info: &FrameInfo) {
        let id = self.source.device_id;
        let raw_len = info.len.min(self.scratch.len());
        let rgba = self.convert(info, raw_len);
        let raw = &self.scratch[..raw_len];
        let rgba = match rgba {
            Some(Rgba::InPlace) => Some(raw),
            Some(Rgba::Converted(len)) => Some(&self.rgba[..len]),
            None => None,
        };

        let mut delivered = false;
        let mut bytes = 0;
        if let Some(src) = rgba {
            if let Some(preview) = &self.sinks.preview {
                delivered |= post(preview, src, info, id, "preview").is_some();
            }
            if let Some(copied) = post(&self.sinks.recording, src, info, id, "recording") {
                delivered = true;
                bytes = copied * 4;
            }
        }

        if let Some(callback) = &self.sinks.callback {
            if let Some(callback) = lock_callback(callback).as_ref() {
                callback(raw, *info);
                delivered = true;
            }
        }

        if delivered {
            self.stats.record_frame(bytes);
            let frames = self.stats.frame_count();
            if frames % 30 == 0 {
                debug!("device {} delivered frame {}", id, frames);
            }
        }
    }

    /// Where the RGBA rendition of the pulled frame lives, converting YUYV
    /// into the side buffer.
    fn convert(&mut self, info: &FrameInfo, len: usize) -> Option<Rgba> {
        match info.frame_type {
            RawFrameType::Rgbx => Some(Rgba::InPlace),
            RawFrameType::Yuyv => {
                let needed = RawFrameType::Rgbx.frame_len(info.width, info.height)?;
                if self.rgba.len() < needed {
                    let extra = needed - self.rgba.len();
                    if let Err(err) = self.rgba.try_reserve_exact(extra) {
                        warn!("RGBA conversion buffer of {} bytes: {}", needed, err);
                        return None;
                    }
                    self.rgba.resize(needed, 0);
                }
                let pixels = yuyv_to_rgba(&self.scratch[..len], &mut self.rgba[..needed]);
                Some(Rgba::Converted(pixels * 4))
            }
            other => {
                trace!("{} frames are not rendered by the pull path", other);
                None
            }
        }
    }
}

/// Blit into the surface bound in `slot`. Returns the pixels copied, `None`
/// when nothing is bound or the lock failed.
fn post(slot: &SurfaceSlot, src: &[u8], info: &FrameInfo, id: DeviceId, sink: &str) -> Option<usize> {
    let guard = lock_slot(slot);
    let Some(binding) = guard.as_ref() else {
        trace!("device {} has no {} surface, frame dropped", id, sink);
        return None;
    };

    let mut copied = 0;
    let posted = binding
        .surface()
        .lock_and_post(&mut |buf: &mut WindowBuffer<'_>| {
            copied = blit_rgba(src, info.width, info.height, buf);
        });
    match posted {
        Ok(()) => Some(copied),
        Err(err) => {
            debug!("device {} {} surface lock failed, frame skipped: {}", id, sink, err);
            None
        }
    }
}

/// Copy tightly packed RGBA rows of a `src_width` x `src_height` frame into
/// a locked buffer, clipped to the smaller extent in each direction.
///
/// Returns the number of pixels copied. A source shorter than its stated
/// size stops the copy at the last complete row.
pub fn blit_rgba(src: &[u8], src_width: u32, src_height: u32, dst: &mut WindowBuffer<'_>) -> usize {
    let width = src_width.min(dst.width).min(dst.stride) as usize;
    let height = src_height.min(dst.height) as usize;
    let src_pitch = src_width as usize * 4;
    let dst_pitch = dst.stride as usize * 4;
    let row = width * 4;

    for y in 0..height {
        let s = y * src_pitch;
        let d = y * dst_pitch;
        match (src.get(s..s + row), dst.bits.get_mut(d..d + row)) {
            (Some(from), Some(to)) => to.copy_from_slice(from),
            _ => return y * width,
        }
    }
    width * height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sim::{MemorySurface, SimulatedDevice},
        surface::{PlatformSurface, SurfaceBinding},
    };

    fn rgba_frame(width: u32, height: u32) -> Vec<u8> {
        let mut frame = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                frame.extend_from_slice(&[x as u8, y as u8, 7, 255]);
            }
        }
        frame
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
    fn test_blit_exact() {
        let src = rgba_frame(4, 3);
        let mut bits = vec![0u8; 4 * 3 * 4];
        let mut buf = WindowBuffer {
            width: 4,
            height: 3,
            stride: 4,
            bits: &mut bits,
        };
        assert_eq!(blit_rgba(&src, 4, 3, &mut buf), 12);
        assert_eq!(bits, src);
    }

    #[test]
    fn test_blit_clipped() {
        let src = rgba_frame(8, 6);
        // 5x4 destination with a stride of 6 pixels
        let mut bits = vec![0xAAu8; 6 * 4 * 4];
        let mut buf = WindowBuffer {
            width: 5,
            height: 4,
            stride: 6,
            bits: &mut bits,
        };
        assert_eq!(blit_rgba(&src, 8, 6, &mut buf), 5 * 4);

        for y in 0..4 {
            for x in 0..6 {
                let px = &bits[(y * 6 + x) * 4..(y * 6 + x) * 4 + 4];
                if x < 5 {
                    assert_eq!(px, &[x as u8, y as u8, 7, 255]);
                } else {
                    assert_eq!(px, &[0xAA; 4], "stride padding must be untouched");
                }
            }
        }
    }

    #[test]
    fn test_blit_larger_destination() {
        let src = rgba_frame(2, 2);
        let mut bits = vec![0u8; 4 * 4 * 4];
        let mut buf = WindowBuffer {
            width: 4,
            height: 4,
            stride: 4,
            bits: &mut bits,
        };
        assert_eq!(blit_rgba(&src, 2, 2, &mut buf), 4);
        assert_eq!(&bits[16..32], &[0u8; 16]);
        assert_eq!(&bits[32..64], &[0u8; 32]);
    }

    #[test]
    fn test_blit_short_source() {
        let src = rgba_frame(4, 2);
        let mut bits = vec![0u8; 4 * 4 * 4];
        let mut buf = WindowBuffer {
            width: 4,
            height: 4,
            stride: 4,
            bits: &mut bits,
        };
        // claims 4 rows but only carries 2
        assert_eq!(blit_rgba(&src, 4, 4, &mut buf), 8);
    }

    fn streaming_device(id: DeviceId) -> Arc<SimulatedDevice> {
        let sim = Arc::new(SimulatedDevice::new().with_camera(id));
        sim.resize(id, RawFrameType::Yuyv, 640, 480).unwrap();
        sim.start(id).unwrap();
        sim
    }

    fn bound_slot(surface: Arc<MemorySurface>) -> SurfaceSlot {
        Arc::new(Mutex::new(Some(SurfaceBinding::new(surface))))
    }

    fn source(driver: Arc<SimulatedDevice>, id: DeviceId) -> CaptureSource {
        CaptureSource {
            driver,
            device_id: id,
            width: 640,
            height: 480,
        }
    }

    fn unlimited() -> CaptureConfig {
        CaptureConfig::default().with_target_fps(0)
    }

    #[test]
    fn test_loop_posts_frames() {
        // native YUYV delivery exercises the software conversion
        let sim = Arc::new(
            SimulatedDevice::new()
                .with_camera(1)
                .with_rgbx_output(false),
        );
        sim.start(1).unwrap();
        let surface = Arc::new(MemorySurface::resizable());
        surface.set_buffers_geometry(640, 480).unwrap();
        let slot = bound_slot(surface.clone());

        let mut capture = CaptureLoop::start(
            source(sim.clone(), 1),
            CaptureSinks::new(slot),
            vec![0u8; 640 * 480 * 4],
            unlimited(),
        )
        .unwrap();
        assert!(capture.is_running());

        let stats = capture.stats();
        assert!(wait_for(Duration::from_secs(5), || stats.frame_count() >= 3));

        capture.stop();
        assert!(!capture.is_running());
        let frames = stats.frame_count();
        assert_eq!(surface.posts() as u64, frames);
        assert!(stats.frame_rate() > 0.0);
        assert_eq!(stats.bytes(), frames * 640 * 480 * 4);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(stats.frame_count(), frames, "no frames after stop");
        assert_eq!(surface.pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_not_ready_is_absorbed() {
        let sim = Arc::new(
            SimulatedDevice::new()
                .with_camera(2)
                .with_not_ready(5),
        );
        sim.start(2).unwrap();
        let surface = Arc::new(MemorySurface::resizable());
        surface.set_buffers_geometry(640, 480).unwrap();

        let capture = CaptureLoop::start(
            source(sim.clone(), 2),
            CaptureSinks::new(bound_slot(surface)),
            vec![0u8; 640 * 480 * 4],
            unlimited(),
        )
        .unwrap();
        let stats = capture.stats();
        assert!(wait_for(Duration::from_secs(5), || stats.frame_count() >= 1));
        assert!(sim.pulls() >= 6);
        assert_eq!(stats.pull_errors(), 0);
        drop(capture);
    }

    #[test]
    fn test_lock_failure_skips_frame() {
        let sim = streaming_device(3);
        let surface = Arc::new(MemorySurface::resizable());
        surface.set_buffers_geometry(640, 480).unwrap();
        surface.set_fail_lock(true);

        let mut capture = CaptureLoop::start(
            source(sim.clone(), 3),
            CaptureSinks::new(bound_slot(surface.clone())),
            vec![0u8; 640 * 480 * 4],
            unlimited(),
        )
        .unwrap();
        let stats = capture.stats();
        assert!(wait_for(Duration::from_secs(5), || surface.lock_failures() >= 3));
        assert_eq!(stats.frame_count(), 0);
        assert!(capture.is_running());

        surface.set_fail_lock(false);
        assert!(wait_for(Duration::from_secs(5), || stats.frame_count() >= 1));
        capture.stop();
    }

    #[test]
    fn test_pull_errors_keep_loop_alive() {
        let sim = streaming_device(4);
        sim.set_pull_error(Some(-5));
        let surface = Arc::new(MemorySurface::resizable());
        surface.set_buffers_geometry(640, 480).unwrap();

        let mut capture = CaptureLoop::start(
            source(sim.clone(), 4),
            CaptureSinks::new(bound_slot(surface)),
            vec![0u8; 640 * 480 * 4],
            unlimited(),
        )
        .unwrap();
        let stats = capture.stats();
        assert!(wait_for(Duration::from_secs(5), || stats.pull_errors() >= 2));
        sim.set_pull_error(None);
        assert!(wait_for(Duration::from_secs(5), || stats.frame_count() >= 1));
        capture.stop();
    }

    #[test]
    fn test_rate_limit() {
        let sim = streaming_device(5);
        let surface = Arc::new(MemorySurface::resizable());
        surface.set_buffers_geometry(640, 480).unwrap();

        let mut capture = CaptureLoop::start(
            source(sim.clone(), 5),
            CaptureSinks::new(bound_slot(surface)),
            vec![0u8; 640 * 480 * 4],
            CaptureConfig::default().with_target_fps(10),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(250));
        capture.stop();
        // 10 fps over 250ms allows at most 3 frames
        assert!(capture.stats().frame_count() <= 3);
        assert!(sim.pulls() <= 3);
    }

    #[test]
    fn test_preview_and_callback_sinks() {
        let sim = streaming_device(7);
        let recording = Arc::new(MemorySurface::resizable());
        recording.set_buffers_geometry(640, 480).unwrap();
        let preview = Arc::new(MemorySurface::new(320, 240));

        let calls = Arc::new(AtomicU64::new(0));
        let callback: FrameCallback = {
            let calls = Arc::clone(&calls);
            Box::new(move |raw: &[u8], info: FrameInfo| {
                assert_eq!((info.width, info.height), (640, 480));
                assert_eq!(raw.len(), info.len);
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let sinks = CaptureSinks::new(bound_slot(recording.clone()))
            .with_preview(bound_slot(preview.clone()))
            .with_frame_callback(callback);

        let mut capture =
            CaptureLoop::start(source(sim, 7), sinks, vec![0u8; 640 * 480 * 4], unlimited())
                .unwrap();
        let stats = capture.stats();
        assert!(wait_for(Duration::from_secs(5), || {
            preview.posts() >= 3 && calls.load(Ordering::SeqCst) >= 3
        }));
        capture.stop();

        let frames = stats.frame_count();
        assert_eq!(recording.posts() as u64, frames);
        assert_eq!(preview.posts() as u64, frames);
        assert_eq!(calls.load(Ordering::SeqCst), frames);
        // only the recording surface is accounted in bytes
        assert_eq!(stats.bytes(), frames * 640 * 480 * 4);
        assert_eq!(preview.pixel(319, 239)[3], 255);
    }

    #[test]
    fn test_callback_sees_compressed_frames() {
        let sim = Arc::new(
            SimulatedDevice::new()
                .with_camera(8)
                .with_rgbx_output(false),
        );
        sim.resize(8, RawFrameType::Mjpeg, 640, 480).unwrap();
        sim.start(8).unwrap();

        let seen: Arc<Mutex<Vec<(RawFrameType, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));
        let callback: FrameCallback = {
            let seen = Arc::clone(&seen);
            Box::new(move |raw: &[u8], info: FrameInfo| {
                seen.lock().unwrap().push((info.frame_type, raw.to_vec()));
            })
        };
        let empty: SurfaceSlot = Arc::new(Mutex::new(None));
        let sinks = CaptureSinks::new(empty).with_frame_callback(callback);

        let mut capture =
            CaptureLoop::start(source(sim, 8), sinks, vec![0u8; 640 * 480 * 4], unlimited())
                .unwrap();
        let stats = capture.stats();
        assert!(wait_for(Duration::from_secs(5), || stats.frame_count() >= 2));
        capture.stop();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len() as u64, stats.frame_count());
        for (frame_type, raw) in seen.iter() {
            assert_eq!(*frame_type, RawFrameType::Mjpeg);
            assert_eq!(&raw[..2], &[0xFF, 0xD8]);
            assert_eq!(&raw[raw.len() - 2..], &[0xFF, 0xD9]);
        }
        assert_eq!(stats.bytes(), 0);
    }

    #[test]
    fn test_callback_swapped_while_running() {
        let sim = streaming_device(9);
        let slot: CallbackSlot = Arc::new(Mutex::new(None));
        let empty: SurfaceSlot = Arc::new(Mutex::new(None));
        let sinks = CaptureSinks::new(empty).with_callback_slot(Arc::clone(&slot));

        let mut capture =
            CaptureLoop::start(source(sim, 9), sinks, vec![0u8; 640 * 480 * 4], unlimited())
                .unwrap();
        let stats = capture.stats();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(stats.frame_count(), 0, "no sink, nothing delivered");

        let calls = Arc::new(AtomicU64::new(0));
        {
            let calls = Arc::clone(&calls);
            *lock_callback(&slot) = Some(Box::new(move |_: &[u8], _: FrameInfo| {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(wait_for(Duration::from_secs(5), || calls.load(Ordering::SeqCst) >= 2));

        lock_callback(&slot).take();
        let after = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), after);
        capture.stop();
    }

    #[test]
    fn test_resume_keeps_counting() {
        let sim = streaming_device(10);
        let surface = Arc::new(MemorySurface::resizable());
        surface.set_buffers_geometry(640, 480).unwrap();
        let sinks = CaptureSinks::new(bound_slot(surface.clone()));

        let mut first = CaptureLoop::start(
            source(sim.clone(), 10),
            sinks.clone(),
            vec![0u8; 640 * 480 * 4],
            unlimited(),
        )
        .unwrap();
        let stats = first.stats();
        assert!(wait_for(Duration::from_secs(5), || stats.frame_count() >= 2));
        first.stop();
        let frames = stats.frame_count();

        let mut second = CaptureLoop::resume(
            source(sim, 10),
            sinks,
            vec![0u8; 640 * 480 * 4],
            unlimited(),
            Arc::clone(&stats),
        )
        .unwrap();
        assert!(Arc::ptr_eq(&second.stats(), &stats));
        assert!(wait_for(Duration::from_secs(5), || stats.frame_count() > frames));
        second.stop();
        assert_eq!(surface.posts() as u64, stats.frame_count());
    }

    #[test]
    fn test_stop_twice() {
        let sim = streaming_device(6);
        let slot: SurfaceSlot = Arc::new(Mutex::new(None));
        let mut capture =
            CaptureLoop::start(source(sim, 6), CaptureSinks::new(slot), vec![0u8; 16], unlimited())
                .unwrap();
        capture.stop();
        capture.stop();
        assert!(!capture.is_running());
        assert_eq!(capture.stats().frame_count(), 0);
    }
}
