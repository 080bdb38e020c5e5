// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    controls::{ControlId, ControlInfo},
    driver::{
        DeviceDriver, DeviceInfo, DeviceState, FrameInfo, FrameRequest, OnDeviceEvent, Pull,
        Transform,
    },
    format::{FrameIntervals, VideoFormat},
    frame_type::RawFrameType,
    surface::{PlatformSurface, WindowBuffer},
    uvc, DeviceId, Error,
};
use log::{debug, trace};
use std::{
    ffi::{c_void, CStr},
    fmt,
    os::raw::c_int,
    ptr::{self, NonNull},
    sync::{Mutex, MutexGuard, Weak},
};
use uvcholder_sys as ffi;

fn check(status: c_int) -> Result<(), Error> {
    if status < 0 {
        Err(Error::Driver(status))
    } else {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Attach/detach receiver shared with the driver's callbacks.
///
/// Events arriving before a listener subscribes are queued and replayed on
/// [`NativeDriver::subscribe`].
#[derive(Default)]
struct EventSlot {
    listener: Mutex<Option<Weak<dyn OnDeviceEvent>>>,
    pending: Mutex<Vec<(DeviceId, bool)>>,
}

impl EventSlot {
    /// Deliver an event, or queue it while nobody listens. The listener lock
    /// is held across delivery so a concurrent replay finishes first.
    fn dispatch(&self, id: DeviceId, attached: bool) {
        let slot = lock(&self.listener);
        match slot.as_ref().and_then(Weak::upgrade) {
            Some(listener) => listener.on_device_event(id, attached),
            None => {
                debug!("no listener yet, queued device {} attached={}", id, attached);
                lock(&self.pending).push((id, attached));
            }
        }
    }

    /// Replay queued events to `listener`, then install it, all under the
    /// listener lock.
    fn subscribe(&self, listener: Weak<dyn OnDeviceEvent>) {
        let mut slot = lock(&self.listener);
        let pending = std::mem::take(&mut *lock(&self.pending));
        if let Some(listener) = listener.upgrade() {
            for (id, attached) in pending {
                listener.on_device_event(id, attached);
            }
        }
        *slot = Some(listener);
    }
}

unsafe extern "C" fn on_attach(_manager: *mut ffi::usb_manager_t, args: *mut c_void, id: i32) {
    // SAFETY: args is the EventSlot boxed by NativeDriver, released after the manager
    if let Some(slot) = unsafe { args.cast::<EventSlot>().as_ref() } {
        slot.dispatch(id, true);
    }
}

unsafe extern "C" fn on_detach(_manager: *mut ffi::usb_manager_t, args: *mut c_void, id: i32) {
    // SAFETY: see on_attach
    if let Some(slot) = unsafe { args.cast::<EventSlot>().as_ref() } {
        slot.dispatch(id, false);
    }
}

/// [`DeviceDriver`] over the aAndUsb driver library.
///
/// Loading the library and creating the USB manager happen in
/// [`NativeDriver::new`]; the manager is released on drop.
pub struct NativeDriver {
    manager: NonNull<ffi::usb_manager_t>,
    events: Box<EventSlot>,
}

// The driver library serialises access to its manager internally.
unsafe impl Send for NativeDriver {}
unsafe impl Sync for NativeDriver {}

impl NativeDriver {
    /// Load `libaandusb.so` and create the USB manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryNotLoaded`] if the library cannot be loaded
    /// and [`Error::NullPointer`] if the manager cannot be created.
    pub fn new() -> Result<Self, Error> {
        let events = Box::new(EventSlot::default());
        let args = &*events as *const EventSlot as *mut c_void;
        let manager = uvc!(manager_init(args, Some(on_attach), Some(on_detach)));
        let manager = NonNull::new(manager).ok_or(Error::NullPointer)?;
        debug!("NativeDriver::new() - manager {:?}", manager);
        Ok(NativeDriver { manager, events })
    }

    /// Deliver attach and detach events to `listener`, starting with any
    /// that arrived before the call.
    pub fn subscribe(&self, listener: Weak<dyn OnDeviceEvent>) {
        self.events.subscribe(listener);
    }

    fn manager(&self) -> *mut ffi::usb_manager_t {
        self.manager.as_ptr()
    }

    fn library() -> Option<&'static ffi::AandUsbLibrary> {
        ffi::try_library()
    }
}

impl Drop for NativeDriver {
    fn drop(&mut self) {
        if let Some(lib) = NativeDriver::library() {
            debug!("NativeDriver::drop() - releasing manager");
            unsafe { lib.manager_release(self.manager()) };
        }
    }
}

impl fmt::Debug for NativeDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeDriver")
            .field("manager", &self.manager)
            .finish()
    }
}

fn c_string(bytes: &[u8]) -> String {
    CStr::from_bytes_until_nul(bytes)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
}

impl From<&ffi::usb_device_info_t> for DeviceInfo {
    fn from(info: &ffi::usb_device_info_t) -> Self {
        // copy out of the packed struct before borrowing
        let (name, manufacturer, product, serial) = (
            info.name,
            info.manufacturer_name,
            info.product_name,
            info.serial,
        );
        DeviceInfo {
            bcd_usb: info.bcd_usb,
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            device_class: info.device_class,
            device_subclass: info.device_subclass,
            device_protocol: info.device_protocol,
            name: c_string(&name),
            manufacturer: c_string(&manufacturer),
            product: c_string(&product),
            serial: c_string(&serial),
        }
    }
}

impl From<&ffi::uvc_control_info_t> for ControlInfo {
    fn from(info: &ffi::uvc_control_info_t) -> Self {
        ControlInfo {
            control: info.type_,
            initialized: info.initialized != 0,
            has_min_max: info.has_min_max != 0,
            default: info.def,
            current: info.current,
            resolution: info.res,
            min: info.min,
            max: info.max,
        }
    }
}

impl VideoFormat {
    /// Copy a driver format descriptor, including its interval and rate
    /// arrays.
    ///
    /// # Safety
    ///
    /// The interval and fps pointers of `raw` must be null or valid for the
    /// number of elements the descriptor claims.
    pub unsafe fn from_raw(raw: &ffi::uvc_video_size_t) -> Self {
        let interval_type = raw.frame_interval_type;
        let intervals_ptr = raw.frame_intervals;
        let num_intervals = usize::try_from(raw.num_frame_intervals).unwrap_or(0);
        let fps_ptr = raw.fps;
        let num_fps = usize::try_from(raw.num_fps).unwrap_or(0);

        let raw_intervals: &[u32] = if intervals_ptr.is_null() {
            &[]
        } else {
            // SAFETY: guaranteed by the caller
            unsafe { std::slice::from_raw_parts(intervals_ptr, num_intervals) }
        };
        let intervals = match (interval_type, raw_intervals) {
            (0, [min, max, step, ..]) => FrameIntervals::Stepwise {
                min: *min,
                max: *max,
                step: *step,
            },
            (n, list) if n > 0 => {
                let n = usize::try_from(n).unwrap_or(0).min(list.len());
                FrameIntervals::Discrete(list[..n].to_vec())
            }
            _ => FrameIntervals::default(),
        };

        let format = VideoFormat::new(RawFrameType::from_raw(raw.frame_type), raw.width, raw.height)
            .with_index(raw.frame_index)
            .with_intervals(intervals);

        if fps_ptr.is_null() || num_fps == 0 {
            return format;
        }
        // SAFETY: guaranteed by the caller
        let fps = unsafe { std::slice::from_raw_parts(fps_ptr, num_fps) };
        VideoFormat {
            fps: fps.to_vec(),
            ..format
        }
    }
}

impl DeviceDriver for NativeDriver {
    fn device_state(&self, id: DeviceId) -> DeviceState {
        match NativeDriver::library() {
            Some(lib) => DeviceState::from_raw(unsafe { lib.uvc_get_device_state(self.manager(), id) }),
            None => DeviceState::Uninitialized,
        }
    }

    fn device_info(&self, id: DeviceId) -> Result<DeviceInfo, Error> {
        let mut info = ffi::usb_device_info_t::default();
        check(uvc!(usb_get_device_info(self.manager(), id, &mut info)))?;
        Ok(DeviceInfo::from(&info))
    }

    fn set_config(&self, id: DeviceId, enabled: i32, use_first_config: bool) -> Result<(), Error> {
        check(uvc!(uvc_set_config(
            self.manager(),
            id,
            enabled,
            u8::from(use_first_config)
        )))
    }

    fn resize(
        &self,
        id: DeviceId,
        frame_type: RawFrameType,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        check(uvc!(uvc_resize(
            self.manager(),
            id,
            frame_type.as_raw(),
            width,
            height
        )))
    }

    fn start(&self, id: DeviceId) -> Result<(), Error> {
        check(uvc!(uvc_start(self.manager(), id)))
    }

    fn stop(&self, id: DeviceId) -> Result<(), Error> {
        check(uvc!(uvc_stop(self.manager(), id)))
    }

    fn supported_size(&self, id: DeviceId, index: i32) -> Result<(usize, VideoFormat), Error> {
        let mut num: i32 = 0;
        check(uvc!(uvc_get_supported_size(
            self.manager(),
            id,
            0,
            &mut num,
            ptr::null_mut()
        )))?;
        let count = usize::try_from(num)?;
        if index < 0 || index >= num {
            return Err(Error::IndexOutOfRange { index, count });
        }

        let mut size = ffi::uvc_video_size_t::default();
        check(uvc!(uvc_get_supported_size(
            self.manager(),
            id,
            index,
            &mut num,
            &mut size
        )))?;
        // SAFETY: the driver fills the arrays it describes
        let format = unsafe { VideoFormat::from_raw(&size) };
        trace!("device {} supported size {}: {}", id, index, format);
        Ok((count, format))
    }

    fn current_size(&self, id: DeviceId) -> Result<VideoFormat, Error> {
        let mut size = ffi::uvc_video_size_t::default();
        check(uvc!(uvc_get_current_size(self.manager(), id, &mut size)))?;
        // SAFETY: the driver fills the arrays it describes
        Ok(unsafe { VideoFormat::from_raw(&size) })
    }

    fn ctrl_supports(&self, id: DeviceId) -> u64 {
        NativeDriver::library()
            .map(|lib| unsafe { lib.uvc_get_ctrl_supports(self.manager(), id) })
            .unwrap_or(0)
    }

    fn proc_supports(&self, id: DeviceId) -> u64 {
        NativeDriver::library()
            .map(|lib| unsafe { lib.uvc_get_proc_supports(self.manager(), id) })
            .unwrap_or(0)
    }

    fn control_info(&self, id: DeviceId, control: ControlId) -> Result<ControlInfo, Error> {
        let mut info = ffi::uvc_control_info_t {
            type_: control,
            ..Default::default()
        };
        check(uvc!(uvc_get_control_info(self.manager(), id, &mut info)))?;
        Ok(ControlInfo::from(&info))
    }

    fn control_value(&self, id: DeviceId, control: ControlId) -> Result<i32, Error> {
        let mut value = 0;
        check(uvc!(uvc_get_control_value(
            self.manager(),
            id,
            control,
            &mut value
        )))?;
        Ok(value)
    }

    fn set_control_value(&self, id: DeviceId, control: ControlId, value: i32) -> Result<(), Error> {
        check(uvc!(uvc_set_control_value(
            self.manager(),
            id,
            control,
            value
        )))
    }

    fn get_frame(
        &self,
        id: DeviceId,
        request: &FrameRequest,
        buf: &mut [u8],
    ) -> Result<Pull, Error> {
        let mut frame_type = request.frame_type.as_raw();
        let mut width = request.width;
        let mut height = request.height;
        let mut len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let mut pts_us = 0;
        let mut flags = 0;

        let status = uvc!(uvc_get_frame(
            self.manager(),
            id,
            &mut frame_type,
            &mut width,
            &mut height,
            buf.as_mut_ptr(),
            &mut len,
            &mut pts_us,
            &mut flags
        ));
        if status < 0 {
            return Err(Error::Driver(status));
        }
        let len = usize::try_from(len)?.min(buf.len());
        if status > 0 || len == 0 {
            return Ok(Pull::NotReady);
        }

        Ok(Pull::Frame(FrameInfo {
            frame_type: RawFrameType::from_raw(frame_type),
            width,
            height,
            len,
            pts_us,
            flags,
        }))
    }

    fn set_surface(
        &self,
        id: DeviceId,
        surface: Option<&dyn PlatformSurface>,
        mvp: &Transform,
    ) -> Result<(), Error> {
        let window = match surface {
            Some(surface) => surface
                .native_handle()
                .ok_or(Error::NullPointer)?
                .cast::<ffi::ANativeWindow>()
                .as_ptr(),
            None => ptr::null_mut(),
        };
        let mut mvp = *mvp;
        check(uvc!(uvc_set_surface(
            self.manager(),
            id,
            window,
            mvp.as_mut_ptr()
        )))
    }

    fn set_mvp_matrix(&self, id: DeviceId, mvp: &Transform) -> Result<(), Error> {
        let mut mvp = *mvp;
        check(uvc!(uvc_set_mvp_matrix(
            self.manager(),
            id,
            mvp.as_mut_ptr()
        )))
    }
}

/// [`PlatformSurface`] over an `ANativeWindow`.
pub struct NativeWindow {
    lib: &'static ffi::NativeWindowLibrary,
    window: NonNull<ffi::ANativeWindow>,
}

unsafe impl Send for NativeWindow {}
unsafe impl Sync for NativeWindow {}

impl NativeWindow {
    /// Wrap a window handle, taking over one reference which is released
    /// on drop.
    ///
    /// # Safety
    ///
    /// `window` must be a valid `ANativeWindow` on which the caller holds a
    /// reference.
    pub unsafe fn from_raw(window: NonNull<c_void>) -> Result<Self, Error> {
        let lib = ffi::init_window()?;
        Ok(NativeWindow {
            lib,
            window: window.cast(),
        })
    }

    fn as_ptr(&self) -> *mut ffi::ANativeWindow {
        self.window.as_ptr()
    }
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        unsafe { self.lib.ANativeWindow_release(self.as_ptr()) };
    }
}

impl fmt::Debug for NativeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWindow")
            .field("window", &self.window)
            .finish()
    }
}

impl PlatformSurface for NativeWindow {
    fn acquire(&self) {
        unsafe { self.lib.ANativeWindow_acquire(self.as_ptr()) };
    }

    fn release(&self) {
        unsafe { self.lib.ANativeWindow_release(self.as_ptr()) };
    }

    fn set_buffers_geometry(&self, width: u32, height: u32) -> Result<(), Error> {
        let status = unsafe {
            self.lib.ANativeWindow_setBuffersGeometry(
                self.as_ptr(),
                i32::try_from(width)?,
                i32::try_from(height)?,
                ffi::WINDOW_FORMAT_RGBA_8888,
            )
        };
        if status != 0 {
            return Err(Error::Surface(status));
        }
        Ok(())
    }

    fn lock_and_post(&self, render: &mut dyn FnMut(&mut WindowBuffer<'_>)) -> Result<(), Error> {
        let mut buffer = ffi::ANativeWindow_Buffer::default();
        let status = unsafe {
            self.lib
                .ANativeWindow_lock(self.as_ptr(), &mut buffer, ptr::null_mut())
        };
        if status != 0 {
            return Err(Error::Surface(status));
        }

        let rendered = (|| -> Result<(), Error> {
            if buffer.format != ffi::WINDOW_FORMAT_RGBA_8888 {
                trace!("window buffer format {} is not RGBA_8888", buffer.format);
            }
            let bits = NonNull::new(buffer.bits.cast::<u8>()).ok_or(Error::NullPointer)?;
            let width = u32::try_from(buffer.width)?;
            let height = u32::try_from(buffer.height)?;
            let stride = u32::try_from(buffer.stride)?;
            let len = stride as usize * height as usize * 4;
            // SAFETY: a locked RGBA_8888 buffer spans stride * height pixels
            let bits = unsafe { std::slice::from_raw_parts_mut(bits.as_ptr(), len) };
            render(&mut WindowBuffer {
                width,
                height,
                stride,
                bits,
            });
            Ok(())
        })();

        let status = unsafe { self.lib.ANativeWindow_unlockAndPost(self.as_ptr()) };
        rendered?;
        if status != 0 {
            return Err(Error::Surface(status));
        }
        Ok(())
    }

    fn native_handle(&self) -> Option<NonNull<c_void>> {
        Some(self.window.cast())
    }
}
