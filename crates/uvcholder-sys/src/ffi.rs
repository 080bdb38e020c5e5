// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

// Declarations for aandusb_native.h and android/native_window.h, laid out
// the way bindgen emits them with --dynamic-loading.

use std::os::raw::{c_int, c_void};

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct manager {
    _unused: [u8; 0],
}
pub type usb_manager_t = manager;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct ANativeWindow {
    _unused: [u8; 0],
}

pub type on_device_attach_t = ::std::option::Option<
    unsafe extern "C" fn(manager: *mut usb_manager_t, callback_args: *mut c_void, device_id: i32),
>;
pub type on_device_detach_t = ::std::option::Option<
    unsafe extern "C" fn(manager: *mut usb_manager_t, callback_args: *mut c_void, device_id: i32),
>;

pub const device_state_UNINITIALIZED: device_state = -1;
pub const device_state_DISCONNECTED: device_state = 0;
pub const device_state_CONNECTED: device_state = 1;
pub const device_state_STREAMING: device_state = 2;
pub type device_state = c_int;
pub use self::device_state as device_state_t;

pub const uvc_raw_frame_RAW_FRAME_UNKNOWN: uvc_raw_frame = 0;
pub const uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_YUYV: uvc_raw_frame = 0x00010005;
pub const uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_NV21: uvc_raw_frame = 0x00050005;
pub const uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_NV12: uvc_raw_frame = 0x000b0005;
pub const uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_RGB565: uvc_raw_frame = 0x000d0005;
pub const uvc_raw_frame_RAW_FRAME_UNCOMPRESSED_RGBX: uvc_raw_frame = 0x00100005;
pub const uvc_raw_frame_RAW_FRAME_MJPEG: uvc_raw_frame = 0x00000007;
pub const uvc_raw_frame_RAW_FRAME_H264: uvc_raw_frame = 0x00000014;
pub type uvc_raw_frame = u32;
pub use self::uvc_raw_frame as uvc_raw_frame_t;

pub const CTRL_SCANNING: u64 = 0x00000001;
pub const CTRL_AE: u64 = 0x00000002;
pub const CTRL_AE_PRIORITY: u64 = 0x00000004;
pub const CTRL_AE_ABS: u64 = 0x00000008;
pub const CTRL_FOCUS_ABS: u64 = 0x00000020;
pub const CTRL_IRIS_ABS: u64 = 0x00000080;
pub const CTRL_ZOOM_ABS: u64 = 0x00000200;
pub const CTRL_PAN_ABS: u64 = 0x01000800;
pub const CTRL_TILT_ABS: u64 = 0x02000800;
pub const CTRL_ROLL_ABS: u64 = 0x00002000;
pub const CTRL_FOCUS_AUTO: u64 = 0x00020000;
pub const CTRL_PRIVACY: u64 = 0x00040000;

pub const PU_BRIGHTNESS: u64 = 0x00000001;
pub const PU_CONTRAST: u64 = 0x00000002;
pub const PU_HUE: u64 = 0x00000004;
pub const PU_SATURATION: u64 = 0x00000008;
pub const PU_SHARPNESS: u64 = 0x00000010;
pub const PU_GAMMA: u64 = 0x00000020;
pub const PU_WB_TEMP: u64 = 0x00000040;
pub const PU_WB_COMPO: u64 = 0x00000080;
pub const PU_BACKLIGHT: u64 = 0x00000100;
pub const PU_GAIN: u64 = 0x00000200;
pub const PU_POWER_LF: u64 = 0x00000400;
pub const PU_HUE_AUTO: u64 = 0x00000800;
pub const PU_WB_TEMP_AUTO: u64 = 0x00001000;
pub const PU_WB_COMPO_AUTO: u64 = 0x00002000;
pub const PU_CONTRAST_AUTO: u64 = 0x00040000;
pub const PU_MASK: u64 = 0x80000000;

pub const WINDOW_FORMAT_RGBA_8888: i32 = 1;

#[repr(C, packed)]
#[derive(Debug, Copy, Clone)]
pub struct usb_device_info {
    pub bcd_usb: u16,
    pub vendor_id: u32,
    pub product_id: u32,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub reserved1: u8,
    pub name: [u8; 128usize],
    pub manufacturer_name: [u8; 128usize],
    pub product_name: [u8; 128usize],
    pub serial: [u8; 128usize],
}
pub type usb_device_info_t = usb_device_info;

impl Default for usb_device_info {
    fn default() -> Self {
        let mut s = ::std::mem::MaybeUninit::<Self>::uninit();
        unsafe {
            ::std::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
            s.assume_init()
        }
    }
}

#[repr(C, packed)]
#[derive(Debug, Default, Copy, Clone)]
pub struct _uvc_control_info {
    pub type_: u64,
    pub initialized: i32,
    pub has_min_max: i32,
    pub def: i32,
    pub current: i32,
    pub res: i32,
    pub min: i32,
    pub max: i32,
}
pub type uvc_control_info_t = _uvc_control_info;

#[repr(C, packed)]
#[derive(Debug, Copy, Clone)]
pub struct uvc_video_size {
    pub frame_type: u32,
    pub frame_index: i32,
    pub width: u32,
    pub height: u32,
    pub frame_interval_type: i32,
    pub frame_intervals: *mut u32,
    pub num_frame_intervals: i32,
    pub fps: *mut f32,
    pub num_fps: i32,
}
pub type uvc_video_size_t = uvc_video_size;

impl Default for uvc_video_size {
    fn default() -> Self {
        let mut s = ::std::mem::MaybeUninit::<Self>::uninit();
        unsafe {
            ::std::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
            s.assume_init()
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct ARect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct ANativeWindow_Buffer {
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: i32,
    pub bits: *mut c_void,
    pub reserved: [u32; 6usize],
}

impl Default for ANativeWindow_Buffer {
    fn default() -> Self {
        let mut s = ::std::mem::MaybeUninit::<Self>::uninit();
        unsafe {
            ::std::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
            s.assume_init()
        }
    }
}

pub struct AandUsbLibrary {
    __library: ::libloading::Library,
    pub manager_init: unsafe extern "C" fn(
        args: *mut c_void,
        on_attach: on_device_attach_t,
        on_detach: on_device_detach_t,
    ) -> *mut usb_manager_t,
    pub manager_release: unsafe extern "C" fn(manager: *mut usb_manager_t),
    pub usb_get_device_info: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        info: *mut usb_device_info_t,
    ) -> c_int,
    pub uvc_get_device_state:
        unsafe extern "C" fn(manager: *mut usb_manager_t, device_id: i32) -> device_state_t,
    pub uvc_set_config: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        enabled: i32,
        use_first_config: u8,
    ) -> c_int,
    pub uvc_resize: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        frame_type: u32,
        width: u32,
        height: u32,
    ) -> c_int,
    pub uvc_start: unsafe extern "C" fn(manager: *mut usb_manager_t, device_id: i32) -> c_int,
    pub uvc_stop: unsafe extern "C" fn(manager: *mut usb_manager_t, device_id: i32) -> c_int,
    pub uvc_get_ctrl_supports:
        unsafe extern "C" fn(manager: *mut usb_manager_t, device_id: i32) -> u64,
    pub uvc_get_proc_supports:
        unsafe extern "C" fn(manager: *mut usb_manager_t, device_id: i32) -> u64,
    pub uvc_get_control_info: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        info: *mut uvc_control_info_t,
    ) -> c_int,
    pub uvc_set_control_value: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        type_: u64,
        value: i32,
    ) -> c_int,
    pub uvc_get_control_value: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        type_: u64,
        value: *mut i32,
    ) -> c_int,
    pub uvc_get_supported_size: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        index: i32,
        num_supported: *mut i32,
        size: *mut uvc_video_size_t,
    ) -> c_int,
    pub uvc_get_current_size: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        size: *mut uvc_video_size_t,
    ) -> c_int,
    pub uvc_get_frame: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        frame_type: *mut u32,
        width: *mut u32,
        height: *mut u32,
        data: *mut u8,
        data_len: *mut u32,
        pts_us: *mut i64,
        flags: *mut u32,
    ) -> c_int,
    pub uvc_set_surface: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        surface: *mut ANativeWindow,
        mvp_matrix: *mut f32,
    ) -> c_int,
    pub uvc_set_mvp_matrix: unsafe extern "C" fn(
        manager: *mut usb_manager_t,
        device_id: i32,
        mvp_matrix: *mut f32,
    ) -> c_int,
}

impl AandUsbLibrary {
    pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
    where
        P: AsRef<::std::ffi::OsStr>,
    {
        let library = ::libloading::Library::new(path)?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, ::libloading::Error>
    where
        L: Into<::libloading::Library>,
    {
        let __library = library.into();
        let manager_init = __library.get(b"manager_init\0").map(|sym| *sym)?;
        let manager_release = __library.get(b"manager_release\0").map(|sym| *sym)?;
        let usb_get_device_info = __library.get(b"usb_get_device_info\0").map(|sym| *sym)?;
        let uvc_get_device_state = __library.get(b"uvc_get_device_state\0").map(|sym| *sym)?;
        let uvc_set_config = __library.get(b"uvc_set_config\0").map(|sym| *sym)?;
        let uvc_resize = __library.get(b"uvc_resize\0").map(|sym| *sym)?;
        let uvc_start = __library.get(b"uvc_start\0").map(|sym| *sym)?;
        let uvc_stop = __library.get(b"uvc_stop\0").map(|sym| *sym)?;
        let uvc_get_ctrl_supports = __library.get(b"uvc_get_ctrl_supports\0").map(|sym| *sym)?;
        let uvc_get_proc_supports = __library.get(b"uvc_get_proc_supports\0").map(|sym| *sym)?;
        let uvc_get_control_info = __library.get(b"uvc_get_control_info\0").map(|sym| *sym)?;
        let uvc_set_control_value = __library.get(b"uvc_set_control_value\0").map(|sym| *sym)?;
        let uvc_get_control_value = __library.get(b"uvc_get_control_value\0").map(|sym| *sym)?;
        let uvc_get_supported_size = __library.get(b"uvc_get_supported_size\0").map(|sym| *sym)?;
        let uvc_get_current_size = __library.get(b"uvc_get_current_size\0").map(|sym| *sym)?;
        let uvc_get_frame = __library.get(b"uvc_get_frame\0").map(|sym| *sym)?;
        let uvc_set_surface = __library.get(b"uvc_set_surface\0").map(|sym| *sym)?;
        let uvc_set_mvp_matrix = __library.get(b"uvc_set_mvp_matrix\0").map(|sym| *sym)?;
        Ok(AandUsbLibrary {
            __library,
            manager_init,
            manager_release,
            usb_get_device_info,
            uvc_get_device_state,
            uvc_set_config,
            uvc_resize,
            uvc_start,
            uvc_stop,
            uvc_get_ctrl_supports,
            uvc_get_proc_supports,
            uvc_get_control_info,
            uvc_set_control_value,
            uvc_get_control_value,
            uvc_get_supported_size,
            uvc_get_current_size,
            uvc_get_frame,
            uvc_set_surface,
            uvc_set_mvp_matrix,
        })
    }

    pub unsafe fn manager_init(
        &self,
        args: *mut c_void,
        on_attach: on_device_attach_t,
        on_detach: on_device_detach_t,
    ) -> *mut usb_manager_t {
        (self.manager_init)(args, on_attach, on_detach)
    }

    pub unsafe fn manager_release(&self, manager: *mut usb_manager_t) {
        (self.manager_release)(manager)
    }

    pub unsafe fn usb_get_device_info(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        info: *mut usb_device_info_t,
    ) -> c_int {
        (self.usb_get_device_info)(manager, device_id, info)
    }

    pub unsafe fn uvc_get_device_state(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
    ) -> device_state_t {
        (self.uvc_get_device_state)(manager, device_id)
    }

    pub unsafe fn uvc_set_config(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        enabled: i32,
        use_first_config: u8,
    ) -> c_int {
        (self.uvc_set_config)(manager, device_id, enabled, use_first_config)
    }

    pub unsafe fn uvc_resize(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        frame_type: u32,
        width: u32,
        height: u32,
    ) -> c_int {
        (self.uvc_resize)(manager, device_id, frame_type, width, height)
    }

    pub unsafe fn uvc_start(&self, manager: *mut usb_manager_t, device_id: i32) -> c_int {
        (self.uvc_start)(manager, device_id)
    }

    pub unsafe fn uvc_stop(&self, manager: *mut usb_manager_t, device_id: i32) -> c_int {
        (self.uvc_stop)(manager, device_id)
    }

    pub unsafe fn uvc_get_ctrl_supports(&self, manager: *mut usb_manager_t, device_id: i32) -> u64 {
        (self.uvc_get_ctrl_supports)(manager, device_id)
    }

    pub unsafe fn uvc_get_proc_supports(&self, manager: *mut usb_manager_t, device_id: i32) -> u64 {
        (self.uvc_get_proc_supports)(manager, device_id)
    }

    pub unsafe fn uvc_get_control_info(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        info: *mut uvc_control_info_t,
    ) -> c_int {
        (self.uvc_get_control_info)(manager, device_id, info)
    }

    pub unsafe fn uvc_set_control_value(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        type_: u64,
        value: i32,
    ) -> c_int {
        (self.uvc_set_control_value)(manager, device_id, type_, value)
    }

    pub unsafe fn uvc_get_control_value(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        type_: u64,
        value: *mut i32,
    ) -> c_int {
        (self.uvc_get_control_value)(manager, device_id, type_, value)
    }

    pub unsafe fn uvc_get_supported_size(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        index: i32,
        num_supported: *mut i32,
        size: *mut uvc_video_size_t,
    ) -> c_int {
        (self.uvc_get_supported_size)(manager, device_id, index, num_supported, size)
    }

    pub unsafe fn uvc_get_current_size(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        size: *mut uvc_video_size_t,
    ) -> c_int {
        (self.uvc_get_current_size)(manager, device_id, size)
    }

    pub unsafe fn uvc_get_frame(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        frame_type: *mut u32,
        width: *mut u32,
        height: *mut u32,
        data: *mut u8,
        data_len: *mut u32,
        pts_us: *mut i64,
        flags: *mut u32,
    ) -> c_int {
        (self.uvc_get_frame)(
            manager, device_id, frame_type, width, height, data, data_len, pts_us, flags,
        )
    }

    pub unsafe fn uvc_set_surface(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        surface: *mut ANativeWindow,
        mvp_matrix: *mut f32,
    ) -> c_int {
        (self.uvc_set_surface)(manager, device_id, surface, mvp_matrix)
    }

    pub unsafe fn uvc_set_mvp_matrix(
        &self,
        manager: *mut usb_manager_t,
        device_id: i32,
        mvp_matrix: *mut f32,
    ) -> c_int {
        (self.uvc_set_mvp_matrix)(manager, device_id, mvp_matrix)
    }
}

pub struct NativeWindowLibrary {
    __library: ::libloading::Library,
    pub ANativeWindow_acquire: unsafe extern "C" fn(window: *mut ANativeWindow),
    pub ANativeWindow_release: unsafe extern "C" fn(window: *mut ANativeWindow),
    pub ANativeWindow_setBuffersGeometry: unsafe extern "C" fn(
        window: *mut ANativeWindow,
        width: i32,
        height: i32,
        format: i32,
    ) -> i32,
    pub ANativeWindow_lock: unsafe extern "C" fn(
        window: *mut ANativeWindow,
        out_buffer: *mut ANativeWindow_Buffer,
        in_out_dirty_bounds: *mut ARect,
    ) -> i32,
    pub ANativeWindow_unlockAndPost: unsafe extern "C" fn(window: *mut ANativeWindow) -> i32,
}

impl NativeWindowLibrary {
    pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
    where
        P: AsRef<::std::ffi::OsStr>,
    {
        let library = ::libloading::Library::new(path)?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, ::libloading::Error>
    where
        L: Into<::libloading::Library>,
    {
        let __library = library.into();
        let ANativeWindow_acquire = __library.get(b"ANativeWindow_acquire\0").map(|sym| *sym)?;
        let ANativeWindow_release = __library.get(b"ANativeWindow_release\0").map(|sym| *sym)?;
        let ANativeWindow_setBuffersGeometry = __library
            .get(b"ANativeWindow_setBuffersGeometry\0")
            .map(|sym| *sym)?;
        let ANativeWindow_lock = __library.get(b"ANativeWindow_lock\0").map(|sym| *sym)?;
        let ANativeWindow_unlockAndPost = __library
            .get(b"ANativeWindow_unlockAndPost\0")
            .map(|sym| *sym)?;
        Ok(NativeWindowLibrary {
            __library,
            ANativeWindow_acquire,
            ANativeWindow_release,
            ANativeWindow_setBuffersGeometry,
            ANativeWindow_lock,
            ANativeWindow_unlockAndPost,
        })
    }

    pub unsafe fn ANativeWindow_acquire(&self, window: *mut ANativeWindow) {
        (self.ANativeWindow_acquire)(window)
    }

    pub unsafe fn ANativeWindow_release(&self, window: *mut ANativeWindow) {
        (self.ANativeWindow_release)(window)
    }

    pub unsafe fn ANativeWindow_setBuffersGeometry(
        &self,
        window: *mut ANativeWindow,
        width: i32,
        height: i32,
        format: i32,
    ) -> i32 {
        (self.ANativeWindow_setBuffersGeometry)(window, width, height, format)
    }

    pub unsafe fn ANativeWindow_lock(
        &self,
        window: *mut ANativeWindow,
        out_buffer: *mut ANativeWindow_Buffer,
        in_out_dirty_bounds: *mut ARect,
    ) -> i32 {
        (self.ANativeWindow_lock)(window, out_buffer, in_out_dirty_bounds)
    }

    pub unsafe fn ANativeWindow_unlockAndPost(&self, window: *mut ANativeWindow) -> i32 {
        (self.ANativeWindow_unlockAndPost)(window)
    }
}
