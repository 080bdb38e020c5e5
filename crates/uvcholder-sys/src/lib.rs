// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::type_complexity)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

include!("ffi.rs");

// Re-export libloading for error handling
pub use libloading;

use std::sync::{Mutex, OnceLock};

static LIBRARY: OnceLock<AandUsbLibrary> = OnceLock::new();
static WINDOW_LIBRARY: OnceLock<NativeWindowLibrary> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Load the UVC driver library (`libaandusb.so`).
///
/// The environment variable `AANDUSB_LIBRARY` overrides the path. Repeated
/// calls return the already loaded library.
pub fn init() -> Result<&'static AandUsbLibrary, libloading::Error> {
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    // Double-check after acquiring lock
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let lib_path =
        std::env::var("AANDUSB_LIBRARY").unwrap_or_else(|_| "libaandusb.so".to_string());
    let lib = unsafe { AandUsbLibrary::new(lib_path.as_str())? };

    Ok(LIBRARY.get_or_init(|| lib))
}

/// Load the platform window library (`libandroid.so`) providing the
/// `ANativeWindow_*` entry points.
///
/// The environment variable `ANDROID_LIBRARY` overrides the path.
pub fn init_window() -> Result<&'static NativeWindowLibrary, libloading::Error> {
    if let Some(lib) = WINDOW_LIBRARY.get() {
        return Ok(lib);
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    if let Some(lib) = WINDOW_LIBRARY.get() {
        return Ok(lib);
    }

    let lib_path =
        std::env::var("ANDROID_LIBRARY").unwrap_or_else(|_| "libandroid.so".to_string());
    let lib = unsafe { NativeWindowLibrary::new(lib_path.as_str())? };

    Ok(WINDOW_LIBRARY.get_or_init(|| lib))
}

/// Get the driver library if [`init`] has succeeded.
pub fn try_library() -> Option<&'static AandUsbLibrary> {
    LIBRARY.get()
}

/// Get the window library if [`init_window`] has succeeded.
pub fn try_window_library() -> Option<&'static NativeWindowLibrary> {
    WINDOW_LIBRARY.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_layouts() {
        assert_eq!(std::mem::size_of::<usb_device_info_t>(), 2 + 4 + 4 + 4 + 4 * 128);
        assert_eq!(std::mem::size_of::<uvc_control_info_t>(), 8 + 7 * 4);
        assert_eq!(
            std::mem::size_of::<uvc_video_size_t>(),
            4 * 5 + 2 * std::mem::size_of::<usize>() + 2 * 4
        );
    }

    #[test]
    fn pan_tilt_share_low_bit() {
        assert_eq!(CTRL_PAN_ABS & 0xffff, 0x800);
        assert_eq!(CTRL_TILT_ABS & 0xffff, 0x800);
        assert_ne!(CTRL_PAN_ABS, CTRL_TILT_ABS);
    }

    #[test]
    fn missing_library_is_an_error() {
        let res = unsafe { AandUsbLibrary::new("/nonexistent/libaandusb.so") };
        assert!(res.is_err());
    }
}
