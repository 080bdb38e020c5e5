// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! UVC Holder Library for Rust
//!
//! Per-device streaming holders for USB Video Class cameras driven through
//! the aAndUsb driver library. Each attached camera gets a [`StreamHolder`]
//! which caches its supported formats and controls and renders frames into
//! up to two platform surfaces:
//!
//! - a **preview** surface, composited by the driver itself (zero-copy path)
//! - a **recording** surface, fed by a background [`CaptureLoop`] which pulls
//!   frames, converts them to RGBA and blits them (pull path)
//!
//! Holders live in a [`DeviceRegistry`] which reacts to attach and detach
//! events and serves the id-keyed API used by the host application.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use uvcholder::{config::HolderConfig, native::NativeDriver, registry::DeviceRegistry};
//!
//! let driver = Arc::new(NativeDriver::new()?);
//! let registry = Arc::new(DeviceRegistry::new(driver.clone(), HolderConfig::default()));
//! driver.subscribe(Arc::downgrade(&registry) as _);
//!
//! for id in registry.device_ids() {
//!     println!("device {} is {:?}", id, registry.device_state(id));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Without a camera the [`sim`] module provides a software device and an
//! in-memory surface with the same interfaces.

use std::{collections::TryReserveError, error, fmt, io, num::TryFromIntError};
use uvcholder_sys as ffi;

/// Identifier assigned by the driver to an attached device.
pub type DeviceId = i32;

/// Error type for UVC holder operations
#[derive(Debug)]
pub enum Error {
    /// The driver library (libaandusb.so) or platform window library could
    /// not be loaded at runtime
    LibraryNotLoaded(ffi::libloading::Error),

    /// I/O error, for example failing to spawn the capture thread
    Io(io::Error),

    /// Integer conversion error (try_from failed)
    TryFromInt(TryFromIntError),

    /// Null pointer returned from the driver where a valid pointer was expected
    NullPointer,

    /// No holder exists for the device
    DeviceNotFound(DeviceId),

    /// Supported-format index outside `[0, count)`
    IndexOutOfRange { index: i32, count: usize },

    /// The registry is busy with another mutation
    Unavailable(DeviceId),

    /// The driver rejected the request with the given status
    Driver(i32),

    /// A platform surface call failed with the given status
    Surface(i32),

    /// The conversion scratch buffer could not be allocated
    Allocation(TryReserveError),

    /// A caller supplied value was rejected before reaching the driver
    InvalidArgument(String),
}

impl Error {
    /// Integer status reported across the host boundary.
    ///
    /// Driver codes pass through unchanged; every other failure maps to a
    /// fixed negative errno-style value.
    pub fn status(&self) -> i32 {
        match self {
            Error::Driver(code) if *code < 0 => *code,
            Error::DeviceNotFound(_) | Error::IndexOutOfRange { .. } => -2,
            Error::Unavailable(_) => -16,
            Error::Allocation(_) => -12,
            Error::InvalidArgument(_) => -22,
            _ => -5,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::LibraryNotLoaded(err) => {
                write!(f, "UVC driver library could not be loaded: {}", err)
            }
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::TryFromInt(err) => write!(f, "Integer conversion error: {}", err),
            Error::NullPointer => write!(f, "Null pointer returned from UVC driver library"),
            Error::DeviceNotFound(id) => write!(f, "No device with id {}", id),
            Error::IndexOutOfRange { index, count } => {
                write!(f, "Format index {} out of range (count {})", index, count)
            }
            Error::Unavailable(id) => write!(f, "Device {} is temporarily unavailable", id),
            Error::Driver(code) => write!(f, "UVC driver returned error {}", code),
            Error::Surface(code) => write!(f, "Native window call failed with {}", code),
            Error::Allocation(err) => write!(f, "Frame buffer allocation failed: {}", err),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::LibraryNotLoaded(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::TryFromInt(err) => Some(err),
            Error::Allocation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ffi::libloading::Error> for Error {
    fn from(err: ffi::libloading::Error) -> Self {
        Error::LibraryNotLoaded(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<TryFromIntError> for Error {
    fn from(err: TryFromIntError) -> Self {
        Error::TryFromInt(err)
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error::Allocation(err)
    }
}

/// Helper macro for modules to get the driver library and call functions
/// All functions must return Result<T, Error> to use this macro
#[macro_export]
macro_rules! uvc {
    ($fn_name:ident($($args:expr),*)) => {
        {
            #[allow(clippy::macro_metavars_in_unsafe)]
            let result = {
                let lib = uvcholder_sys::init()?;
                unsafe { lib.$fn_name($($args),*) }
            };
            result
        }
    };
}

/// Raw pixel encodings reported and accepted by the driver.
pub mod frame_type;

/// Video format descriptors.
pub mod format;

/// UVC control identifiers and the supported-control set.
pub mod controls;

/// The device driver contract consumed by holders.
pub mod driver;

/// Platform render surfaces and scoped bindings to them.
pub mod surface;

/// YUYV to RGBA pixel conversion.
pub mod convert;

/// The pull-path capture worker.
pub mod capture;

/// Per-device stream holder.
pub mod holder;

/// Process-wide device registry.
pub mod registry;

/// Host boundary: notifications and integer-status entry points.
pub mod host;

/// Holder and capture loop configuration.
pub mod config;

/// Driver and surface backends over the native libraries.
pub mod native;

/// Software device and in-memory surface.
pub mod sim;

pub use capture::CaptureLoop;
pub use holder::StreamHolder;
pub use registry::DeviceRegistry;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Driver(-51).status(), -51);
        assert_eq!(Error::Driver(3).status(), -5);
        assert_eq!(Error::DeviceNotFound(7).status(), -2);
        assert_eq!(Error::IndexOutOfRange { index: 9, count: 2 }.status(), -2);
        assert_eq!(Error::Unavailable(7).status(), -16);
        assert_eq!(Error::InvalidArgument("x".into()).status(), -22);
        assert_eq!(Error::NullPointer.status(), -5);
        assert_eq!(Error::Surface(-1).status(), -5);

        let err = Vec::<u8>::new().try_reserve_exact(usize::MAX).unwrap_err();
        assert_eq!(Error::from(err).status(), -12);
    }

    #[test]
    fn test_display() {
        let msg = Error::IndexOutOfRange { index: 4, count: 3 }.to_string();
        assert!(msg.contains("4"));
        assert!(msg.contains("3"));
    }
}
