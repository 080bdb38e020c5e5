// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::Error;
use std::{
    ffi::c_void,
    fmt,
    ptr::NonNull,
    sync::{Arc, Mutex, MutexGuard},
};

/// A locked RGBA_8888 surface buffer.
pub struct WindowBuffer<'a> {
    pub width: u32,
    pub height: u32,
    /// Row pitch in pixels, at least `width`.
    pub stride: u32,
    pub bits: &'a mut [u8],
}

impl fmt::Debug for WindowBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WindowBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("len", &self.bits.len())
            .finish()
    }
}

/// A reference-counted platform render target.
///
/// `acquire` and `release` adjust the platform reference count; callers pair
/// them through [`SurfaceBinding`] rather than directly.
pub trait PlatformSurface: Send + Sync {
    fn acquire(&self);

    fn release(&self);

    /// Configure the buffer size, the pixel format is always RGBA_8888.
    fn set_buffers_geometry(&self, width: u32, height: u32) -> Result<(), Error>;

    /// Lock the next buffer, let `render` fill it, then unlock and post it.
    /// When locking fails `render` is not called.
    fn lock_and_post(&self, render: &mut dyn FnMut(&mut WindowBuffer<'_>)) -> Result<(), Error>;

    /// Raw platform handle for the driver's compositing path.
    fn native_handle(&self) -> Option<NonNull<c_void>> {
        None
    }
}

/// Holds one acquisition of a surface for as long as it lives.
pub struct SurfaceBinding {
    surface: Arc<dyn PlatformSurface>,
}

impl SurfaceBinding {
    pub fn new(surface: Arc<dyn PlatformSurface>) -> Self {
        surface.acquire();
        SurfaceBinding { surface }
    }

    pub fn surface(&self) -> &dyn PlatformSurface {
        self.surface.as_ref()
    }
}

impl Drop for SurfaceBinding {
    fn drop(&mut self) {
        log::trace!("SurfaceBinding::drop() - releasing surface");
        self.surface.release();
    }
}

impl fmt::Debug for SurfaceBinding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SurfaceBinding")
            .field("native_handle", &self.surface.native_handle())
            .finish()
    }
}

/// Recording binding shared between a holder and its capture loop.
///
/// The holder swaps the binding and the loop blits through it under the
/// same lock.
pub type SurfaceSlot = Arc<Mutex<Option<SurfaceBinding>>>;

pub(crate) fn lock_slot(slot: &SurfaceSlot) -> MutexGuard<'_, Option<SurfaceBinding>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemorySurface;

    #[test]
    fn test_binding_balance() {
        let surface = Arc::new(MemorySurface::new(4, 4));
        {
            let _a = SurfaceBinding::new(surface.clone());
            let _b = SurfaceBinding::new(surface.clone());
            assert_eq!(surface.acquires(), 2);
            assert_eq!(surface.releases(), 0);
        }
        assert_eq!(surface.acquires(), 2);
        assert_eq!(surface.releases(), 2);
    }

    #[test]
    fn test_slot_replace_releases_first() {
        let first = Arc::new(MemorySurface::new(4, 4));
        let second = Arc::new(MemorySurface::new(4, 4));
        let slot: SurfaceSlot = Arc::new(Mutex::new(None));

        *lock_slot(&slot) = Some(SurfaceBinding::new(first.clone()));
        {
            let mut guard = lock_slot(&slot);
            *guard = None;
            assert_eq!(first.releases(), 1);
            *guard = Some(SurfaceBinding::new(second.clone()));
        }
        assert_eq!(second.acquires(), 1);
        lock_slot(&slot).take();
        assert_eq!(second.releases(), 1);
        assert_eq!(first.acquires(), first.releases());
    }
}
