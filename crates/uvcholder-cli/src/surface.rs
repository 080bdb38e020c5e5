// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};
use uvcholder::{
    surface::{PlatformSurface, WindowBuffer},
    Error,
};

const EINVAL: i32 = -22;

struct Output {
    writer: BufWriter<File>,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    frames: u64,
}

/// A recording surface appending every posted buffer to a file as raw,
/// tightly packed RGBA frames.
pub struct FileSurface {
    output: Mutex<Output>,
    refs: AtomicUsize,
}

impl FileSurface {
    pub fn create(path: &Path) -> io::Result<FileSurface> {
        let file = File::create(path)?;
        Ok(FileSurface {
            output: Mutex::new(Output {
                writer: BufWriter::new(file),
                width: 0,
                height: 0,
                pixels: Vec::new(),
                frames: 0,
            }),
            refs: AtomicUsize::new(0),
        })
    }

    fn output(&self) -> MutexGuard<'_, Output> {
        self.output.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.output().frames
    }

    /// Configured frame size.
    pub fn geometry(&self) -> (u32, u32) {
        let output = self.output();
        (output.width, output.height)
    }

    /// Outstanding acquisitions.
    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.output().writer.flush()
    }
}

impl PlatformSurface for FileSurface {
    fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        if self.refs.fetch_sub(1, Ordering::SeqCst) == 1 {
            if let Err(err) = self.flush() {
                log::warn!("Failed to flush recording: {}", err);
            }
        }
    }

    fn set_buffers_geometry(&self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Err(Error::Surface(EINVAL));
        }
        let len = width as usize * height as usize * 4;
        let mut output = self.output();
        output.pixels.clear();
        output.pixels.try_reserve_exact(len)?;
        output.pixels.resize(len, 0);
        output.width = width;
        output.height = height;
        log::debug!("Recording geometry {}x{}", width, height);
        Ok(())
    }

    fn lock_and_post(&self, render: &mut dyn FnMut(&mut WindowBuffer<'_>)) -> Result<(), Error> {
        let mut output = self.output();
        let output = &mut *output;
        if output.pixels.is_empty() {
            return Err(Error::Surface(EINVAL));
        }
        render(&mut WindowBuffer {
            width: output.width,
            height: output.height,
            stride: output.width,
            bits: output.pixels.as_mut_slice(),
        });
        output.writer.write_all(&output.pixels)?;
        output.frames += 1;
        log::trace!("Wrote frame {}", output.frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, process};

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("uvcholder-{}-{}.rgba", name, process::id()))
    }

    #[test]
    fn test_frames_are_appended() {
        let path = temp_path("append");
        let surface = FileSurface::create(&path).unwrap();
        assert!(surface.lock_and_post(&mut |_| {}).is_err());

        surface.set_buffers_geometry(4, 2).unwrap();
        surface.acquire();
        for value in [1u8, 2] {
            surface
                .lock_and_post(&mut |buf: &mut WindowBuffer<'_>| {
                    assert_eq!(buf.stride, 4);
                    buf.bits.fill(value);
                })
                .unwrap();
        }
        surface.release();
        assert_eq!(surface.frames(), 2);
        assert_eq!(surface.refs(), 0);

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 2 * 4 * 2 * 4);
        assert!(data[..32].iter().all(|&b| b == 1));
        assert!(data[32..].iter().all(|&b| b == 2));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_zero_geometry_rejected() {
        let path = temp_path("zero");
        let surface = FileSurface::create(&path).unwrap();
        assert!(surface.set_buffers_geometry(0, 480).is_err());
        assert_eq!(surface.geometry(), (0, 0));
        fs::remove_file(&path).ok();
    }
}
