//! GPU Driver Seam
//!
//! The cache never talks to a graphics API directly. It hands finished pixel
//! buffers to a [`GpuDriver`] and keeps the returned [`GpuHandle`] to know
//! that a mipmap is resident.
//!
//! [`RecordingDriver`] is a headless implementation that keeps uploaded
//! pixels in memory. Tests and the CLI use it to inspect what would have
//! reached the GPU.

use std::collections::HashMap;

use crate::cache::MipmapFlags;
use crate::texture::{Palette, TextureFormat};

/// Opaque driver-side texture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u32);

/// Everything a driver needs to create or refresh a texture.
#[derive(Debug, Clone, Copy)]
pub struct MipmapUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub flags: MipmapFlags,
    pub pixels: &'a [u8],
}

pub trait GpuDriver {
    /// Create a texture from `upload` and return its handle.
    fn upload(&mut self, upload: &MipmapUpload<'_>) -> GpuHandle;

    /// Replace the pixels of an existing texture.
    fn update(&mut self, handle: GpuHandle, upload: &MipmapUpload<'_>);

    fn delete(&mut self, handle: GpuHandle);

    /// Bind the texture used by subsequent draws; `None` unbinds.
    fn set_active(&mut self, handle: Option<GpuHandle>);

    fn set_palette(&mut self, palette: &Palette);

    /// Drop every texture the driver knows about.
    fn clear_handle_cache(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTexture {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub flags: MipmapFlags,
    pub pixels: Vec<u8>,
}

impl From<&MipmapUpload<'_>> for RecordedTexture {
    fn from(upload: &MipmapUpload<'_>) -> Self {
        Self {
            width: upload.width,
            height: upload.height,
            format: upload.format,
            flags: upload.flags,
            pixels: upload.pixels.to_vec(),
        }
    }
}

/// Driver call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverCounters {
    pub uploads: u64,
    pub updates: u64,
    pub deletes: u64,
    pub palette_changes: u64,
    pub handle_cache_clears: u64,
}

/// Headless driver that records uploads in memory.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    textures: HashMap<GpuHandle, RecordedTexture>,
    next_handle: u32,
    active: Option<GpuHandle>,
    palette: Option<Palette>,
    counters: DriverCounters,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self, handle: GpuHandle) -> Option<&RecordedTexture> {
        self.textures.get(&handle)
    }

    pub fn active(&self) -> Option<GpuHandle> {
        self.active
    }

    /// Texture currently bound for drawing.
    pub fn active_texture(&self) -> Option<&RecordedTexture> {
        self.active.and_then(|handle| self.textures.get(&handle))
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    pub fn counters(&self) -> DriverCounters {
        self.counters
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

impl GpuDriver for RecordingDriver {
    fn upload(&mut self, upload: &MipmapUpload<'_>) -> GpuHandle {
        self.next_handle += 1;
        let handle = GpuHandle(self.next_handle);
        self.textures.insert(handle, RecordedTexture::from(upload));
        self.counters.uploads += 1;
        handle
    }

    fn update(&mut self, handle: GpuHandle, upload: &MipmapUpload<'_>) {
        self.textures.insert(handle, RecordedTexture::from(upload));
        self.counters.updates += 1;
    }

    fn delete(&mut self, handle: GpuHandle) {
        if self.textures.remove(&handle).is_some() {
            self.counters.deletes += 1;
        }
        if self.active == Some(handle) {
            self.active = None;
        }
    }

    fn set_active(&mut self, handle: Option<GpuHandle>) {
        self.active = handle;
    }

    fn set_palette(&mut self, palette: &Palette) {
        self.palette = Some(palette.clone());
        self.counters.palette_changes += 1;
    }

    fn clear_handle_cache(&mut self) {
        self.textures.clear();
        self.active = None;
        self.counters.handle_cache_clears += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(pixels: &[u8]) -> MipmapUpload<'_> {
        MipmapUpload {
            width: 1,
            height: pixels.len() as u32,
            format: TextureFormat::Palette8,
            flags: MipmapFlags::empty(),
            pixels,
        }
    }

    #[test]
    fn test_upload_update_delete() {
        let mut driver = RecordingDriver::new();
        let handle = driver.upload(&upload(&[1, 2]));
        assert_eq!(driver.texture(handle).unwrap().pixels, vec![1, 2]);

        driver.update(handle, &upload(&[3, 4]));
        assert_eq!(driver.texture(handle).unwrap().pixels, vec![3, 4]);

        driver.set_active(Some(handle));
        driver.delete(handle);
        assert!(driver.texture(handle).is_none());
        assert_eq!(driver.active(), None);

        let counters = driver.counters();
        assert_eq!((counters.uploads, counters.updates, counters.deletes), (1, 1, 1));
    }

    #[test]
    fn test_handles_are_unique() {
        let mut driver = RecordingDriver::new();
        let a = driver.upload(&upload(&[1]));
        let b = driver.upload(&upload(&[1]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut driver = RecordingDriver::new();
        driver.upload(&upload(&[1]));
        driver.clear_handle_cache();
        assert_eq!(driver.texture_count(), 0);
    }
}
