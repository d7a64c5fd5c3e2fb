// Mipmap descriptor
use bitflags::bitflags;

use crate::driver::{GpuHandle, MipmapUpload};
use crate::memory::{BufferHandle, PoolTag, TaggedPool};
use crate::texture::{TextureFormat, PALETTE_SIZE};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MipmapFlags: u8 {
        const WRAP_X = 0x01;
        const WRAP_Y = 0x02;
        const WRAP_XY = Self::WRAP_X.bits() | Self::WRAP_Y.bits();
        /// Pixels equal to the chroma-key index are transparent.
        const CHROMAKEYED = 0x04;
        /// At least one pixel has zero alpha.
        const TRANSPARENT = 0x08;
    }
}

/// Where a mipmap's pixels currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MipmapState {
    /// Neither a system buffer nor a GPU texture.
    Unrealized,
    /// Generated, not yet uploaded.
    Buffered,
    /// Uploaded, system buffer still present.
    Resident,
    /// Uploaded, system buffer released.
    Purged,
}

/// One cacheable image.
///
/// The pixel buffer lives in the [`TaggedPool`]; the mipmap only holds a weak
/// handle that a bulk purge can invalidate at any time, so every access goes
/// through [`Mipmap::data`].
#[derive(Debug, Default)]
pub struct Mipmap {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub flags: MipmapFlags,
    /// Remap table for colormap-translated variants.
    pub colormap: Option<Box<[u8; PALETTE_SIZE]>>,
    data: Option<BufferHandle>,
    gpu: Option<GpuHandle>,
    /// Content is out of date and must be regenerated before the next draw.
    stale: bool,
}

impl Mipmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colormap(colormap: &[u8; PALETTE_SIZE]) -> Self {
        Self {
            colormap: Some(Box::new(*colormap)),
            ..Self::default()
        }
    }

    /// `true` until the descriptor's size and format have been set up.
    pub fn is_blank(&self) -> bool {
        self.width == 0
    }

    pub fn data<'p>(&self, pool: &'p TaggedPool) -> Option<&'p [u8]> {
        self.data.and_then(|handle| pool.get(handle))
    }

    pub fn data_mut<'p>(&self, pool: &'p mut TaggedPool) -> Option<&'p mut [u8]> {
        self.data.and_then(move |handle| pool.get_mut(handle))
    }

    pub fn has_data(&self, pool: &TaggedPool) -> bool {
        self.data.is_some_and(|handle| pool.is_live(handle))
    }

    pub(crate) fn set_data(&mut self, handle: BufferHandle) {
        self.data = Some(handle);
    }

    /// Free the system buffer, if it is still live.
    pub fn release_data(&mut self, pool: &mut TaggedPool) {
        if let Some(handle) = self.data.take() {
            pool.free(handle);
        }
    }

    /// Retag the system buffer; a no-op if it was already purged.
    pub fn change_tag(&self, pool: &mut TaggedPool, tag: PoolTag) -> bool {
        self.data.is_some_and(|handle| pool.change_tag(handle, tag))
    }

    pub fn gpu_handle(&self) -> Option<GpuHandle> {
        self.gpu
    }

    pub fn is_resident(&self) -> bool {
        self.gpu.is_some()
    }

    pub(crate) fn set_gpu_handle(&mut self, handle: Option<GpuHandle>) {
        self.gpu = handle;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }

    pub fn state(&self, pool: &TaggedPool) -> MipmapState {
        match (self.has_data(pool), self.is_resident()) {
            (false, false) => MipmapState::Unrealized,
            (true, false) => MipmapState::Buffered,
            (true, true) => MipmapState::Resident,
            (false, true) => MipmapState::Purged,
        }
    }

    /// Upload description for the driver, if the buffer is still live.
    pub fn upload<'p>(&self, pool: &'p TaggedPool) -> Option<MipmapUpload<'p>> {
        Some(MipmapUpload {
            width: self.width,
            height: self.height,
            format: self.format,
            flags: self.flags,
            pixels: self.data(pool)?,
        })
    }

    /// Power-of-two bound used for sprite mipmaps.
    pub fn pow2_dimensions(width: i32, height: i32) -> (u32, u32) {
        let bound = |v: i32| (v.max(1) as u32).next_power_of_two();
        (bound(width), bound(height))
    }
}
