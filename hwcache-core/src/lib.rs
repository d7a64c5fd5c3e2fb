//! Hardware texture cache.
//!
//! Converts palette-indexed, column-run encoded image assets (sprites,
//! composite wall textures, flats and fade masks) into GPU-uploadable pixel
//! buffers, caches those buffers across frames and levels, and coordinates
//! their lifetime between the tagged system-memory pool and the GPU driver.
//!
//! # Modules
//! - [`texture`]: pixel formats, palette, blending and the generators
//! - [`asset`]: patch decoding, texture definitions and the asset store seam
//! - [`memory`]: tagged pool with generation-checked buffer handles
//! - [`driver`]: GPU driver seam and a headless recording driver
//! - [`cache`]: mipmaps, colormap variants and the [`TextureCache`] context

pub mod asset;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod memory;
pub mod texture;

pub use cache::{
    CacheStats, ColormapId, ColormapRef, MapTexture, Mipmap, MipmapFlags, MipmapState, PatchCategory, PatchInfo,
    TextureCache,
};
pub use config::CacheConfig;
pub use driver::{GpuDriver, GpuHandle, RecordingDriver};
pub use error::{CacheError, Result};
pub use texture::{BlendStyle, Palette, TextureFormat, PALETTE_SIZE};
