//! Test Utilities
//!
//! Builders for in-memory assets and a cache wired to the recording driver.

#![allow(dead_code)]

use hwcache_core::asset::{Column, Patch};
use hwcache_core::{CacheConfig, RecordingDriver, TextureCache};

/// Patch lump of `width` x `height` filled with one palette index.
pub fn solid_patch_lump(width: i32, height: i32, value: u8) -> Vec<u8> {
    let data = vec![value; (width * height) as usize];
    Patch::from_flat(&data, width, height, None).to_lump()
}

/// Patch lump from per-column rows; `None` is a hole.
pub fn patch_lump_from_columns(height: i32, columns: &[&[Option<u8>]]) -> Vec<u8> {
    Patch {
        width: columns.len() as i32,
        height,
        left_offset: 0,
        top_offset: 0,
        columns: columns
            .iter()
            .map(|rows| Column::from_rows(rows.iter().copied()))
            .collect(),
    }
    .to_lump()
}

/// Patch lump from row-major pixels.
pub fn patch_lump_from_rows(width: i32, height: i32, pixels: &[u8]) -> Vec<u8> {
    Patch::from_flat(pixels, width, height, None).to_lump()
}

pub fn new_cache(config: CacheConfig) -> TextureCache<RecordingDriver> {
    TextureCache::new(config, RecordingDriver::new())
}

/// Pixels of the texture currently bound in the driver.
pub fn active_pixels(cache: &TextureCache<RecordingDriver>) -> Vec<u8> {
    cache
        .driver()
        .active_texture()
        .map(|texture| texture.pixels.clone())
        .expect("no active texture")
}

/// Identity colormap shifted by `shift`.
pub fn shifted_colormap(shift: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = (i as u8).wrapping_add(shift);
    }
    table
}
