//! Composite Generator
//!
//! Builds finished mipmap buffers from decoded assets:
//! - **Patches** (sprites, HUD graphics): one source column per block column,
//!   no offsets, flips or blending; the block is the power-of-two bound.
//! - **Composite textures**: sub-patches drawn in declared order onto a canvas
//!   of the texture's exact size, each clipped, optionally mirrored and
//!   blended against what earlier sub-patches drew.
//! - **Flats**: raw bytes copied straight into a palette block.
//!
//! Every routine re-resolves the mipmap's pool handle before writing; if the
//! buffer was purged in between, the routine stops without writing.

use crate::asset::{AssetStore, Patch, PatchCache, PatchFlip, Texture, TexturePatch};
use crate::cache::{Mipmap, MipmapFlags};
use crate::memory::TaggedPool;
use crate::texture::block::make_block;
use crate::texture::column::{column_drawer, draw_column, fixed_div, ColumnStep, ColumnTarget, TexelWriter, FRACBITS};
use crate::texture::formats::TextureFormat;
use crate::texture::palette::Palette;

/// Shared inputs of every generator run.
#[derive(Clone, Copy)]
pub struct GenerateParams<'a> {
    pub palette: &'a Palette,
    pub chroma_key: u8,
}

impl<'a> GenerateParams<'a> {
    fn writer<'m>(&self, mipmap: &'m Mipmap) -> TexelWriter<'m>
    where
        'a: 'm,
    {
        TexelWriter {
            format: mipmap.format,
            chroma_key: mipmap
                .flags
                .contains(MipmapFlags::CHROMAKEYED)
                .then_some(self.chroma_key),
            colormap: mipmap.colormap.as_deref(),
            palette: self.palette,
        }
    }
}

/// A block's pixels and its size in pixels.
pub struct BlockTarget<'a> {
    pub pixels: &'a mut [u8],
    pub width: i32,
    pub height: i32,
}

/// Texture-coordinate limits and offsets of a generated sprite.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PatchInfo {
    pub width: i32,
    pub height: i32,
    pub left_offset: i32,
    pub top_offset: i32,
    /// Fraction of the power-of-two block covered horizontally.
    pub max_s: f32,
    /// Fraction of the power-of-two block covered vertically.
    pub max_t: f32,
}

impl PatchInfo {
    pub fn new(patch: &Patch, mipmap: &Mipmap) -> Self {
        Self {
            width: patch.width,
            height: patch.height,
            left_offset: patch.left_offset,
            top_offset: patch.top_offset,
            max_s: patch.width as f32 / mipmap.width.max(1) as f32,
            max_t: patch.height as f32 / mipmap.height.max(1) as f32,
        }
    }
}

/// Draw every column of `patch` 1:1 into the block.
pub fn draw_patch_in_cache(target: &mut BlockTarget<'_>, writer: &TexelWriter<'_>, patch: &Patch) {
    if patch.width <= 0 || patch.height <= 0 {
        return;
    }

    let bpp = writer.format.bytes_per_pixel();
    let modulo = target.width as usize * bpp;

    for (x, column) in patch.columns.iter().enumerate().take(target.width.max(0) as usize) {
        let Some(block) = target.pixels.get_mut(x * bpp..) else {
            break;
        };
        let mut column_target = ColumnTarget {
            block,
            block_height: target.height,
            modulo,
        };
        draw_column(column, &mut column_target, writer, ColumnStep::UNIT, None, patch.height);
    }
}

/// Composite one sub-patch of `texture` into the block.
pub fn draw_texture_patch_in_cache(
    target: &mut BlockTarget<'_>,
    writer: &TexelWriter<'_>,
    texture: &Texture,
    texture_patch: &TexturePatch,
    patch: &Patch,
) {
    if texture.width <= 0 || texture.height <= 0 || target.width <= 0 || target.height <= 0 {
        return;
    }

    let drawer = column_drawer(texture_patch.flip);
    let flip_x = texture_patch.flip.contains(PatchFlip::HORIZONTAL);

    let x1 = texture_patch.origin_x;
    let width = patch.width;
    let height = patch.height;
    let x2 = x1 + width;

    if x1 > texture.width || x2 < 0 {
        log::trace!("Sub-patch {} outside {} horizontally", texture_patch.lump, texture.name);
        return;
    }
    if texture_patch.origin_y > texture.height || texture_patch.origin_y + height < 0 {
        log::trace!("Sub-patch {} outside {} vertically", texture_patch.lump, texture.name);
        return;
    }

    let x = x1.max(0);
    let x2 = x2.min(texture.width);

    // Canvas widths past the 16-bit range overflow i32 products.
    let scale_column = |v: i32| (v as i64 * target.width as i64 / texture.width as i64) as i32;
    let col = scale_column(x);
    let ncols = scale_column(x2 - x);

    let mut xfrac: i64 = if x1 < 0 { -(x1 as i64) << FRACBITS } else { 0 };
    let xfracstep = fixed_div(texture.width, target.width) as i64;
    let step = ColumnStep {
        yfracstep: fixed_div(texture.height, target.height),
        scale_y: fixed_div(target.height, texture.height),
    };

    let bpp = writer.format.bytes_per_pixel();
    let modulo = target.width as usize * bpp;

    for i in 0..ncols {
        let source_x = (xfrac >> FRACBITS) as i32;
        let column_index = if flip_x { width - 1 - source_x } else { source_x };
        let Some(column) = patch.column(column_index) else {
            break;
        };
        let Some(block) = target.pixels.get_mut((col + i) as usize * bpp..) else {
            break;
        };
        let mut column_target = ColumnTarget {
            block,
            block_height: target.height,
            modulo,
        };
        drawer(column, &mut column_target, writer, step, Some(texture_patch), height);
        xfrac += xfracstep;
    }
}

/// Pre-fill a sky canvas with the chroma-key color, fully opaque.
pub fn fill_sky(pixels: &mut [u8], format: TextureFormat, palette: &Palette, chroma_key: u8) {
    let color = palette.color(chroma_key);
    match format {
        TextureFormat::Rgba32 => {
            for pixel in pixels.chunks_exact_mut(4) {
                pixel.copy_from_slice(&[color[0], color[1], color[2], 0xFF]);
            }
        }
        TextureFormat::Rgb24 => {
            for pixel in pixels.chunks_exact_mut(3) {
                pixel.copy_from_slice(&color.0[..3]);
            }
        }
        TextureFormat::PaletteAlpha88 | TextureFormat::AlphaIntensity88 => {
            for pixel in pixels.chunks_exact_mut(2) {
                pixel.copy_from_slice(&[chroma_key, 0xFF]);
            }
        }
        TextureFormat::Palette8 | TextureFormat::Alpha8 => pixels.fill(chroma_key),
    }
}

/// Whether any pixel of a finished buffer has zero alpha.
///
/// Formats without an alpha byte never report transparency; palette
/// buffers are chroma-keyed at draw time instead.
pub fn has_transparent_pixel(pixels: &[u8], format: TextureFormat) -> bool {
    match format.alpha_offset() {
        Some(offset) => pixels
            .chunks_exact(format.bytes_per_pixel())
            .any(|pixel| pixel[offset] == 0),
        None => false,
    }
}

/// Build a composite texture into `mipmap`.
///
/// Sub-patches whose lumps are missing or fail to decode are skipped with a
/// warning; the rest of the texture is still built.
pub fn generate_texture(
    pool: &mut TaggedPool,
    patches: &mut PatchCache,
    assets: &dyn AssetStore,
    params: GenerateParams<'_>,
    format: TextureFormat,
    texture: &Texture,
    mipmap: &mut Mipmap,
) {
    mipmap.flags = if texture.sky {
        MipmapFlags::WRAP_XY
    } else {
        MipmapFlags::CHROMAKEYED | MipmapFlags::WRAP_XY
    };
    mipmap.width = texture.width.max(0) as u32;
    mipmap.height = texture.height.max(0) as u32;
    mipmap.format = format;

    make_block(pool, mipmap, params.chroma_key);

    if texture.sky {
        if let Some(pixels) = mipmap.data_mut(pool) {
            fill_sky(pixels, format, params.palette, params.chroma_key);
        }
    }

    let writer = params.writer(mipmap);

    for texture_patch in &texture.patches {
        let patch = match patches.fetch_for_texture(assets, texture, texture_patch.lump, params.palette) {
            Ok(patch) => patch,
            Err(err) => {
                log::warn!("Skipping sub-patch of texture {}: {}", texture.name, err);
                continue;
            }
        };

        let Some(pixels) = mipmap.data_mut(pool) else {
            log::debug!("Buffer of texture {} purged during compositing", texture.name);
            return;
        };
        let mut target = BlockTarget {
            pixels,
            width: mipmap.width as i32,
            height: mipmap.height as i32,
        };
        draw_texture_patch_in_cache(&mut target, &writer, texture, texture_patch, &patch);
    }

    let transparent = mipmap
        .data(pool)
        .is_some_and(|pixels| has_transparent_pixel(pixels, format));
    if transparent {
        mipmap.flags |= MipmapFlags::TRANSPARENT;
    }
}

/// Build a sprite mipmap from `patch`.
///
/// The first call sizes the mipmap to the patch's power-of-two bound and sets
/// its format; later calls (colormap changes, regeneration) keep that setup.
pub fn make_patch(
    pool: &mut TaggedPool,
    params: GenerateParams<'_>,
    patch_format: TextureFormat,
    patch: &Patch,
    mipmap: &mut Mipmap,
) -> PatchInfo {
    if mipmap.is_blank() {
        let (width, height) = Mipmap::pow2_dimensions(patch.width, patch.height);
        mipmap.width = width;
        mipmap.height = height;
        mipmap.flags = MipmapFlags::empty();
        mipmap.format = patch_format;
    }

    make_block(pool, mipmap, params.chroma_key);

    let writer = params.writer(mipmap);
    if let Some(pixels) = mipmap.data_mut(pool) {
        let mut target = BlockTarget {
            pixels,
            width: mipmap.width as i32,
            height: mipmap.height as i32,
        };
        draw_patch_in_cache(&mut target, &writer, patch);
    }

    PatchInfo::new(patch, mipmap)
}

/// Side length of a square raw flat, from its lump length.
pub fn flat_size(length: usize) -> u32 {
    match length {
        4_194_304 => 2048,
        1_048_576 => 1024,
        262_144 => 512,
        65_536 => 256,
        16_384 => 128,
        1_024 => 32,
        _ => 64,
    }
}

/// Copy a raw flat into a palette block of `width` x `height`.
///
/// Missing bytes stay at the chroma-key fill; extra bytes are ignored.
pub fn cache_flat(pool: &mut TaggedPool, params: GenerateParams<'_>, data: &[u8], width: u32, height: u32, mipmap: &mut Mipmap) {
    mipmap.format = TextureFormat::Palette8;
    mipmap.flags = MipmapFlags::WRAP_XY | MipmapFlags::CHROMAKEYED;
    mipmap.width = width;
    mipmap.height = height;

    make_block(pool, mipmap, params.chroma_key);

    if let Some(pixels) = mipmap.data_mut(pool) {
        let len = pixels.len().min(data.len());
        pixels[..len].copy_from_slice(&data[..len]);
    }
}
