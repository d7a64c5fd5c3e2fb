//! Column Compositor
//!
//! Rasterizes one column of a patch into a destination block, applying
//! vertical scaling and clipping, chroma-key transparency, colormap
//! translation and sub-patch blending.
//!
//! # Fixed Point
//! Steps and scales are 16.16 fixed point. A scale of [`FRACUNIT`] draws
//! source pixels 1:1.
//!
//! # Flipping
//! [`draw_flipped_column`] walks each post bottom-up so that a vertically
//! mirrored sub-patch composites correctly. The drawer is chosen once per
//! sub-patch with [`column_drawer`], not per pixel.

use image::Rgba;

use crate::asset::{Column, PatchFlip, TexturePatch};
use crate::texture::blend::{blend_palette_indexes, blend_pixel, BlendStyle};
use crate::texture::formats::TextureFormat;
use crate::texture::palette::{Palette, PALETTE_SIZE};

pub type Fixed = i32;

pub const FRACBITS: i32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

/// `value * scale`, rounded to nearest and truncated to an integer.
#[inline]
pub fn fixed_scale_round(value: i32, scale: Fixed) -> i32 {
    ((value as i64 * scale as i64 + (FRACUNIT / 2) as i64) >> FRACBITS) as i32
}

/// Fixed-point ratio `num / den`.
#[inline]
pub fn fixed_div(num: i32, den: i32) -> Fixed {
    (((num as i64) << FRACBITS) / den as i64) as Fixed
}

/// Destination column of a block.
///
/// `block` starts at the column's top pixel; row `y` is at `y * modulo`.
pub struct ColumnTarget<'a> {
    pub block: &'a mut [u8],
    pub block_height: i32,
    pub modulo: usize,
}

/// Vertical stepping for one column draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnStep {
    /// Source advance per destination row.
    pub yfracstep: Fixed,
    /// Destination rows per source row.
    pub scale_y: Fixed,
}

impl ColumnStep {
    pub const UNIT: Self = Self {
        yfracstep: FRACUNIT,
        scale_y: FRACUNIT,
    };
}

/// Converts source palette indices into destination pixels for one mipmap.
#[derive(Clone, Copy)]
pub struct TexelWriter<'a> {
    pub format: TextureFormat,
    /// Index written with zero alpha, when the mipmap is chroma-keyed.
    pub chroma_key: Option<u8>,
    pub colormap: Option<&'a [u8; PALETTE_SIZE]>,
    pub palette: &'a Palette,
}

impl TexelWriter<'_> {
    /// Write one source texel into `dest` (exactly one pixel wide).
    #[inline]
    pub fn write(&self, dest: &mut [u8], texel: u8, origin: Option<&TexturePatch>) {
        let alpha = if self.chroma_key == Some(texel) { 0x00 } else { 0xFF };
        let texel = match self.colormap {
            Some(colormap) => colormap[texel as usize],
            None => texel,
        };
        let blend = origin.filter(|patch| patch.style != BlendStyle::Copy);

        match self.format {
            TextureFormat::Palette8 | TextureFormat::Alpha8 => {
                dest[0] = match blend {
                    Some(patch) => blend_palette_indexes(self.palette, dest[0], texel, patch.style, patch.alpha),
                    None => texel,
                };
            }
            TextureFormat::PaletteAlpha88 | TextureFormat::AlphaIntensity88 => {
                dest[0] = match blend {
                    Some(patch) => blend_palette_indexes(self.palette, dest[0], texel, patch.style, patch.alpha),
                    None => texel,
                };
                dest[1] = alpha;
            }
            TextureFormat::Rgb24 => {
                let mut color = self.palette.color(texel);
                if let Some(patch) = blend {
                    let background = Rgba([dest[0], dest[1], dest[2], 0xFF]);
                    color = blend_pixel(background, color, patch.style, patch.alpha);
                }
                dest[..3].copy_from_slice(&color.0[..3]);
            }
            TextureFormat::Rgba32 => {
                let mut color = self.palette.color(texel);
                color[3] = alpha;
                if let Some(patch) = blend {
                    let background = Rgba([dest[0], dest[1], dest[2], dest[3]]);
                    color = blend_pixel(background, color, patch.style, patch.alpha);
                }
                dest[..4].copy_from_slice(&color.0);
            }
        }
    }
}

/// Signature shared by the normal and flipped column drawers.
pub type ColumnDrawer = fn(
    column: &Column,
    target: &mut ColumnTarget<'_>,
    writer: &TexelWriter<'_>,
    step: ColumnStep,
    origin: Option<&TexturePatch>,
    patch_height: i32,
);

pub fn column_drawer(flip: PatchFlip) -> ColumnDrawer {
    if flip.contains(PatchFlip::VERTICAL) {
        draw_flipped_column
    } else {
        draw_column
    }
}

/// Clip a scaled run against the block. Returns `(position, count)` in
/// destination rows.
#[inline]
fn clip_run(position: i32, count: i32, block_height: i32) -> (i32, i32) {
    let position = position.max(0);
    let count = if position + count >= block_height {
        block_height - position
    } else {
        count
    };
    (position, count)
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn write_run(
    source: &[u8],
    target: &mut ColumnTarget<'_>,
    writer: &TexelWriter<'_>,
    origin: Option<&TexturePatch>,
    position: i32,
    mut count: i32,
    mut yfrac: Fixed,
    yfracdelta: Fixed,
) {
    let bpp = writer.format.bytes_per_pixel();
    let mut dest = position as usize * target.modulo;

    while count > 0 {
        let Ok(index) = usize::try_from(yfrac >> FRACBITS) else {
            break;
        };
        let Some(&texel) = source.get(index) else {
            break;
        };
        let Some(pixel) = target.block.get_mut(dest..dest + bpp) else {
            break;
        };
        writer.write(pixel, texel, origin);

        count -= 1;
        dest += target.modulo;
        yfrac += yfracdelta;
    }
}

/// Draw a column top-down.
pub fn draw_column(
    column: &Column,
    target: &mut ColumnTarget<'_>,
    writer: &TexelWriter<'_>,
    step: ColumnStep,
    origin: Option<&TexturePatch>,
    _patch_height: i32,
) {
    let origin_y = origin.map_or(0, |patch| patch.origin_y);

    for post in &column.posts {
        let source = column.post_pixels(post);
        let mut count = fixed_scale_round(post.length, step.scale_y);
        let mut position = origin_y + post.top_delta;
        let mut yfrac = 0;

        if position < 0 {
            yfrac = -position << FRACBITS;
            count += fixed_scale_round(position, step.scale_y);
            position = 0;
        }
        position = fixed_scale_round(position, step.scale_y);

        let (position, count) = clip_run(position, count, target.block_height);
        write_run(source, target, writer, origin, position, count, yfrac, step.yfracstep);
    }
}

/// Draw a column mirrored vertically within a patch of `patch_height` rows.
pub fn draw_flipped_column(
    column: &Column,
    target: &mut ColumnTarget<'_>,
    writer: &TexelWriter<'_>,
    step: ColumnStep,
    origin: Option<&TexturePatch>,
    patch_height: i32,
) {
    let origin_y = origin.map_or(0, |patch| patch.origin_y);

    for post in &column.posts {
        let source = column.post_pixels(post);
        let top_delta = patch_height - post.length - post.top_delta;
        let mut count = fixed_scale_round(post.length, step.scale_y);
        let mut position = origin_y + top_delta;
        let mut yfrac = (post.length - 1) << FRACBITS;

        if position < 0 {
            yfrac += position << FRACBITS;
            count += fixed_scale_round(position, step.scale_y);
            position = 0;
        }
        position = fixed_scale_round(position, step.scale_y);

        let (position, count) = clip_run(position, count, target.block_height);
        write_run(source, target, writer, origin, position, count, yfrac, -step.yfracstep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(format: TextureFormat, palette: &Palette) -> TexelWriter<'_> {
        TexelWriter {
            format,
            chroma_key: Some(0xFF),
            colormap: None,
            palette,
        }
    }

    fn draw(drawer: ColumnDrawer, column: &Column, height: i32, origin: Option<&TexturePatch>, patch_height: i32) -> Vec<u8> {
        draw_stepped(drawer, column, height, origin, patch_height, ColumnStep::UNIT)
    }

    fn draw_stepped(
        drawer: ColumnDrawer,
        column: &Column,
        height: i32,
        origin: Option<&TexturePatch>,
        patch_height: i32,
        step: ColumnStep,
    ) -> Vec<u8> {
        let palette = Palette::grayscale();
        let mut block = vec![0xAAu8; height as usize];
        let mut target = ColumnTarget {
            block: &mut block,
            block_height: height,
            modulo: 1,
        };
        drawer(
            column,
            &mut target,
            &writer(TextureFormat::Palette8, &palette),
            step,
            origin,
            patch_height,
        );
        block
    }

    #[test]
    fn test_fixed_helpers() {
        assert_eq!(fixed_scale_round(10, FRACUNIT), 10);
        assert_eq!(fixed_scale_round(3, FRACUNIT / 2), 2);
        assert_eq!(fixed_div(80, 64), FRACUNIT + FRACUNIT / 4);
    }

    #[test]
    fn test_draws_posts_at_their_offsets() {
        let column = Column::from_rows([None, Some(1), Some(2), None]);
        assert_eq!(draw(draw_column, &column, 4, None, 4), vec![0xAA, 1, 2, 0xAA]);
    }

    #[test]
    fn test_clips_against_block_bottom() {
        let column = Column::from_rows([None, None, Some(1), Some(2), Some(3)]);
        assert_eq!(draw(draw_column, &column, 4, None, 5), vec![0xAA, 0xAA, 1, 2]);
    }

    #[test]
    fn test_negative_origin_clips_top() {
        let column = Column::from_rows([Some(1), Some(2), Some(3)]);
        let origin = TexturePatch::new(0, 0, -2);
        assert_eq!(draw(draw_column, &column, 3, Some(&origin), 3), vec![3, 0xAA, 0xAA]);
    }

    #[test]
    fn test_flipped_column_reverses() {
        let column = Column::from_rows([Some(1), Some(2), None]);
        assert_eq!(draw(draw_flipped_column, &column, 3, None, 3), vec![0xAA, 2, 1]);
    }

    #[test]
    fn test_flipped_with_negative_origin() {
        let column = Column::from_rows([Some(1), Some(2), Some(3)]);
        let origin = TexturePatch::new(0, 0, -1);
        assert_eq!(draw(draw_flipped_column, &column, 3, Some(&origin), 3), vec![2, 1, 0xAA]);
    }

    const DOUBLE: ColumnStep = ColumnStep {
        yfracstep: FRACUNIT / 2,
        scale_y: 2 * FRACUNIT,
    };

    const HALF: ColumnStep = ColumnStep {
        yfracstep: 2 * FRACUNIT,
        scale_y: FRACUNIT / 2,
    };

    #[test]
    fn test_scaled_up_column_repeats_rows() {
        let column = Column::from_rows([Some(1), Some(2)]);
        assert_eq!(draw_stepped(draw_column, &column, 4, None, 2, DOUBLE), vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_scaled_up_column_clips_top_after_scaling() {
        let column = Column::from_rows([Some(1), Some(2)]);
        let origin = TexturePatch::new(0, 0, -1);
        // Row 0's whole doubled span falls above the block.
        assert_eq!(
            draw_stepped(draw_column, &column, 4, Some(&origin), 2, DOUBLE),
            vec![2, 2, 0xAA, 0xAA]
        );
    }

    #[test]
    fn test_scaled_down_column_skips_rows() {
        let column = Column::from_rows([Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(draw_stepped(draw_column, &column, 2, None, 4, HALF), vec![1, 3]);
    }

    #[test]
    fn test_palette_alpha_blends_index_and_stays_opaque() {
        let palette = Palette::grayscale();
        let origin = TexturePatch::new(0, 0, 0).with_blend(BlendStyle::Translucent, 128);
        for format in [TextureFormat::PaletteAlpha88, TextureFormat::AlphaIntensity88] {
            let mut pixel = [0x10, 0x00];
            writer(format, &palette).write(&mut pixel, 0x20, Some(&origin));
            // (16 * 127 + 32 * 128) / 255
            assert_eq!(pixel, [24, 0xFF], "{:?}", format);
        }
    }

    #[test]
    fn test_chroma_key_zeroes_alpha() {
        let palette = Palette::grayscale();
        let w = writer(TextureFormat::PaletteAlpha88, &palette);
        let mut pixel = [0u8; 2];
        w.write(&mut pixel, 0xFF, None);
        assert_eq!(pixel, [0xFF, 0x00]);
        w.write(&mut pixel, 0x10, None);
        assert_eq!(pixel, [0x10, 0xFF]);
    }

    #[test]
    fn test_colormap_translates_after_chroma_test() {
        let palette = Palette::grayscale();
        let mut colormap = [0u8; PALETTE_SIZE];
        for (i, entry) in colormap.iter_mut().enumerate() {
            *entry = (i as u8).wrapping_add(1);
        }
        let w = TexelWriter {
            colormap: Some(&colormap),
            ..writer(TextureFormat::Rgba32, &palette)
        };
        let mut pixel = [0u8; 4];
        w.write(&mut pixel, 0xFF, None);
        // Keyed on the source index, then remapped to 0.
        assert_eq!(pixel, [0, 0, 0, 0]);
        w.write(&mut pixel, 0x10, None);
        assert_eq!(pixel, [0x11, 0x11, 0x11, 0xFF]);
    }

    #[test]
    fn test_rgb24_has_no_alpha_byte() {
        let palette = Palette::grayscale();
        let w = writer(TextureFormat::Rgb24, &palette);
        let mut pixel = [9u8; 3];
        w.write(&mut pixel, 0x40, None);
        assert_eq!(pixel, [0x40, 0x40, 0x40]);
    }
}
