// Fade mask loader: single-channel alpha masks for screen wipes
use crate::cache::{Mipmap, MipmapFlags};
use crate::memory::TaggedPool;
use crate::texture::block::make_block;
use crate::texture::column::{fixed_div, Fixed, FRACBITS};
use crate::texture::formats::TextureFormat;
use crate::texture::palette::Palette;

/// Native mask sizes, keyed by lump length.
const FADEMASK_SIZES: [(usize, u32, u32); 4] = [
    (256_000, 640, 400),
    (64_000, 320, 200),
    (16_000, 160, 100),
    (4_000, 80, 50),
];

/// Native size of a fade mask lump, or `None` for an unsupported length.
pub fn fademask_dimensions(length: usize) -> Option<(u32, u32)> {
    FADEMASK_SIZES
        .iter()
        .find(|(size, _, _)| *size == length)
        .map(|&(_, width, height)| (width, height))
}

/// Resample a native mask into a `width` x `height` alpha block.
///
/// Nearest neighbor with independent 16.16 accumulators per axis, sampling at
/// destination pixel centers so both edges of the source are reached. Each
/// output byte is the red level of the palette color of the source index.
pub fn draw_fademask(
    dest: &mut [u8],
    width: u32,
    height: u32,
    source: &[u8],
    native_width: u32,
    native_height: u32,
    palette: &Palette,
) {
    if width == 0 || height == 0 || native_width == 0 || native_height == 0 {
        return;
    }

    let stepx: Fixed = fixed_div(native_width as i32, width as i32);
    let stepy: Fixed = fixed_div(native_height as i32, height as i32);

    let mut posy = stepy / 2;
    for row in dest.chunks_exact_mut(width as usize).take(height as usize) {
        let sy = ((posy >> FRACBITS) as u32).min(native_height - 1) as usize;
        let source_row = sy * native_width as usize;

        let mut posx = stepx / 2;
        for out in row.iter_mut() {
            let sx = ((posx >> FRACBITS) as u32).min(native_width - 1) as usize;
            let texel = source.get(source_row + sx).copied().unwrap_or(0);
            *out = palette.color(texel)[0];
            posx += stepx;
        }
        posy += stepy;
    }
}

/// Build a fade mask mipmap from a raw mask lump.
///
/// A lump of unsupported length is logged and leaves a blank 0x0 mask.
pub fn cache_fademask(pool: &mut TaggedPool, palette: &Palette, data: &[u8], power_of_two: bool, mipmap: &mut Mipmap) {
    mipmap.format = TextureFormat::Alpha8;
    mipmap.flags = MipmapFlags::empty();

    let Some((native_width, native_height)) = fademask_dimensions(data.len()) else {
        log::warn!("Fade mask lump of incorrect size ({} bytes), ignored", data.len());
        mipmap.width = 0;
        mipmap.height = 0;
        make_block(pool, mipmap, 0);
        return;
    };

    let (width, height) = if power_of_two {
        Mipmap::pow2_dimensions(native_width as i32, native_height as i32)
    } else {
        (native_width, native_height)
    };
    mipmap.width = width;
    mipmap.height = height;

    make_block(pool, mipmap, 0);

    if let Some(dest) = mipmap.data_mut(pool) {
        draw_fademask(dest, width, height, data, native_width, native_height, palette);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinate_mask() -> Vec<u8> {
        // Index encodes (x, y) well enough to identify corners.
        (0..50u32)
            .flat_map(|y| (0..80u32).map(move |x| ((x + y * 3) % 256) as u8))
            .collect()
    }

    #[test]
    fn test_known_sizes() {
        assert_eq!(fademask_dimensions(256_000), Some((640, 400)));
        assert_eq!(fademask_dimensions(64_000), Some((320, 200)));
        assert_eq!(fademask_dimensions(16_000), Some((160, 100)));
        assert_eq!(fademask_dimensions(4_000), Some((80, 50)));
        assert_eq!(fademask_dimensions(4_001), None);
    }

    #[test]
    fn test_rescale_hits_both_corners() {
        let source = coordinate_mask();
        let mut dest = vec![0u8; 64 * 64];
        draw_fademask(&mut dest, 64, 64, &source, 80, 50, &Palette::grayscale());

        assert_eq!(dest[0], source[0]);
        assert_eq!(dest[63 * 64 + 63], source[49 * 80 + 79]);
    }

    #[test]
    fn test_native_size_is_identity() {
        let source: Vec<u8> = (0..4_000u32).map(|i| (i % 251) as u8).collect();
        let mut dest = vec![0u8; 4_000];
        draw_fademask(&mut dest, 80, 50, &source, 80, 50, &Palette::grayscale());
        assert_eq!(dest, source);
    }

    #[test]
    fn test_writes_red_channel() {
        let mut colors = *Palette::grayscale().colors();
        colors[7] = image::Rgba([0x80, 0x10, 0x20, 0xFF]);
        let palette = Palette::new(colors);

        let source = vec![7u8; 4_000];
        let mut dest = vec![0u8; 4];
        draw_fademask(&mut dest, 2, 2, &source, 80, 50, &palette);
        assert_eq!(dest, vec![0x80; 4]);
    }

    #[test]
    fn test_bad_length_leaves_blank_mask() {
        let mut pool = TaggedPool::new();
        let mut mipmap = Mipmap::new();
        cache_fademask(&mut pool, &Palette::grayscale(), &[1, 2, 3], true, &mut mipmap);
        assert_eq!((mipmap.width, mipmap.height), (0, 0));
        assert_eq!(mipmap.data(&pool).map(<[u8]>::len), Some(0));
    }

    #[test]
    fn test_power_of_two_target() {
        let mut pool = TaggedPool::new();
        let mut mipmap = Mipmap::new();
        cache_fademask(&mut pool, &Palette::grayscale(), &coordinate_mask(), true, &mut mipmap);
        assert_eq!((mipmap.width, mipmap.height), (128, 64));
        assert_eq!(mipmap.format, TextureFormat::Alpha8);
    }
}
