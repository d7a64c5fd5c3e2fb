// Convert uploaded mipmaps back to viewable RGBA images
use image::{Rgba, RgbaImage};

use hwcache_core::driver::RecordedTexture;
use hwcache_core::{MipmapFlags, Palette, TextureFormat};

/// Resolve a recorded GPU texture to RGBA through `palette`.
pub fn to_rgba(texture: &RecordedTexture, palette: &Palette, chroma_key: u8) -> RgbaImage {
    let bpp = texture.format.bytes_per_pixel();
    let keyed = texture.flags.contains(MipmapFlags::CHROMAKEYED);

    RgbaImage::from_fn(texture.width, texture.height, |x, y| {
        let at = (y as usize * texture.width as usize + x as usize) * bpp;
        let Some(pixel) = texture.pixels.get(at..at + bpp) else {
            return Rgba([0, 0, 0, 0]);
        };
        match texture.format {
            TextureFormat::Palette8 => {
                let mut color = palette.color(pixel[0]);
                if keyed && pixel[0] == chroma_key {
                    color[3] = 0;
                }
                color
            }
            TextureFormat::PaletteAlpha88 | TextureFormat::AlphaIntensity88 => {
                let mut color = palette.color(pixel[0]);
                color[3] = pixel[1];
                color
            }
            TextureFormat::Rgb24 => Rgba([pixel[0], pixel[1], pixel[2], 0xFF]),
            TextureFormat::Rgba32 => Rgba([pixel[0], pixel[1], pixel[2], pixel[3]]),
            TextureFormat::Alpha8 => Rgba([pixel[0], pixel[0], pixel[0], 0xFF]),
        }
    })
}
