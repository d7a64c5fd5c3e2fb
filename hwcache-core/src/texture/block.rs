// Block builder: allocate and clear a mipmap's pixel buffer
use crate::cache::Mipmap;
use crate::memory::{BufferHandle, PoolTag, TaggedPool};
use crate::texture::formats::TextureFormat;

/// Allocate `mipmap`'s buffer from the pool and fill it with the format's
/// empty value.
///
/// | format                 | fill                         |
/// |------------------------|------------------------------|
/// | 8-bit palette / alpha  | chroma-key index             |
/// | 16-bit palette + alpha | chroma-key index, alpha 0    |
/// | 24-bit truecolor       | none (zeroed)                |
/// | 32-bit truecolor       | transparent black            |
///
/// Any buffer the mipmap held before is freed. The new buffer is tagged
/// [`PoolTag::Cache`] so it survives reclaim purges until it is uploaded.
pub fn make_block(pool: &mut TaggedPool, mipmap: &mut Mipmap, chroma_key: u8) -> BufferHandle {
    mipmap.release_data(pool);

    let pixel_count = mipmap.width as usize * mipmap.height as usize;
    let bpp = mipmap.format.bytes_per_pixel();
    let handle = pool.alloc(pixel_count * bpp, PoolTag::Cache);

    if let Some(block) = pool.get_mut(handle) {
        match mipmap.format {
            TextureFormat::Palette8 | TextureFormat::Alpha8 => block.fill(chroma_key),
            TextureFormat::PaletteAlpha88 | TextureFormat::AlphaIntensity88 => {
                for pixel in block.chunks_exact_mut(2) {
                    pixel[0] = chroma_key;
                    pixel[1] = 0x00;
                }
            }
            TextureFormat::Rgb24 | TextureFormat::Rgba32 => {}
        }
    }

    mipmap.set_data(handle);
    handle
}
