// Hardware texture output formats
use serde::{Deserialize, Serialize};

/// Pixel layout of a generated mipmap buffer.
///
/// The four compositing targets are [`Palette8`](Self::Palette8),
/// [`PaletteAlpha88`](Self::PaletteAlpha88) (and its intensity twin),
/// [`Rgb24`](Self::Rgb24) and [`Rgba32`](Self::Rgba32). [`Alpha8`](Self::Alpha8)
/// is only produced by the fade mask loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    #[default]
    Palette8,         // 8-bit palette index, chroma-key for holes
    PaletteAlpha88,   // 8-bit palette index + 8-bit alpha
    AlphaIntensity88, // same layout as PaletteAlpha88
    Rgb24,            // 24-bit truecolor
    Rgba32,           // 32-bit truecolor + alpha
    Alpha8,           // single alpha channel (fade masks)
}

impl TextureFormat {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Self::Palette8),
            0x02 => Some(Self::PaletteAlpha88),
            0x0b => Some(Self::Alpha8),
            0x0d => Some(Self::AlphaIntensity88),
            0x0f => Some(Self::Rgb24),
            0x10 => Some(Self::Rgba32),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::Palette8 => 0x01,
            Self::PaletteAlpha88 => 0x02,
            Self::Alpha8 => 0x0b,
            Self::AlphaIntensity88 => 0x0d,
            Self::Rgb24 => 0x0f,
            Self::Rgba32 => 0x10,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Palette8 | Self::Alpha8 => 1,
            Self::PaletteAlpha88 | Self::AlphaIntensity88 => 2,
            Self::Rgb24 => 3,
            Self::Rgba32 => 4,
        }
    }

    /// Truecolor buffers bake palette colors in and must be regenerated when
    /// the palette changes.
    pub fn is_truecolor(&self) -> bool {
        matches!(self, Self::Rgb24 | Self::Rgba32)
    }

    /// Byte offset of the alpha channel within one pixel, if the format has one.
    pub fn alpha_offset(&self) -> Option<usize> {
        match self {
            Self::PaletteAlpha88 | Self::AlphaIntensity88 => Some(1),
            Self::Rgba32 => Some(3),
            Self::Alpha8 => Some(0),
            Self::Palette8 | Self::Rgb24 => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel_table() {
        assert_eq!(TextureFormat::Palette8.bytes_per_pixel(), 1);
        assert_eq!(TextureFormat::PaletteAlpha88.bytes_per_pixel(), 2);
        assert_eq!(TextureFormat::AlphaIntensity88.bytes_per_pixel(), 2);
        assert_eq!(TextureFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(TextureFormat::Rgba32.bytes_per_pixel(), 4);
    }

    #[test]
    fn test_ids_map_back_to_formats() {
        for format in [
            TextureFormat::Palette8,
            TextureFormat::PaletteAlpha88,
            TextureFormat::AlphaIntensity88,
            TextureFormat::Rgb24,
            TextureFormat::Rgba32,
            TextureFormat::Alpha8,
        ] {
            assert_eq!(TextureFormat::from_id(format.id()), Some(format));
        }
        assert_eq!(TextureFormat::from_id(0x7f), None);
    }

    #[test]
    fn test_serde_names_are_snake_case() {
        let json = serde_json::to_string(&TextureFormat::PaletteAlpha88).unwrap();
        assert_eq!(json, "\"palette_alpha88\"");
    }
}
