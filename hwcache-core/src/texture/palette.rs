// 256-color palette
use image::Rgba;

pub const PALETTE_SIZE: usize = 256;

/// RGB triples, the layout of a raw palette lump.
const PLAYPAL_ENTRY_SIZE: usize = 3;

/// A 256-entry palette resolving indices to opaque RGBA colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Box<[Rgba<u8>; PALETTE_SIZE]>,
}

impl Palette {
    pub fn new(colors: [Rgba<u8>; PALETTE_SIZE]) -> Self {
        Self {
            colors: Box::new(colors),
        }
    }

    /// Ramp from black to white; index `i` maps to `(i, i, i)`.
    pub fn grayscale() -> Self {
        let mut colors = [Rgba([0, 0, 0, 0xFF]); PALETTE_SIZE];
        for (i, color) in colors.iter_mut().enumerate() {
            let v = i as u8;
            *color = Rgba([v, v, v, 0xFF]);
        }
        Self::new(colors)
    }

    /// Parse the first palette of a raw palette lump (768 bytes of RGB).
    ///
    /// Returns `None` if the lump is too short.
    pub fn from_playpal(data: &[u8]) -> Option<Self> {
        if data.len() < PALETTE_SIZE * PLAYPAL_ENTRY_SIZE {
            return None;
        }
        let mut colors = [Rgba([0, 0, 0, 0xFF]); PALETTE_SIZE];
        for (color, rgb) in colors
            .iter_mut()
            .zip(data.chunks_exact(PLAYPAL_ENTRY_SIZE))
        {
            *color = Rgba([rgb[0], rgb[1], rgb[2], 0xFF]);
        }
        Some(Self::new(colors))
    }

    #[inline]
    pub fn color(&self, index: u8) -> Rgba<u8> {
        self.colors[index as usize]
    }

    pub fn colors(&self) -> &[Rgba<u8>; PALETTE_SIZE] {
        &self.colors
    }

    /// Index of the palette entry closest to `(r, g, b)`.
    ///
    /// Squared euclidean distance; the lowest index wins ties.
    pub fn nearest_color(&self, r: u8, g: u8, b: u8) -> u8 {
        let mut best_index = 0usize;
        let mut best_distance = u32::MAX;

        for (i, color) in self.colors.iter().enumerate() {
            let dr = color[0] as i32 - r as i32;
            let dg = color[1] as i32 - g as i32;
            let db = color[2] as i32 - b as i32;
            let distance = (dr * dr + dg * dg + db * db) as u32;

            if distance < best_distance {
                best_distance = distance;
                best_index = i;
                if distance == 0 {
                    break;
                }
            }
        }

        best_index as u8
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}
