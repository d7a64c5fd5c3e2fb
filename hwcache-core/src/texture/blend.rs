// Patch blend styles
use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::texture::palette::Palette;

/// How a texture sub-patch combines with what earlier sub-patches drew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendStyle {
    /// Plain overwrite.
    #[default]
    Copy,
    Translucent,
    Add,
    Subtract,
    ReverseSubtract,
    Modulate,
}

#[inline]
fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 0xFF) as u8
}

/// Combine `foreground` over `background` at full RGBA precision.
///
/// `alpha` is the sub-patch opacity. For [`BlendStyle::Translucent`] the
/// foreground's own alpha reduces the effective opacity, and an empty
/// background only accepts a fully opaque foreground.
pub fn blend_pixel(background: Rgba<u8>, foreground: Rgba<u8>, style: BlendStyle, alpha: u8) -> Rgba<u8> {
    match style {
        BlendStyle::Copy => foreground,
        BlendStyle::Translucent => {
            let full_alpha = alpha as i32 - (0xFF - foreground[3] as i32);
            if full_alpha <= 0 {
                return background;
            }
            let alpha = full_alpha.min(0xFF);

            if background[3] == 0 {
                return if alpha == 0xFF { foreground } else { Rgba([0, 0, 0, 0]) };
            }

            let beta = 0xFF - alpha;
            let mix = |c: usize| ((background[c] as i32 * beta + foreground[c] as i32 * alpha) / 0xFF) as u8;
            Rgba([mix(0), mix(1), mix(2), 0xFF])
        }
        BlendStyle::Add | BlendStyle::Subtract | BlendStyle::ReverseSubtract => {
            let scaled = |c: usize| foreground[c] as i32 * alpha as i32 / 256;
            let op = |c: usize| {
                let bg = background[c] as i32;
                match style {
                    BlendStyle::Add => clamp_channel(bg + scaled(c)),
                    BlendStyle::Subtract => clamp_channel(bg - scaled(c)),
                    _ => clamp_channel(scaled(c) - bg),
                }
            };
            Rgba([op(0), op(1), op(2), 0xFF])
        }
        BlendStyle::Modulate => {
            let op = |c: usize| clamp_channel(background[c] as i32 * foreground[c] as i32 / 256);
            Rgba([op(0), op(1), op(2), 0xFF])
        }
    }
}

/// Blend two palette indices by resolving them through `palette`, blending
/// in RGB and mapping the result back to the nearest palette entry.
pub fn blend_palette_indexes(palette: &Palette, background: u8, foreground: u8, style: BlendStyle, alpha: u8) -> u8 {
    if style == BlendStyle::Copy {
        return foreground;
    }
    let blended = blend_pixel(palette.color(background), palette.color(foreground), style, alpha);
    palette.nearest_color(blended[0], blended[1], blended[2])
}
