// Composite texture definitions
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::asset::LumpNum;
use crate::texture::BlendStyle;

bitflags! {
    /// Mirroring applied to a sub-patch when compositing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PatchFlip: u8 {
        const HORIZONTAL = 1;
        const VERTICAL = 2;
    }
}

/// One positioned sub-patch of a composite texture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexturePatch {
    pub lump: LumpNum,
    pub origin_x: i32,
    pub origin_y: i32,
    #[serde(default)]
    pub flip: PatchFlip,
    #[serde(default)]
    pub style: BlendStyle,
    #[serde(default = "opaque")]
    pub alpha: u8,
}

fn opaque() -> u8 {
    0xFF
}

impl TexturePatch {
    pub fn new(lump: LumpNum, origin_x: i32, origin_y: i32) -> Self {
        Self {
            lump,
            origin_x,
            origin_y,
            flip: PatchFlip::empty(),
            style: BlendStyle::Copy,
            alpha: opaque(),
        }
    }

    pub fn with_flip(mut self, flip: PatchFlip) -> Self {
        self.flip = flip;
        self
    }

    pub fn with_blend(mut self, style: BlendStyle, alpha: u8) -> Self {
        self.style = style;
        self.alpha = alpha;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureKind {
    /// Layered from column-run patches.
    #[default]
    Wall,
    /// A single raw flat standing in as a texture.
    Flat,
}

/// A named composite texture. Its size is the compositing canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    pub name: String,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub kind: TextureKind,
    /// Skies are pre-filled with a solid color and never chroma-keyed.
    #[serde(default)]
    pub sky: bool,
    pub patches: Vec<TexturePatch>,
}

impl Texture {
    /// Create a texture; `sky` defaults from the legacy naming convention.
    pub fn new(name: impl Into<String>, width: i32, height: i32, kind: TextureKind, patches: Vec<TexturePatch>) -> Self {
        let name = name.into();
        let sky = is_legacy_sky_name(&name);
        Self {
            name,
            width,
            height,
            kind,
            sky,
            patches,
        }
    }
}

/// `SKY`, `SKYn` and `SKYnn`: the historical names of large sky textures.
pub fn is_legacy_sky_name(name: &str) -> bool {
    name.len() <= 5 && name.as_bytes().starts_with(b"SKY")
}
