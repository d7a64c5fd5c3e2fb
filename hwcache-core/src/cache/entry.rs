// Cache entries: map textures, per-lump patches and their colormap variants
use indexmap::IndexMap;

use crate::cache::mipmap::Mipmap;
use crate::texture::column::FRACUNIT;
use crate::texture::{PatchInfo, PALETTE_SIZE};

/// Identity of a colormap table, chosen by the caller.
///
/// Two tables with the same bytes but different ids are cached as separate
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColormapId(pub u64);

/// A colormap table together with its identity.
#[derive(Debug, Clone, Copy)]
pub struct ColormapRef<'a> {
    pub id: ColormapId,
    pub table: &'a [u8; PALETTE_SIZE],
}

impl<'a> ColormapRef<'a> {
    pub fn new(id: ColormapId, table: &'a [u8; PALETTE_SIZE]) -> Self {
        Self { id, table }
    }
}

/// Lifetime class of a lump-keyed entry.
///
/// Everything except [`PatchCategory::Static`] is swept by
/// `clear_all_textures` and `free_colormap_cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatchCategory {
    #[default]
    Patch,
    PatchRotated,
    Sprite,
    HudGfx,
    Static,
}

impl PatchCategory {
    pub fn is_swept(&self) -> bool {
        !matches!(self, Self::Static)
    }
}

/// A wall texture or level flat slot.
#[derive(Debug, Default)]
pub struct MapTexture {
    pub mipmap: Mipmap,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl MapTexture {
    pub(crate) fn set_scale(&mut self, width: i32, height: i32) {
        self.scale_x = 1.0 / (width as f32 * FRACUNIT as f32);
        self.scale_y = 1.0 / (height as f32 * FRACUNIT as f32);
    }
}

/// Everything cached for one lump: the untranslated mipmap plus one variant
/// per colormap, in creation order.
#[derive(Debug, Default)]
pub struct PatchEntry {
    pub category: PatchCategory,
    pub(crate) mipmap: Mipmap,
    pub(crate) variants: IndexMap<ColormapId, Mipmap>,
    pub(crate) info: PatchInfo,
}

impl PatchEntry {
    pub fn new(category: PatchCategory) -> Self {
        Self {
            category,
            ..Self::default()
        }
    }

    pub fn mipmap(&self) -> &Mipmap {
        &self.mipmap
    }

    pub fn variant(&self, id: ColormapId) -> Option<&Mipmap> {
        self.variants.get(&id)
    }

    pub fn variant_ids(&self) -> impl Iterator<Item = ColormapId> + '_ {
        self.variants.keys().copied()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn info(&self) -> PatchInfo {
        self.info
    }

    /// The primary mipmap followed by every variant.
    pub(crate) fn mipmaps_mut(&mut self) -> impl Iterator<Item = &mut Mipmap> {
        std::iter::once(&mut self.mipmap).chain(self.variants.values_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_entries_survive_sweeps() {
        assert!(PatchCategory::Sprite.is_swept());
        assert!(PatchCategory::HudGfx.is_swept());
        assert!(!PatchCategory::Static.is_swept());
    }

    #[test]
    fn test_map_texture_scale() {
        let mut texture = MapTexture::default();
        texture.set_scale(64, 128);
        assert_eq!(texture.scale_x, 1.0 / (64.0 * 65536.0));
        assert_eq!(texture.scale_y, 1.0 / (128.0 * 65536.0));
    }

    #[test]
    fn test_variants_keep_creation_order() {
        let mut entry = PatchEntry::new(PatchCategory::Sprite);
        let table = [0u8; PALETTE_SIZE];
        for id in [3, 1, 2] {
            entry.variants.insert(ColormapId(id), Mipmap::with_colormap(&table));
        }
        let ids: Vec<_> = entry.variant_ids().collect();
        assert_eq!(ids, vec![ColormapId(3), ColormapId(1), ColormapId(2)]);
        assert_eq!(entry.mipmaps_mut().count(), 4);
    }
}
