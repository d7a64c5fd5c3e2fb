// Asset store seam and decoded-patch cache
use std::borrow::Cow;
use std::collections::HashMap;

use crate::asset::patch::Patch;
use crate::asset::texture::{Texture, TextureKind};
use crate::asset::LumpNum;
use crate::error::{CacheError, Result};
use crate::texture::Palette;

/// Raw lumps and texture definitions, owned outside the cache.
pub trait AssetStore {
    fn lump(&self, lump: LumpNum) -> Option<&[u8]>;

    fn lump_length(&self, lump: LumpNum) -> Option<usize> {
        self.lump(lump).map(<[u8]>::len)
    }

    fn texture(&self, index: usize) -> Option<&Texture>;

    fn texture_count(&self) -> usize;

    fn texture_num(&self, name: &str) -> Option<usize> {
        (0..self.texture_count()).find(|&i| {
            self.texture(i)
                .is_some_and(|texture| texture.name.eq_ignore_ascii_case(name))
        })
    }
}

/// Lumps and textures held in memory.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    lumps: Vec<(String, Vec<u8>)>,
    textures: Vec<Texture>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lump(&mut self, name: impl Into<String>, data: Vec<u8>) -> LumpNum {
        self.lumps.push((name.into(), data));
        (self.lumps.len() - 1) as LumpNum
    }

    pub fn add_texture(&mut self, texture: Texture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    pub fn lump_num(&self, name: &str) -> Option<LumpNum> {
        self.lumps
            .iter()
            .position(|(lump_name, _)| lump_name.eq_ignore_ascii_case(name))
            .map(|i| i as LumpNum)
    }

    /// Replace a lump's bytes in place, keeping its number.
    pub fn replace_lump(&mut self, lump: LumpNum, data: Vec<u8>) -> Result<()> {
        let entry = self
            .lumps
            .get_mut(lump as usize)
            .ok_or(CacheError::LumpNotFound(lump))?;
        entry.1 = data;
        Ok(())
    }
}

impl AssetStore for MemoryAssetStore {
    fn lump(&self, lump: LumpNum) -> Option<&[u8]> {
        self.lumps.get(lump as usize).map(|(_, data)| data.as_slice())
    }

    fn texture(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

/// How long a decoded patch lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Decoded for one use and dropped by the caller.
    Transient,
    /// Decoded once per lump and kept until [`PatchCache::clear`].
    Cached,
}

/// Decoded patches, deduplicated by lump.
#[derive(Debug, Default)]
pub struct PatchCache {
    patches: HashMap<LumpNum, Patch>,
}

impl PatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch<'a>(
        &'a mut self,
        assets: &dyn AssetStore,
        lump: LumpNum,
        palette: &Palette,
        residency: Residency,
    ) -> Result<Cow<'a, Patch>> {
        match residency {
            Residency::Transient => {
                let data = assets.lump(lump).ok_or(CacheError::LumpNotFound(lump))?;
                Ok(Cow::Owned(Patch::decode(lump, data, palette)?))
            }
            Residency::Cached => {
                if !self.patches.contains_key(&lump) {
                    let data = assets.lump(lump).ok_or(CacheError::LumpNotFound(lump))?;
                    let patch = Patch::decode(lump, data, palette)?;
                    log::debug!("Decoded patch lump {} ({}x{})", lump, patch.width, patch.height);
                    self.patches.insert(lump, patch);
                }
                Ok(Cow::Borrowed(&self.patches[&lump]))
            }
        }
    }

    /// Fetch the patch a texture's sub-patch refers to.
    ///
    /// PNG lumps and flat-kind textures are converted on the fly and never
    /// kept; plain patch lumps go through the cache.
    pub fn fetch_for_texture<'a>(
        &'a mut self,
        assets: &dyn AssetStore,
        texture: &Texture,
        lump: LumpNum,
        palette: &Palette,
    ) -> Result<Cow<'a, Patch>> {
        let data = assets.lump(lump).ok_or(CacheError::LumpNotFound(lump))?;
        if crate::asset::patch::is_png(data) {
            return Ok(Cow::Owned(Patch::from_png(lump, data, palette)?));
        }
        if texture.kind == TextureKind::Flat {
            return Ok(Cow::Owned(Patch::from_flat(data, texture.width, texture.height, None)));
        }
        self.fetch(assets, lump, palette, Residency::Cached)
    }

    pub fn contains(&self, lump: LumpNum) -> bool {
        self.patches.contains_key(&lump)
    }

    pub fn evict(&mut self, lump: LumpNum) {
        self.patches.remove(&lump);
    }

    pub fn clear(&mut self) {
        self.patches.clear();
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
