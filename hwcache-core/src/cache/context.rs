//! Texture Cache Context
//!
//! [`TextureCache`] owns every cached mipmap and the state they depend on:
//! output formats, the active palette, the pixel buffer pool and the GPU
//! driver. Every `get_*` call follows the same sequence:
//!
//! 1. Create the cache entry if it does not exist yet.
//! 2. Run the generator if the mipmap has neither a live buffer nor a GPU
//!    texture, or if its content went stale.
//! 3. Upload to the driver if not resident; update in place if it was
//!    resident and was just regenerated.
//! 4. Make it the active texture.
//! 5. Demote the buffer to reclaimable, since the GPU now holds a copy.
//!
//! Buffers can vanish between calls (bulk purges, memory pressure), so every
//! step re-checks the mipmap's buffer through the pool.

use crate::asset::{AssetStore, LumpNum, PatchCache, Residency, TextureKind};
use crate::cache::entry::{ColormapId, ColormapRef, MapTexture, PatchCategory, PatchEntry};
use crate::cache::mipmap::Mipmap;
use crate::cache::stats::CacheStats;
use crate::config::CacheConfig;
use crate::driver::GpuDriver;
use crate::error::{CacheError, Result};
use crate::memory::{PoolTag, TaggedPool};
use crate::texture::fademask::cache_fademask;
use crate::texture::generator::{cache_flat, flat_size, generate_texture, make_patch, GenerateParams};
use crate::texture::{Palette, PatchInfo, TextureFormat};

use std::collections::HashMap;

/// State shared by every generator and upload path.
struct CacheCore<G> {
    config: CacheConfig,
    pool: TaggedPool,
    palette: Palette,
    patches: PatchCache,
    driver: G,
    stats: CacheStats,
}

impl<G: GpuDriver> CacheCore<G> {
    fn needs_generation(&self, mipmap: &Mipmap) -> bool {
        mipmap.is_stale() || (!mipmap.has_data(&self.pool) && !mipmap.is_resident())
    }

    fn generated(&mut self, mipmap: &mut Mipmap) {
        mipmap.set_stale(false);
        self.stats.generations += 1;
    }

    /// Steps 3 to 5 of the get sequence.
    fn realize(&mut self, mipmap: &mut Mipmap, regenerated: bool) {
        match mipmap.gpu_handle() {
            None => match mipmap.upload(&self.pool) {
                Some(upload) => {
                    let handle = self.driver.upload(&upload);
                    mipmap.set_gpu_handle(Some(handle));
                    self.stats.uploads += 1;
                    log::debug!("Uploaded {}x{} {:?} as {:?}", upload.width, upload.height, upload.format, handle);
                }
                None => log::debug!("Mipmap has no buffer to upload"),
            },
            Some(handle) if regenerated => {
                if let Some(upload) = mipmap.upload(&self.pool) {
                    self.driver.update(handle, &upload);
                    self.stats.updates += 1;
                    log::debug!("Updated {:?} in place", handle);
                }
            }
            Some(_) => {}
        }

        self.driver.set_active(mipmap.gpu_handle());
        mipmap.change_tag(&mut self.pool, PoolTag::CacheUnlocked);
    }

    /// Delete a mipmap's GPU texture and free its buffer.
    fn release(&mut self, mipmap: &mut Mipmap) {
        if let Some(handle) = mipmap.gpu_handle() {
            self.driver.delete(handle);
            self.stats.deletes += 1;
            mipmap.set_gpu_handle(None);
        }
        mipmap.release_data(&mut self.pool);
    }

    /// Generate (if needed) and realize one sprite mipmap.
    fn load_patch_mipmap(
        &mut self,
        assets: &dyn AssetStore,
        lump: LumpNum,
        mipmap: &mut Mipmap,
        info: &mut PatchInfo,
        force: bool,
    ) -> Result<()> {
        let regenerate = force || self.needs_generation(mipmap);
        if regenerate {
            let patch = self.patches.fetch(assets, lump, &self.palette, Residency::Cached)?;
            let params = GenerateParams {
                palette: &self.palette,
                chroma_key: self.config.chroma_key_index,
            };
            *info = make_patch(&mut self.pool, params, self.config.patch_format, &patch, mipmap);
            self.generated(mipmap);
            log::debug!("Generated patch lump {} ({}x{})", lump, info.width, info.height);
        }
        self.realize(mipmap, regenerate);
        Ok(())
    }

    fn purge_tag(&mut self, tag: PoolTag) -> usize {
        let freed = self.pool.free_tag(tag);
        self.stats.purges += freed as u64;
        freed
    }
}

/// The hardware texture cache.
pub struct TextureCache<G: GpuDriver> {
    core: CacheCore<G>,
    textures: Vec<MapTexture>,
    flats: Vec<MapTexture>,
    lumps: HashMap<LumpNum, PatchEntry>,
}

impl<G: GpuDriver> TextureCache<G> {
    pub fn new(config: CacheConfig, driver: G) -> Self {
        let pool = TaggedPool::with_budget(config.memory_budget);
        Self {
            core: CacheCore {
                config,
                pool,
                palette: Palette::default(),
                patches: PatchCache::new(),
                driver,
                stats: CacheStats::default(),
            },
            textures: Vec::new(),
            flats: Vec::new(),
            lumps: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.core.config
    }

    pub fn driver(&self) -> &G {
        &self.core.driver
    }

    pub fn driver_mut(&mut self) -> &mut G {
        &mut self.core.driver
    }

    pub fn palette(&self) -> &Palette {
        &self.core.palette
    }

    pub fn pool(&self) -> &TaggedPool {
        &self.core.pool
    }

    pub fn stats(&self) -> CacheStats {
        self.core.stats
    }

    /// Live system-memory pixels of `mipmap`, if its buffer was not purged.
    pub fn pixels(&self, mipmap: &Mipmap) -> Option<&[u8]> {
        mipmap.data(&self.core.pool)
    }

    pub fn map_texture(&self, texture_num: usize) -> Option<&MapTexture> {
        self.textures.get(texture_num)
    }

    pub fn level_flat(&self, texture_num: usize) -> Option<&MapTexture> {
        self.flats.get(texture_num)
    }

    pub fn patch_entry(&self, lump: LumpNum) -> Option<&PatchEntry> {
        self.lumps.get(&lump)
    }

    pub fn map_textures_loaded(&self) -> usize {
        self.textures.len()
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    /// Switch output formats.
    ///
    /// Turning truecolor on or off invalidates everything. Other switches
    /// only drop the colormap variants; existing mipmaps keep their format
    /// until they are regenerated.
    pub fn set_formats(&mut self, patch_format: TextureFormat, texture_format: TextureFormat) {
        let was_truecolor = self.core.config.uses_truecolor();
        let changed = self.core.config.patch_format != patch_format || self.core.config.texture_format != texture_format;
        self.core.config.patch_format = patch_format;
        self.core.config.texture_format = texture_format;

        if !changed {
            return;
        }
        if was_truecolor != self.core.config.uses_truecolor() {
            log::debug!("Truecolor toggled, invalidating every cached texture");
            self.invalidate_all();
        } else {
            self.free_colormap_cache();
        }
    }

    /// Install a new palette.
    ///
    /// With a truecolor format active, every truecolor mipmap is marked stale
    /// and all cache buffers are freed, so the next get regenerates it and
    /// updates its GPU texture in place.
    pub fn set_palette(&mut self, palette: Palette) {
        self.core.driver.set_palette(&palette);
        self.core.palette = palette;
        // PNG patches were matched against the old palette.
        self.core.patches.clear();

        if !self.core.config.uses_truecolor() {
            return;
        }

        let tables = self.textures.iter_mut().chain(self.flats.iter_mut()).map(|t| &mut t.mipmap);
        let entries = self.lumps.values_mut().flat_map(|entry| entry.mipmaps_mut());
        let mut stale = 0usize;
        for mipmap in tables.chain(entries) {
            if mipmap.format.is_truecolor() && !mipmap.is_blank() {
                mipmap.set_stale(true);
                stale += 1;
            }
        }

        let freed = self.core.purge_tag(PoolTag::Cache) + self.core.purge_tag(PoolTag::CacheUnlocked);
        log::debug!("Palette changed: {} truecolor mipmaps stale, {} buffers freed", stale, freed);
    }

    // ---------------------------------------------------------------------
    // Map textures
    // ---------------------------------------------------------------------

    /// Size the wall texture and level flat tables for a new level.
    pub fn load_map_textures(&mut self, count: usize) {
        self.free_map_textures();
        self.textures = std::iter::repeat_with(MapTexture::default).take(count).collect();
        self.flats = std::iter::repeat_with(MapTexture::default).take(count).collect();
        log::debug!("Loaded {} map texture slots", count);
    }

    pub fn free_map_textures(&mut self) {
        let mut textures = std::mem::take(&mut self.textures);
        let mut flats = std::mem::take(&mut self.flats);
        for texture in textures.iter_mut().chain(flats.iter_mut()) {
            self.core.release(&mut texture.mipmap);
        }
    }

    /// Make wall texture `texture_num` resident and active.
    pub fn get_texture(&mut self, assets: &dyn AssetStore, texture_num: usize) -> Result<&MapTexture> {
        let loaded = self.textures.len();
        let grtex = self
            .textures
            .get_mut(texture_num)
            .ok_or(CacheError::TextureOutOfRange {
                index: texture_num,
                loaded,
            })?;
        let texture = assets.texture(texture_num).ok_or(CacheError::TextureOutOfRange {
            index: texture_num,
            loaded: assets.texture_count(),
        })?;

        if texture.width <= 0 || texture.height <= 0 {
            log::debug!("Texture {} has no area, nothing to draw", texture.name);
            self.core.driver.set_active(None);
            return Ok(&self.textures[texture_num]);
        }

        let core = &mut self.core;
        let regenerate = core.needs_generation(&grtex.mipmap);
        if regenerate {
            let params = GenerateParams {
                palette: &core.palette,
                chroma_key: core.config.chroma_key_index,
            };
            generate_texture(
                &mut core.pool,
                &mut core.patches,
                assets,
                params,
                core.config.texture_format,
                texture,
                &mut grtex.mipmap,
            );
            grtex.set_scale(texture.width, texture.height);
            core.generated(&mut grtex.mipmap);
            log::debug!("Generated texture {} ({}x{})", texture.name, texture.width, texture.height);
        }
        core.realize(&mut grtex.mipmap, regenerate);

        Ok(&self.textures[texture_num])
    }

    /// Make the level flat for `texture_num` active.
    ///
    /// `None` and texture 0 mean "no flat" and unbind the active texture.
    pub fn get_level_flat(&mut self, assets: &dyn AssetStore, texture_num: Option<usize>) -> Result<Option<&MapTexture>> {
        let Some(texture_num) = texture_num.filter(|&num| num > 0) else {
            self.core.driver.set_active(None);
            return Ok(None);
        };

        let loaded = self.flats.len();
        let grtex = self
            .flats
            .get_mut(texture_num)
            .ok_or(CacheError::TextureOutOfRange {
                index: texture_num,
                loaded,
            })?;
        let texture = assets.texture(texture_num).ok_or(CacheError::TextureOutOfRange {
            index: texture_num,
            loaded: assets.texture_count(),
        })?;

        let core = &mut self.core;
        let regenerate = core.needs_generation(&grtex.mipmap);
        if regenerate {
            let params = GenerateParams {
                palette: &core.palette,
                chroma_key: core.config.chroma_key_index,
            };
            let width = texture.width.max(0) as u32;
            let height = texture.height.max(0) as u32;
            let raw = match texture.kind {
                TextureKind::Flat => texture.patches.first().and_then(|patch| assets.lump(patch.lump)),
                TextureKind::Wall => None,
            };
            match raw {
                Some(data) => cache_flat(&mut core.pool, params, data, width, height, &mut grtex.mipmap),
                None => generate_texture(
                    &mut core.pool,
                    &mut core.patches,
                    assets,
                    params,
                    TextureFormat::Palette8,
                    texture,
                    &mut grtex.mipmap,
                ),
            }
            grtex.set_scale(texture.width, texture.height);
            core.generated(&mut grtex.mipmap);
            log::debug!("Generated level flat {} ({}x{})", texture.name, width, height);
        }
        core.realize(&mut grtex.mipmap, regenerate);

        Ok(Some(&self.flats[texture_num]))
    }

    // ---------------------------------------------------------------------
    // Lump-keyed mipmaps
    // ---------------------------------------------------------------------

    /// Make a raw flat lump active, sized by its byte length.
    pub fn get_raw_flat(&mut self, assets: &dyn AssetStore, lump: LumpNum) -> Result<()> {
        let data = assets.lump(lump).ok_or(CacheError::LumpNotFound(lump))?;
        let entry = self.lumps.entry(lump).or_default();
        let core = &mut self.core;

        let regenerate = core.needs_generation(&entry.mipmap);
        if regenerate {
            let size = flat_size(data.len());
            let params = GenerateParams {
                palette: &core.palette,
                chroma_key: core.config.chroma_key_index,
            };
            cache_flat(&mut core.pool, params, data, size, size, &mut entry.mipmap);
            core.generated(&mut entry.mipmap);
            log::debug!("Cached raw flat lump {} ({}x{})", lump, size, size);
        }
        core.realize(&mut entry.mipmap, regenerate);
        Ok(())
    }

    /// Make a fade mask lump active as an alpha-only texture.
    pub fn get_fade_mask(&mut self, assets: &dyn AssetStore, lump: LumpNum) -> Result<()> {
        let data = assets.lump(lump).ok_or(CacheError::LumpNotFound(lump))?;
        let entry = self.lumps.entry(lump).or_default();
        let core = &mut self.core;

        let regenerate = core.needs_generation(&entry.mipmap);
        if regenerate {
            let power_of_two = core.config.fademask_power_of_two;
            cache_fademask(&mut core.pool, &core.palette, data, power_of_two, &mut entry.mipmap);
            core.generated(&mut entry.mipmap);
        }
        core.realize(&mut entry.mipmap, regenerate);
        Ok(())
    }

    /// Make a sprite patch active.
    pub fn get_patch(&mut self, assets: &dyn AssetStore, lump: LumpNum) -> Result<PatchInfo> {
        self.get_patch_in(assets, lump, PatchCategory::Patch)
    }

    /// [`get_patch`](Self::get_patch) with an explicit lifetime class for a
    /// newly created entry.
    pub fn get_patch_in(&mut self, assets: &dyn AssetStore, lump: LumpNum, category: PatchCategory) -> Result<PatchInfo> {
        let entry = self
            .lumps
            .entry(lump)
            .or_insert_with(|| PatchEntry::new(category));
        self.core
            .load_patch_mipmap(assets, lump, &mut entry.mipmap, &mut entry.info, false)?;
        Ok(entry.info)
    }

    /// Make a colormap-translated sprite active.
    ///
    /// Variants are looked up by [`ColormapId`]. A known id whose table bytes
    /// changed is regenerated in place; an unknown id gets a new variant.
    /// `None` is the untranslated patch.
    pub fn get_mapped_patch(
        &mut self,
        assets: &dyn AssetStore,
        lump: LumpNum,
        colormap: Option<ColormapRef<'_>>,
    ) -> Result<PatchInfo> {
        let Some(colormap) = colormap else {
            return self.get_patch(assets, lump);
        };

        let entry = self.lumps.entry(lump).or_default();
        let mut info = entry.info;

        let force = match entry.variants.get_mut(&colormap.id) {
            Some(variant) => match variant.colormap.as_deref_mut() {
                Some(table) if *table != *colormap.table => {
                    *table = *colormap.table;
                    log::debug!("Colormap {:?} of lump {} changed, regenerating", colormap.id, lump);
                    true
                }
                Some(_) => false,
                None => {
                    variant.colormap = Some(Box::new(*colormap.table));
                    true
                }
            },
            None => {
                entry
                    .variants
                    .insert(colormap.id, Mipmap::with_colormap(colormap.table));
                false
            }
        };

        let Some(variant) = entry.variants.get_mut(&colormap.id) else {
            return Ok(info);
        };
        self.core
            .load_patch_mipmap(assets, lump, variant, &mut info, force)?;
        entry.info = info;
        Ok(info)
    }

    /// Demote a patch's buffer to reclaimable without drawing it.
    pub fn unlock_cached_patch(&mut self, lump: LumpNum) {
        if let Some(entry) = self.lumps.get(&lump) {
            entry.mipmap.change_tag(&mut self.core.pool, PoolTag::CacheUnlocked);
        }
    }

    /// Drop a lump's GPU texture and buffer but keep its descriptor.
    pub fn free_patch_data(&mut self, lump: LumpNum) {
        if let Some(entry) = self.lumps.get_mut(&lump) {
            self.core.release(&mut entry.mipmap);
        }
    }

    /// Drop everything cached for a lump, colormap variants included.
    pub fn free_patch(&mut self, lump: LumpNum) {
        if let Some(mut entry) = self.lumps.remove(&lump) {
            for mipmap in entry.mipmaps_mut() {
                self.core.release(mipmap);
            }
            self.core.patches.evict(lump);
        }
    }

    /// Drop every colormap variant of every swept entry.
    pub fn free_colormap_cache(&mut self) {
        let mut freed = 0usize;
        for entry in self.lumps.values_mut().filter(|entry| entry.category.is_swept()) {
            for (_, mut variant) in entry.variants.drain(..) {
                self.core.release(&mut variant);
                freed += 1;
            }
        }
        log::debug!("Freed {} colormap variants", freed);
    }

    /// Level transition: forget every GPU texture and drop all swept entries.
    pub fn clear_all_textures(&mut self) {
        self.core.driver.clear_handle_cache();

        let core = &mut self.core;
        self.lumps.retain(|_, entry| {
            if entry.category.is_swept() {
                for mipmap in entry.mipmaps_mut() {
                    mipmap.release_data(&mut core.pool);
                }
                false
            } else {
                true
            }
        });

        // The driver no longer knows the surviving handles either.
        let tables = self.textures.iter_mut().chain(self.flats.iter_mut()).map(|t| &mut t.mipmap);
        let entries = self.lumps.values_mut().flat_map(|entry| entry.mipmaps_mut());
        for mipmap in tables.chain(entries) {
            mipmap.set_gpu_handle(None);
        }
        self.core.patches.clear();
        log::debug!("Cleared all textures");
    }

    /// Release every reclaimable buffer. Returns the number freed.
    pub fn purge_reclaimable(&mut self) -> usize {
        let freed = self.core.purge_tag(PoolTag::CacheUnlocked);
        log::debug!("Purged {} reclaimable buffers", freed);
        freed
    }

    /// Full reset after a truecolor switch; map texture tables keep their size.
    fn invalidate_all(&mut self) {
        self.clear_all_textures();
        for texture in self.textures.iter_mut().chain(self.flats.iter_mut()) {
            texture.mipmap.release_data(&mut self.core.pool);
            *texture = MapTexture::default();
        }
        for entry in self.lumps.values_mut() {
            for mipmap in entry.mipmaps_mut() {
                mipmap.release_data(&mut self.core.pool);
                let colormap = mipmap.colormap.take();
                *mipmap = Mipmap::default();
                mipmap.colormap = colormap;
            }
        }
    }
}

impl<G: GpuDriver> std::fmt::Debug for TextureCache<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("config", &self.core.config)
            .field("textures", &self.textures.len())
            .field("lumps", &self.lumps.len())
            .field("stats", &self.core.stats)
            .finish()
    }
}

/// Identity used by [`TextureCache::get_mapped_patch`] callers that key
/// colormaps by a table's address in a long-lived lookup.
pub fn colormap_id_of(table: &[u8; crate::texture::PALETTE_SIZE]) -> ColormapId {
    ColormapId(table.as_ptr() as usize as u64)
}
