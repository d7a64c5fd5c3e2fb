// Mipmap lifecycle, colormap variants and invalidation
mod utils;

#[cfg(test)]
mod tests {
    use super::utils::{active_pixels, new_cache, patch_lump_from_columns, shifted_colormap, solid_patch_lump};
    use hwcache_core::asset::{MemoryAssetStore, Texture, TextureKind, TexturePatch};
    use hwcache_core::{
        CacheConfig, ColormapId, ColormapRef, MipmapFlags, MipmapState, Palette, PatchCategory, TextureFormat,
    };

    fn sprite_store() -> (MemoryAssetStore, u32) {
        let mut store = MemoryAssetStore::new();
        let lump = store.add_lump(
            "SPRITE",
            patch_lump_from_columns(
                5,
                &[
                    &[None, Some(0x10), Some(0x11), None, None],
                    &[Some(0x12), Some(0x13), Some(0x14), Some(0x15), Some(0x16)],
                    &[None, None, None, None, Some(0x17)],
                ],
            ),
        );
        (store, lump)
    }

    fn wall_store() -> MemoryAssetStore {
        let mut store = MemoryAssetStore::new();
        let lump = store.add_lump("BRICK", solid_patch_lump(4, 4, 0x10));
        store.add_texture(Texture::new(
            "BRICK",
            4,
            4,
            TextureKind::Wall,
            vec![TexturePatch::new(lump, 0, 0)],
        ));
        store
    }

    #[test]
    fn test_patch_round_trip_after_purge() {
        let (store, lump) = sprite_store();
        let mut cache = new_cache(CacheConfig::default());

        let info = cache.get_patch(&store, lump).unwrap();
        assert_eq!((info.width, info.height), (3, 5));
        let entry = cache.patch_entry(lump).unwrap();
        assert_eq!(entry.mipmap().state(cache.pool()), MipmapState::Resident);
        assert_eq!((entry.mipmap().width, entry.mipmap().height), (4, 8));
        let original = cache.pixels(entry.mipmap()).unwrap().to_vec();

        assert_eq!(cache.purge_reclaimable(), 1);
        let entry = cache.patch_entry(lump).unwrap();
        assert_eq!(entry.mipmap().state(cache.pool()), MipmapState::Purged);

        // Still resident on the GPU: nothing to regenerate.
        cache.get_patch(&store, lump).unwrap();
        assert_eq!(cache.stats().generations, 1);
        assert_eq!(cache.stats().uploads, 1);

        cache.clear_all_textures();
        assert!(cache.patch_entry(lump).is_none());

        cache.get_patch(&store, lump).unwrap();
        let entry = cache.patch_entry(lump).unwrap();
        assert_eq!(cache.pixels(entry.mipmap()).unwrap(), original.as_slice());
        assert_eq!(cache.stats().generations, 2);
        assert_eq!(cache.stats().uploads, 2);
        assert_eq!(active_pixels(&cache), original);
    }

    #[test]
    fn test_texture_regeneration_is_idempotent() {
        let store = wall_store();
        let mut cache = new_cache(CacheConfig::default());
        cache.load_map_textures(1);

        cache.get_texture(&store, 0).unwrap();
        let first = active_pixels(&cache);

        cache.purge_reclaimable();
        cache.clear_all_textures();
        let mipmap = &cache.map_texture(0).unwrap().mipmap;
        assert_eq!(mipmap.state(cache.pool()), MipmapState::Unrealized);

        cache.get_texture(&store, 0).unwrap();
        assert_eq!(active_pixels(&cache), first);
        assert_eq!(cache.stats().generations, 2);
    }

    #[test]
    fn test_colormap_variant_identity() {
        let (store, lump) = sprite_store();
        let mut cache = new_cache(CacheConfig::default());

        let table = shifted_colormap(1);
        let twin = shifted_colormap(1);
        let first = ColormapRef::new(ColormapId(1), &table);

        cache.get_mapped_patch(&store, lump, Some(first)).unwrap();
        assert_eq!(cache.stats().generations, 1);
        // Remapped on write: 0x12 becomes 0x13 at the top of column 1.
        let variant = cache.patch_entry(lump).unwrap().variant(ColormapId(1)).unwrap();
        assert_eq!(&cache.pixels(variant).unwrap()[2..4], &[0x13, 0xFF]);

        cache.get_mapped_patch(&store, lump, Some(first)).unwrap();
        assert_eq!(cache.stats().generations, 1);

        // Same bytes, different identity: a second variant.
        cache
            .get_mapped_patch(&store, lump, Some(ColormapRef::new(ColormapId(2), &twin)))
            .unwrap();
        assert_eq!(cache.stats().generations, 2);
        assert_eq!(cache.patch_entry(lump).unwrap().variant_count(), 2);

        // Known identity, new bytes: regenerated and updated in place.
        let changed = shifted_colormap(2);
        cache
            .get_mapped_patch(&store, lump, Some(ColormapRef::new(ColormapId(1), &changed)))
            .unwrap();
        let stats = cache.stats();
        assert_eq!((stats.generations, stats.uploads, stats.updates), (3, 2, 1));
        let variant = cache.patch_entry(lump).unwrap().variant(ColormapId(1)).unwrap();
        assert_eq!(&cache.pixels(variant).unwrap()[2..4], &[0x14, 0xFF]);

        // No colormap is the untranslated patch.
        cache.get_mapped_patch(&store, lump, None).unwrap();
        assert_eq!(cache.stats().generations, 4);
        assert_eq!(cache.patch_entry(lump).unwrap().variant_count(), 2);
    }

    #[test]
    fn test_free_colormap_cache_keeps_primary() {
        let (store, lump) = sprite_store();
        let mut cache = new_cache(CacheConfig::default());
        let table = shifted_colormap(3);

        cache.get_patch(&store, lump).unwrap();
        cache
            .get_mapped_patch(&store, lump, Some(ColormapRef::new(ColormapId(7), &table)))
            .unwrap();
        cache.free_colormap_cache();

        let entry = cache.patch_entry(lump).unwrap();
        assert_eq!(entry.variant_count(), 0);
        assert!(entry.mipmap().is_resident());
        assert_eq!(cache.driver().texture_count(), 1);
    }

    #[test]
    fn test_free_patch_and_free_patch_data() {
        let (store, lump) = sprite_store();
        let mut cache = new_cache(CacheConfig::default());
        let table = shifted_colormap(3);

        cache.get_patch(&store, lump).unwrap();
        cache.free_patch_data(lump);
        let entry = cache.patch_entry(lump).unwrap();
        assert_eq!(entry.mipmap().state(cache.pool()), MipmapState::Unrealized);
        assert_eq!(cache.stats().deletes, 1);

        cache.get_patch(&store, lump).unwrap();
        cache
            .get_mapped_patch(&store, lump, Some(ColormapRef::new(ColormapId(7), &table)))
            .unwrap();
        cache.free_patch(lump);
        assert!(cache.patch_entry(lump).is_none());
        assert_eq!(cache.stats().deletes, 3);
        assert_eq!(cache.driver().texture_count(), 0);
        assert_eq!(cache.pool().live_count(), 0);
    }

    #[test]
    fn test_static_entries_survive_clear() {
        let (store, lump) = sprite_store();
        let mut cache = new_cache(CacheConfig::default());

        cache.get_patch_in(&store, lump, PatchCategory::Static).unwrap();
        cache.clear_all_textures();

        let entry = cache.patch_entry(lump).unwrap();
        assert_eq!(entry.mipmap().state(cache.pool()), MipmapState::Buffered);

        // The buffer survived, so it is re-uploaded without regenerating.
        cache.get_patch(&store, lump).unwrap();
        assert_eq!(cache.stats().generations, 1);
        assert_eq!(cache.stats().uploads, 2);
    }

    #[test]
    fn test_truecolor_palette_change_updates_in_place() {
        let store = wall_store();
        let config = CacheConfig {
            texture_format: TextureFormat::Rgba32,
            ..CacheConfig::default()
        };
        let mut cache = new_cache(config);
        cache.load_map_textures(1);
        cache.get_texture(&store, 0).unwrap();
        assert_eq!(&active_pixels(&cache)[..4], &[0x10, 0x10, 0x10, 0xFF]);

        let mut colors = *Palette::grayscale().colors();
        colors[0x10] = image::Rgba([0xC0, 0x00, 0x00, 0xFF]);
        cache.set_palette(Palette::new(colors));
        assert!(cache.map_texture(0).unwrap().mipmap.is_stale());

        cache.get_texture(&store, 0).unwrap();
        let stats = cache.stats();
        assert_eq!((stats.generations, stats.uploads, stats.updates), (2, 1, 1));
        assert_eq!(&active_pixels(&cache)[..4], &[0xC0, 0x00, 0x00, 0xFF]);
        assert_eq!(cache.driver().counters().palette_changes, 1);
    }

    #[test]
    fn test_paletted_palette_change_keeps_buffers() {
        let store = wall_store();
        let mut cache = new_cache(CacheConfig::default());
        cache.load_map_textures(1);
        cache.get_texture(&store, 0).unwrap();

        cache.set_palette(Palette::grayscale());
        cache.get_texture(&store, 0).unwrap();
        assert_eq!(cache.stats().generations, 1);
        assert_eq!(cache.stats().updates, 0);
    }

    #[test]
    fn test_truecolor_toggle_invalidates_everything() {
        let (store, lump) = sprite_store();
        let mut cache = new_cache(CacheConfig::default());
        cache.get_patch(&store, lump).unwrap();

        cache.set_formats(TextureFormat::Rgba32, TextureFormat::Palette8);
        assert_eq!(cache.driver().counters().handle_cache_clears, 1);
        assert!(cache.patch_entry(lump).is_none());

        cache.get_patch(&store, lump).unwrap();
        let mipmap = cache.patch_entry(lump).unwrap().mipmap();
        assert_eq!(mipmap.format, TextureFormat::Rgba32);
        assert_eq!(cache.pixels(mipmap).unwrap().len(), 4 * 8 * 4);
    }

    #[test]
    fn test_non_truecolor_switch_only_drops_variants() {
        let (store, lump) = sprite_store();
        let mut cache = new_cache(CacheConfig::default());
        let table = shifted_colormap(1);
        cache
            .get_mapped_patch(&store, lump, Some(ColormapRef::new(ColormapId(1), &table)))
            .unwrap();

        cache.set_formats(TextureFormat::AlphaIntensity88, TextureFormat::Palette8);
        assert_eq!(cache.driver().counters().handle_cache_clears, 0);
        assert_eq!(cache.patch_entry(lump).unwrap().variant_count(), 0);
    }

    #[test]
    fn test_memory_budget_reclaims_unlocked_buffers() {
        let mut store = MemoryAssetStore::new();
        let a = store.add_lump("A", solid_patch_lump(4, 4, 1));
        let b = store.add_lump("B", solid_patch_lump(4, 4, 2));
        let config = CacheConfig {
            // One 4x4 palette+alpha sprite is 32 bytes.
            memory_budget: Some(40),
            ..CacheConfig::default()
        };
        let mut cache = new_cache(config);

        cache.get_patch(&store, a).unwrap();
        cache.get_patch(&store, b).unwrap();

        let first = cache.patch_entry(a).unwrap().mipmap();
        let second = cache.patch_entry(b).unwrap().mipmap();
        assert_eq!(first.state(cache.pool()), MipmapState::Purged);
        assert_eq!(second.state(cache.pool()), MipmapState::Resident);
    }

    #[test]
    fn test_raw_flat_sizes() {
        let mut store = MemoryAssetStore::new();
        let small = store.add_lump("SMALL", vec![7; 1024]);
        let odd = store.add_lump("ODD", vec![7; 100]);
        let mut cache = new_cache(CacheConfig::default());

        cache.get_raw_flat(&store, small).unwrap();
        let mipmap = cache.patch_entry(small).unwrap().mipmap();
        assert_eq!((mipmap.width, mipmap.height), (32, 32));
        assert_eq!(mipmap.flags, MipmapFlags::WRAP_XY | MipmapFlags::CHROMAKEYED);
        assert_eq!(active_pixels(&cache), vec![7; 1024]);

        cache.get_raw_flat(&store, odd).unwrap();
        let pixels = active_pixels(&cache);
        assert_eq!(pixels.len(), 64 * 64);
        assert_eq!(&pixels[..100], &[7; 100][..]);
        assert_eq!(pixels[100], 0xFF);
    }

    #[test]
    fn test_missing_lump_is_an_error() {
        let store = MemoryAssetStore::new();
        let mut cache = new_cache(CacheConfig::default());
        assert!(cache.get_patch(&store, 42).is_err());
        assert!(cache.get_raw_flat(&store, 42).is_err());
        assert!(cache.get_fade_mask(&store, 42).is_err());
    }
}
