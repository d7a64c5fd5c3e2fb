// CLI command handlers
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

use hwcache_core::asset::{AssetStore, LumpNum, MemoryAssetStore};
use hwcache_core::memory::PoolTag;
use hwcache_core::{CacheConfig, ColormapId, ColormapRef, RecordingDriver, TextureCache, PALETTE_SIZE};

use crate::manifest::Manifest;
use crate::render::to_rgba;

/// A cache primed with a manifest's assets.
struct Session {
    store: MemoryAssetStore,
    cache: TextureCache<RecordingDriver>,
}

fn open_session(manifest_path: &Path, config_override: Option<&Path>) -> Result<Session> {
    let manifest = Manifest::load(manifest_path)?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let assets = manifest.into_assets(base)?;

    let config = match config_override.map(Path::to_path_buf).or(assets.config) {
        Some(path) => CacheConfig::load(&path)
            .with_context(|| format!("Failed to load cache config: {}", path.display()))?,
        None => CacheConfig::default(),
    };
    log::debug!("Cache config: {:?}", config);

    let mut cache = TextureCache::new(config, RecordingDriver::new());
    cache.set_palette(assets.palette);
    cache.load_map_textures(assets.store.texture_count());

    Ok(Session {
        store: assets.store,
        cache,
    })
}

fn lump_by_name(store: &MemoryAssetStore, name: &str) -> Result<LumpNum> {
    store
        .lump_num(name)
        .ok_or_else(|| anyhow!("Lump {} not found in manifest", name))
}

/// Write whatever the cache last bound to the driver as a PNG.
fn save_active(session: &Session, output: &Path) -> Result<()> {
    let recorded = session
        .cache
        .driver()
        .active_texture()
        .context("Nothing was uploaded (empty or degenerate image)")?;

    let image = to_rgba(recorded, session.cache.palette(), session.cache.config().chroma_key_index);
    image
        .save(output)
        .with_context(|| format!("Failed to write image: {}", output.display()))?;

    println!(
        "  {}x{} {:?} [{:?}] -> {}",
        recorded.width,
        recorded.height,
        recorded.format,
        recorded.flags,
        output.display()
    );
    Ok(())
}

pub fn render_texture(manifest: &Path, config: Option<&Path>, name: &str, output: &Path) -> Result<()> {
    println!("Rendering texture {}", name);
    let mut session = open_session(manifest, config)?;

    let texture_num = session
        .store
        .texture_num(name)
        .ok_or_else(|| anyhow!("Texture {} not found in manifest", name))?;
    let texture = session
        .cache
        .get_texture(&session.store, texture_num)
        .with_context(|| format!("Failed to generate texture {}", name))?;
    println!("  Scale: {} x {}", texture.scale_x, texture.scale_y);

    save_active(&session, output)
}

pub fn render_patch(
    manifest: &Path,
    config: Option<&Path>,
    lump_name: &str,
    colormap: Option<&Path>,
    output: &Path,
) -> Result<()> {
    println!("Rendering patch {}", lump_name);
    let mut session = open_session(manifest, config)?;
    let lump = lump_by_name(&session.store, lump_name)?;

    let table = match colormap {
        Some(path) => {
            let data = fs::read(path)
                .with_context(|| format!("Failed to read colormap: {}", path.display()))?;
            let table: [u8; PALETTE_SIZE] = data
                .get(..PALETTE_SIZE)
                .and_then(|bytes| bytes.try_into().ok())
                .ok_or_else(|| anyhow!("Colormap {} is shorter than {} bytes", path.display(), PALETTE_SIZE))?;
            Some(table)
        }
        None => None,
    };

    let colormap_ref = table.as_ref().map(|table| ColormapRef::new(ColormapId(1), table));
    let info = session
        .cache
        .get_mapped_patch(&session.store, lump, colormap_ref)
        .with_context(|| format!("Failed to generate patch {}", lump_name))?;
    println!(
        "  Patch: {}x{} offset ({}, {}), coverage {:.3} x {:.3}",
        info.width, info.height, info.left_offset, info.top_offset, info.max_s, info.max_t
    );

    save_active(&session, output)
}

pub fn render_fademask(manifest: &Path, config: Option<&Path>, lump_name: &str, output: &Path) -> Result<()> {
    println!("Rendering fade mask {}", lump_name);
    let mut session = open_session(manifest, config)?;
    let lump = lump_by_name(&session.store, lump_name)?;

    session
        .cache
        .get_fade_mask(&session.store, lump)
        .with_context(|| format!("Failed to generate fade mask {}", lump_name))?;

    save_active(&session, output)
}

/// Generate every texture in the manifest and report cache activity.
pub fn show_stats(manifest: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let mut session = open_session(manifest, config)?;
    let count = session.store.texture_count();

    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?,
    );

    let mut failed = 0usize;
    for texture_num in 0..count {
        if let Some(texture) = session.store.texture(texture_num) {
            pb.set_message(texture.name.clone());
        }
        if let Err(e) = session.cache.get_texture(&session.store, texture_num) {
            log::warn!("Texture {} failed: {}", texture_num, e);
            failed += 1;
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let stats = session.cache.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Textures: {} ({} failed)", count, failed);
    println!("  {}", stats);
    let pool = session.cache.pool();
    println!("  Pool: {} bytes in {} buffers", pool.bytes_in_use(), pool.live_count());
    for tag in [PoolTag::Static, PoolTag::Cache, PoolTag::CacheUnlocked] {
        let (count, bytes) = pool
            .iter_tags(tag..=tag)
            .fold((0usize, 0usize), |(count, bytes), (_, _, size)| (count + 1, bytes + size));
        if count > 0 {
            println!("    {:?}: {} bytes in {} buffers", tag, bytes, count);
        }
    }
    println!("  Resident on GPU: {}", session.cache.driver().texture_count());

    let reclaimed = session.cache.purge_reclaimable();
    println!("  Reclaimable: {} buffers", reclaimed);
    Ok(())
}
