// Asset manifest: lumps, palette and texture definitions on disk
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use hwcache_core::asset::{is_legacy_sky_name, LumpNum, MemoryAssetStore, PatchFlip, Texture, TextureKind, TexturePatch};
use hwcache_core::{BlendStyle, Palette};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Raw palette lump (768 bytes of RGB); grayscale if absent.
    pub palette: Option<PathBuf>,
    /// Cache settings file.
    pub config: Option<PathBuf>,
    #[serde(default)]
    pub lumps: Vec<ManifestLump>,
    #[serde(default)]
    pub textures: Vec<ManifestTexture>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestLump {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ManifestTexture {
    pub name: String,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub kind: TextureKind,
    /// Overrides the naming convention when present.
    pub sky: Option<bool>,
    #[serde(default)]
    pub patches: Vec<ManifestPatch>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestPatch {
    pub lump: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub flip: PatchFlip,
    #[serde(default)]
    pub style: BlendStyle,
    pub alpha: Option<u8>,
}

/// Everything loaded from a manifest.
#[derive(Debug)]
pub struct Assets {
    pub store: MemoryAssetStore,
    pub palette: Palette,
    pub config: Option<PathBuf>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        Ok(manifest)
    }

    /// Read every referenced file, resolving paths against `base`.
    pub fn into_assets(self, base: &Path) -> Result<Assets> {
        let mut store = MemoryAssetStore::new();
        let mut numbers: HashMap<String, LumpNum> = HashMap::new();

        for lump in &self.lumps {
            let path = base.join(&lump.path);
            let data = fs::read(&path).with_context(|| format!("Failed to read lump {}: {}", lump.name, path.display()))?;
            let num = store.add_lump(lump.name.clone(), data);
            numbers.insert(lump.name.to_ascii_uppercase(), num);
        }
        log::debug!("Loaded {} lumps", numbers.len());

        for texture in self.textures {
            let max = i16::MAX as i32;
            if !(0..=max).contains(&texture.width) || !(0..=max).contains(&texture.height) {
                bail!(
                    "Texture {} has size {}x{}, limit is {}",
                    texture.name,
                    texture.width,
                    texture.height,
                    max
                );
            }

            let patches = texture
                .patches
                .iter()
                .map(|patch| {
                    let lump = *numbers
                        .get(&patch.lump.to_ascii_uppercase())
                        .ok_or_else(|| anyhow!("Texture {} uses unknown lump {}", texture.name, patch.lump))?;
                    Ok(TexturePatch::new(lump, patch.x, patch.y)
                        .with_flip(patch.flip)
                        .with_blend(patch.style, patch.alpha.unwrap_or(0xFF)))
                })
                .collect::<Result<Vec<_>>>()?;

            let sky = texture.sky.unwrap_or_else(|| is_legacy_sky_name(&texture.name));
            let mut definition = Texture::new(texture.name, texture.width, texture.height, texture.kind, patches);
            definition.sky = sky;
            store.add_texture(definition);
        }

        let palette = match &self.palette {
            Some(path) => {
                let path = base.join(path);
                let data = fs::read(&path).with_context(|| format!("Failed to read palette: {}", path.display()))?;
                Palette::from_playpal(&data).ok_or_else(|| anyhow!("Palette {} is too short", path.display()))?
            }
            None => Palette::grayscale(),
        };

        Ok(Assets {
            store,
            palette,
            config: self.config.map(|path| base.join(path)),
        })
    }
}
