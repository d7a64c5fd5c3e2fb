// Cache settings persistence
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::texture::TextureFormat;

/// Process-wide cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Output format of sprites and other single patches.
    pub patch_format: TextureFormat,
    /// Output format of composite wall textures.
    pub texture_format: TextureFormat,
    /// Palette index treated as transparent.
    pub chroma_key_index: u8,
    /// Soft byte limit for the pixel buffer pool.
    pub memory_budget: Option<usize>,
    /// Rescale fade masks to the power-of-two bound of their native size.
    pub fademask_power_of_two: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            patch_format: TextureFormat::PaletteAlpha88,
            texture_format: TextureFormat::Palette8,
            chroma_key_index: 0xFF,
            memory_budget: None,
            fademask_power_of_two: true,
        }
    }
}

impl CacheConfig {
    /// `true` if either output format bakes palette colors into its pixels.
    pub fn uses_truecolor(&self) -> bool {
        self.patch_format.is_truecolor() || self.texture_format.is_truecolor()
    }

    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: CacheConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            log::debug!("No cache config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
