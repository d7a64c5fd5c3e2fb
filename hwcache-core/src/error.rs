//! Error Handling
//!
//! Typed errors for the texture cache using `thiserror`.
//!
//! # Error Categories
//! - **Lookup errors**: unknown lumps or texture numbers
//! - **Decode errors**: malformed patch lumps, PNG decode failures
//! - **Configuration errors**: config file I/O and parse failures
//!
//! Content problems that the renderer can survive (a fade mask of the wrong
//! size, a sub-patch outside its canvas) are not errors; they are logged and
//! skipped by the generators.

use thiserror::Error;

use crate::asset::LumpNum;

/// Texture cache error types.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The asset store has no lump with this number.
    #[error("Lump {0} not found in asset store")]
    LumpNotFound(LumpNum),

    /// A texture number outside the loaded map texture tables.
    ///
    /// Occurs when a texture is requested before `load_map_textures` sized the
    /// tables, or with a number past the asset store's texture count.
    #[error("Texture {index} out of range (loaded: {loaded})")]
    TextureOutOfRange { index: usize, loaded: usize },

    /// A patch lump whose header or column offsets do not fit its length.
    #[error("Malformed patch in lump {lump}: {message}")]
    MalformedPatch { lump: LumpNum, message: String },

    /// An embedded PNG that the image decoder rejected.
    #[error("PNG decode error in lump {lump}: {source}")]
    Png {
        lump: LumpNum,
        #[source]
        source: image::ImageError,
    },

    /// Config file could not be read or written.
    #[error("Config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Config file contents are not valid JSON for [`crate::CacheConfig`].
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl CacheError {
    /// Create a malformed patch error with context.
    pub fn malformed(lump: LumpNum, message: impl Into<String>) -> Self {
        Self::MalformedPatch {
            lump,
            message: message.into(),
        }
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
