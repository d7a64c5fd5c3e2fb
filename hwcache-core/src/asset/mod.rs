pub mod patch;
pub mod store;
pub mod texture;

/// Numeric handle of a lump in the asset store.
pub type LumpNum = u32;

pub use patch::{is_png, Column, Patch, Post};
pub use store::{AssetStore, MemoryAssetStore, PatchCache, Residency};
pub use texture::{is_legacy_sky_name, PatchFlip, Texture, TextureKind, TexturePatch};
