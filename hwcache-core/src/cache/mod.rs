pub mod context;
pub mod entry;
pub mod mipmap;
pub mod stats;

pub use context::{colormap_id_of, TextureCache};
pub use entry::{ColormapId, ColormapRef, MapTexture, PatchCategory, PatchEntry};
pub use mipmap::{Mipmap, MipmapFlags, MipmapState};
pub use stats::CacheStats;

pub use crate::texture::PatchInfo;
