pub mod blend;
pub mod block;
pub mod column;
pub mod fademask;
pub mod formats;
pub mod generator;
pub mod palette;

pub use blend::{blend_palette_indexes, blend_pixel, BlendStyle};
pub use block::make_block;
pub use fademask::{cache_fademask, draw_fademask, fademask_dimensions};
pub use formats::TextureFormat;
pub use generator::{GenerateParams, PatchInfo};
pub use palette::{Palette, PALETTE_SIZE};
