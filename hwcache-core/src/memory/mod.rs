pub mod pool;

pub use pool::{BufferHandle, PoolTag, TaggedPool};
