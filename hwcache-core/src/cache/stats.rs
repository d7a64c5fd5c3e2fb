// Cache activity counters
use serde::Serialize;
use std::fmt;

/// Running totals of cache work since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Generator runs (first builds and regenerations).
    pub generations: u64,
    /// New GPU textures created.
    pub uploads: u64,
    /// Existing GPU textures refreshed in place.
    pub updates: u64,
    /// GPU textures deleted individually.
    pub deletes: u64,
    /// Buffers released by bulk purges.
    pub purges: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generations: {}, uploads: {}, updates: {}, deletes: {}, purges: {}",
            self.generations, self.uploads, self.updates, self.deletes, self.purges
        )
    }
}
