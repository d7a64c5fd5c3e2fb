//! Tagged System-Memory Pool
//!
//! Pixel buffers live here rather than inside the mipmaps that use them. Every
//! allocation carries a lifetime tag, and a whole tag class can be released at
//! once (level unload, palette change, memory pressure).
//!
//! # Weak Handles
//! Owners hold a [`BufferHandle`], not the buffer. A handle is an index plus a
//! generation; freeing a buffer bumps its slot's generation, so every handle
//! to it goes stale at once. Owners must resolve the handle through
//! [`TaggedPool::get`] / [`TaggedPool::get_mut`] on each use and treat `None`
//! as "purged".

use std::ops::RangeInclusive;

/// Lifetime class of an allocation.
///
/// Ordered so tag ranges can be walked with [`TaggedPool::iter_tags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolTag {
    /// Never released by a bulk purge.
    Static,
    /// Buffer in active use by a generator or not yet uploaded.
    Cache,
    /// Uploaded buffer that may be reclaimed at any time.
    CacheUnlocked,
}

impl PoolTag {
    pub fn is_reclaimable(&self) -> bool {
        matches!(self, Self::CacheUnlocked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Allocation {
    data: Vec<u8>,
    tag: PoolTag,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    allocation: Option<Allocation>,
}

/// Tagged allocator for pixel buffers.
#[derive(Debug, Default)]
pub struct TaggedPool {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    bytes_in_use: usize,
    /// Soft limit; reclaimable buffers are purged before exceeding it.
    budget: Option<usize>,
}

impl TaggedPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(budget: Option<usize>) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn set_budget(&mut self, budget: Option<usize>) {
        self.budget = budget;
    }

    /// Allocate a zeroed buffer of `size` bytes.
    ///
    /// If the allocation would exceed the budget, every reclaimable buffer is
    /// released first. The allocation itself always succeeds.
    pub fn alloc(&mut self, size: usize, tag: PoolTag) -> BufferHandle {
        if let Some(budget) = self.budget {
            if self.bytes_in_use + size > budget {
                let freed = self.free_tag(PoolTag::CacheUnlocked);
                log::debug!(
                    "Pool over budget ({} + {} > {}), purged {} reclaimable buffers",
                    self.bytes_in_use,
                    size,
                    budget,
                    freed
                );
            }
        }

        let allocation = Allocation {
            data: vec![0u8; size],
            tag,
        };
        self.bytes_in_use += size;

        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.allocation = Some(allocation);
            BufferHandle {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                allocation: Some(allocation),
            });
            BufferHandle {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    fn allocation(&self, handle: BufferHandle) -> Option<&Allocation> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.allocation.as_ref()
    }

    fn allocation_mut(&mut self, handle: BufferHandle) -> Option<&mut Allocation> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.allocation.as_mut()
    }

    #[inline]
    pub fn get(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.allocation(handle).map(|a| a.data.as_slice())
    }

    #[inline]
    pub fn get_mut(&mut self, handle: BufferHandle) -> Option<&mut [u8]> {
        self.allocation_mut(handle).map(|a| a.data.as_mut_slice())
    }

    pub fn is_live(&self, handle: BufferHandle) -> bool {
        self.allocation(handle).is_some()
    }

    pub fn tag(&self, handle: BufferHandle) -> Option<PoolTag> {
        self.allocation(handle).map(|a| a.tag)
    }

    /// Reclassify a live buffer. Returns `false` for a stale handle.
    pub fn change_tag(&mut self, handle: BufferHandle, tag: PoolTag) -> bool {
        match self.allocation_mut(handle) {
            Some(allocation) => {
                allocation.tag = tag;
                true
            }
            None => false,
        }
    }

    fn release(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        if let Some(allocation) = slot.allocation.take() {
            self.bytes_in_use -= allocation.data.len();
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(index);
        }
    }

    /// Free one buffer. Returns `false` if the handle was already stale.
    pub fn free(&mut self, handle: BufferHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        self.release(handle.index);
        true
    }

    /// Free every buffer carrying `tag`. Returns the number released.
    pub fn free_tag(&mut self, tag: PoolTag) -> usize {
        let doomed: Vec<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.allocation.as_ref().is_some_and(|a| a.tag == tag))
            .map(|(i, _)| i as u32)
            .collect();

        for &index in &doomed {
            self.release(index);
        }
        doomed.len()
    }

    /// Visit every live allocation whose tag falls in `tags`.
    pub fn iter_tags(&self, tags: RangeInclusive<PoolTag>) -> impl Iterator<Item = (BufferHandle, PoolTag, usize)> + '_ {
        self.slots.iter().enumerate().filter_map(move |(i, slot)| {
            let allocation = slot.allocation.as_ref()?;
            tags.contains(&allocation.tag).then_some((
                BufferHandle {
                    index: i as u32,
                    generation: slot.generation,
                },
                allocation.tag,
                allocation.data.len(),
            ))
        })
    }

    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.allocation.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed_and_accounted() {
        let mut pool = TaggedPool::new();
        let handle = pool.alloc(16, PoolTag::Cache);
        assert_eq!(pool.get(handle).unwrap(), &[0u8; 16]);
        assert_eq!(pool.bytes_in_use(), 16);
    }

    #[test]
    fn test_free_invalidates_handle() {
        let mut pool = TaggedPool::new();
        let handle = pool.alloc(4, PoolTag::Cache);
        assert!(pool.free(handle));
        assert!(pool.get(handle).is_none());
        assert!(!pool.free(handle));
        assert_eq!(pool.bytes_in_use(), 0);
    }

    #[test]
    fn test_reused_slot_does_not_revive_old_handle() {
        let mut pool = TaggedPool::new();
        let old = pool.alloc(4, PoolTag::Cache);
        pool.free(old);
        let new = pool.alloc(8, PoolTag::Cache);
        assert!(pool.get(old).is_none());
        assert_eq!(pool.get(new).unwrap().len(), 8);
    }

    #[test]
    fn test_free_tag_only_touches_that_tag() {
        let mut pool = TaggedPool::new();
        let locked = pool.alloc(4, PoolTag::Cache);
        let unlocked = pool.alloc(4, PoolTag::Cache);
        assert!(pool.change_tag(unlocked, PoolTag::CacheUnlocked));

        assert_eq!(pool.free_tag(PoolTag::CacheUnlocked), 1);
        assert!(pool.is_live(locked));
        assert!(!pool.is_live(unlocked));
        assert!(!pool.change_tag(unlocked, PoolTag::Cache));
    }

    #[test]
    fn test_budget_purges_reclaimable_first() {
        let mut pool = TaggedPool::with_budget(Some(10));
        let reclaimable = pool.alloc(8, PoolTag::CacheUnlocked);
        let locked = pool.alloc(2, PoolTag::Cache);
        let fresh = pool.alloc(4, PoolTag::Cache);

        assert!(!pool.is_live(reclaimable));
        assert!(pool.is_live(locked));
        assert!(pool.is_live(fresh));
        assert_eq!(pool.bytes_in_use(), 6);
    }

    #[test]
    fn test_iter_tags_walks_range() {
        let mut pool = TaggedPool::new();
        pool.alloc(1, PoolTag::Static);
        pool.alloc(2, PoolTag::Cache);
        pool.alloc(3, PoolTag::CacheUnlocked);

        let sizes: Vec<usize> = pool
            .iter_tags(PoolTag::Cache..=PoolTag::CacheUnlocked)
            .map(|(_, _, size)| size)
            .collect();
        assert_eq!(sizes, vec![2, 3]);
    }
}
