use crate::alloc::{AllocPolicy, KeySlot};

//------------ BumpAlloc -----------------------------------------------------

/// A bump-allocating key arena with a hard byte limit.
///
/// This serves the incremental-fill, batch-destroy pattern: keys are handed
/// out from one growing region, [`free`] is a no-op, and the whole region
/// goes away in a single step on [`teardown`]. Evicted keys therefore stay
/// resident until the owning tree is cleared, which is the price of never
/// paying for individual deallocation.
///
/// `limit` caps the total key bytes ever handed out; once reached, further
/// allocations fail and the tree surfaces that as
/// [`StoreError::ArenaExhausted`]. The region grows by at least `blksize`
/// bytes at a time.
///
/// [`free`]: AllocPolicy::free
/// [`teardown`]: AllocPolicy::teardown
/// [`StoreError::ArenaExhausted`]: crate::types::errors::StoreError
#[derive(Debug)]
pub struct BumpAlloc {
    pool: Vec<u8>,
    blks: usize,
    limit: usize,
}

impl BumpAlloc {
    /// Creates an arena growing in steps of `blksize` bytes, refusing to
    /// hold more than `limit` bytes of key data.
    pub fn new(blksize: usize, limit: usize) -> Self {
        BumpAlloc {
            pool: Vec::new(),
            blks: blksize.max(1),
            limit,
        }
    }

    /// Key bytes currently in use.
    pub fn used(&self) -> usize {
        self.pool.len()
    }

    /// The configured hard cap on key bytes.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes reserved from the system, used or not.
    pub fn reserved(&self) -> usize {
        self.pool.capacity()
    }
}

impl AllocPolicy for BumpAlloc {
    fn alloc(&mut self, key: &[u8]) -> Option<KeySlot> {
        if self.pool.len() + key.len() > self.limit {
            return None;
        }
        if self.pool.len() + key.len() > self.pool.capacity() {
            self.pool.reserve(key.len().max(self.blks));
        }
        let off = u32::try_from(self.pool.len()).ok()?;
        let len = u32::try_from(key.len()).ok()?;
        self.pool.extend_from_slice(key);
        Some(KeySlot { off, len })
    }

    fn get(&self, slot: KeySlot) -> &[u8] {
        &self.pool[slot.off as usize..(slot.off + slot.len) as usize]
    }

    // free: inherited no-op; the region is released wholesale.

    fn teardown(&mut self) {
        self.pool = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_stable_offsets() {
        let mut arena = BumpAlloc::new(64, 1024);
        let a = arena.alloc(b"one").unwrap();
        let b = arena.alloc(b"twotwo").unwrap();
        assert_eq!(arena.get(a), b"one");
        assert_eq!(arena.get(b), b"twotwo");
        assert_eq!(arena.used(), 9);
    }

    #[test]
    fn respects_the_limit() {
        let mut arena = BumpAlloc::new(8, 10);
        assert!(arena.alloc(b"aaaa").is_some());
        assert!(arena.alloc(b"bbbb").is_some());
        assert!(arena.alloc(b"ccc").is_none());
        assert!(arena.alloc(b"cc").is_some());
        assert_eq!(arena.used(), 10);
        assert!(arena.alloc(b"x").is_none());
    }

    #[test]
    fn teardown_releases_everything() {
        let mut arena = BumpAlloc::new(16, 64);
        let a = arena.alloc(b"gone").unwrap();
        arena.free(a); // no-op by design
        assert_eq!(arena.used(), 4);
        arena.teardown();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.reserved(), 0);
        assert!(arena.alloc(b"fresh").is_some());
    }
}
