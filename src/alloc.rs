//------------ AllocPolicy ---------------------------------------------------

/// Storage policy for the key bytes carried by tree nodes.
///
/// Key storage can be customised per tree. The triplet of hooks permits
/// implementation of different strategies:
///
/// - integration with the global allocator (the default, [`HeapAlloc`]);
/// - a dedicated arena for the keys of one tree ([`BumpAlloc`]);
/// - incremental-build / batch-destroy patterns, where [`free`] defers all
///   work to [`teardown`].
///
/// [`alloc`] copies a key into policy-owned storage and hands back a
/// [`KeySlot`]; `None` means the policy is exhausted, and the insert that
/// asked is abandoned with the tree unchanged. [`free`] releases a single
/// key and may be left a no-op. [`teardown`] runs once per tree
/// finalisation and is the place for deferred bulk release.
///
/// [`alloc`]: AllocPolicy::alloc
/// [`free`]: AllocPolicy::free
/// [`teardown`]: AllocPolicy::teardown
/// [`BumpAlloc`]: crate::bump::BumpAlloc
pub trait AllocPolicy {
    /// Copies `key` into policy-owned storage and returns its slot, or
    /// `None` when out of storage.
    fn alloc(&mut self, key: &[u8]) -> Option<KeySlot>;

    /// Resolves a slot to the stored bytes.
    fn get(&self, slot: KeySlot) -> &[u8];

    /// Releases a single slot. The default does nothing.
    fn free(&mut self, slot: KeySlot) {
        let _ = slot;
    }

    /// Releases everything at once. The default does nothing.
    fn teardown(&mut self) {}
}

//------------ KeySlot -------------------------------------------------------

/// A handle to policy-owned key bytes: an offset whose meaning is private
/// to the policy, and the byte length.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeySlot {
    pub off: u32,
    pub len: u32,
}

//------------ HeapAlloc -----------------------------------------------------

/// The default policy: every key in its own heap buffer, freed entries
/// recycled through a free list.
#[derive(Debug, Default)]
pub struct HeapAlloc {
    bufs: Vec<Option<Box<[u8]>>>,
    free: Vec<u32>,
}

impl AllocPolicy for HeapAlloc {
    fn alloc(&mut self, key: &[u8]) -> Option<KeySlot> {
        let len = u32::try_from(key.len()).ok()?;
        let off = match self.free.pop() {
            Some(off) => {
                self.bufs[off as usize] = Some(key.into());
                off
            }
            None => {
                let off = u32::try_from(self.bufs.len()).ok()?;
                self.bufs.push(Some(key.into()));
                off
            }
        };
        Some(KeySlot { off, len })
    }

    fn get(&self, slot: KeySlot) -> &[u8] {
        self.bufs[slot.off as usize].as_deref().unwrap_or(&[])
    }

    fn free(&mut self, slot: KeySlot) {
        self.bufs[slot.off as usize] = None;
        self.free.push(slot.off);
    }

    fn teardown(&mut self) {
        self.bufs.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_alloc_round_trip() {
        let mut heap = HeapAlloc::default();
        let a = heap.alloc(b"abc").unwrap();
        let b = heap.alloc(b"defg").unwrap();
        assert_eq!(heap.get(a), b"abc");
        assert_eq!(heap.get(b), b"defg");

        heap.free(a);
        let c = heap.alloc(b"xy").unwrap();
        // the freed buffer index is recycled
        assert_eq!(c.off, a.off);
        assert_eq!(heap.get(c), b"xy");
        assert_eq!(heap.get(b), b"defg");
    }
}
