use crate::alloc::KeySlot;

//------------ NodeIdx -------------------------------------------------------

// The index of a node in a tree's slab, used wherever the original design
// would hold a node address. The root sentinel owns index 0 and lives
// outside the slab; slab entry `i` is node index `i + 1`. A child slot
// holding the node's own index is the self-link.

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeIdx(u32);

impl NodeIdx {
    pub(crate) const SENTINEL: NodeIdx = NodeIdx(0);

    pub(crate) fn is_sentinel(self) -> bool {
        self.0 == 0
    }

    fn slab(self) -> usize {
        (self.0 - 1) as usize
    }
}

//------------ NodeRef -------------------------------------------------------

/// A reference to a node resident in a tree.
///
/// A `NodeRef` is a plain copyable handle; it does not borrow the tree.
/// Removing a key invalidates the handle of the removed node *and* the
/// handle of one surviving node, which may be moved into the removed node's
/// topological position. Handles of removed nodes may later be reissued for
/// new keys. Using a stale handle with the accessor methods therefore
/// either panics or observes some other resident node; it is never undefined
/// behaviour.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeRef(pub(crate) NodeIdx);

//------------ Node ----------------------------------------------------------

// The dual-use node: branch point and key holder in one record. `child`
// holds one downlink and one uplink (possibly the self-link); which is
// which is recovered from the bpos inequality, never stored. The key bytes
// live with the allocation policy and are addressed through `key`.
//
// `bpos` is the 1-based branching bit position. It is a u32 because the
// first-difference index of two maximal keys is 65536, one past u16.
#[derive(Debug)]
pub(crate) struct Node<P> {
    pub(crate) child: [NodeIdx; 2],
    pub(crate) bpos: u32,
    pub(crate) nbit: u16,
    pub(crate) key: KeySlot,
    pub(crate) payload: P,
}

//------------ Slab ----------------------------------------------------------

// Fixed-size node records, recycled through an intrusive free list. Only
// the variable-sized key bytes go through the allocation policy; the
// records themselves are cheap to pool here and keep every NodeIdx stable
// for the lifetime of its node.

#[derive(Debug)]
pub(crate) enum Slot<P> {
    Vacant { next_free: Option<NodeIdx> },
    Occupied(Node<P>),
}

#[derive(Debug)]
pub(crate) struct Slab<P> {
    slots: Vec<Slot<P>>,
    free_head: Option<NodeIdx>,
}

impl<P> Slab<P> {
    pub(crate) fn new() -> Self {
        Slab {
            slots: Vec::new(),
            free_head: None,
        }
    }

    pub(crate) fn insert(&mut self, node: Node<P>) -> NodeIdx {
        match self.free_head {
            Some(idx) => {
                let slot = &mut self.slots[idx.slab()];
                self.free_head = match *slot {
                    Slot::Vacant { next_free } => next_free,
                    Slot::Occupied(_) => {
                        panic!("free list entry {:?} is occupied", idx)
                    }
                };
                *slot = Slot::Occupied(node);
                idx
            }
            None => {
                let idx = NodeIdx(self.slots.len() as u32 + 1);
                self.slots.push(Slot::Occupied(node));
                idx
            }
        }
    }

    pub(crate) fn remove(&mut self, idx: NodeIdx) -> Node<P> {
        let slot = std::mem::replace(
            &mut self.slots[idx.slab()],
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        match slot {
            Slot::Occupied(node) => {
                self.free_head = Some(idx);
                node
            }
            Slot::Vacant { .. } => {
                panic!("removing vacant slab entry {:?}", idx)
            }
        }
    }

    pub(crate) fn get(&self, idx: NodeIdx) -> Option<&Node<P>> {
        if idx.is_sentinel() {
            return None;
        }
        match self.slots.get(idx.slab()) {
            Some(Slot::Occupied(node)) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, idx: NodeIdx) -> Option<&mut Node<P>> {
        if idx.is_sentinel() {
            return None;
        }
        match self.slots.get_mut(idx.slab()) {
            Some(Slot::Occupied(node)) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.slots.clear();
        self.free_head = None;
    }

    // Occupied entries, counted the slow way; only invariant checking needs
    // this.
    pub(crate) fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(_)))
            .count()
    }
}
