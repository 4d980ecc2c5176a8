use std::io;

use crate::alloc::{AllocPolicy, HeapAlloc};
use crate::iter::{Direction, Iter, Order};
use crate::node::NodeRef;
use crate::tree::PatriciaMap;
use crate::types::errors::StoreError;

//------------ PatriciaSet ---------------------------------------------------

/// A set of bit-string keys: a [`PatriciaMap`] without payloads.
///
/// Every operation is a thin re-expression of the map operation; see
/// [`PatriciaMap`] for the semantics.
#[derive(Debug)]
pub struct PatriciaSet<A: AllocPolicy = HeapAlloc> {
    map: PatriciaMap<(), A>,
}

impl PatriciaSet<HeapAlloc> {
    /// Creates an empty set with the default heap policy.
    pub fn new() -> Self {
        PatriciaSet {
            map: PatriciaMap::new(),
        }
    }
}

impl Default for PatriciaSet<HeapAlloc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: AllocPolicy> PatriciaSet<A> {
    /// Creates an empty set drawing key storage from `alloc`.
    pub fn with_policy(alloc: A) -> Self {
        PatriciaSet {
            map: PatriciaMap::with_policy(alloc),
        }
    }

    /// Inserts a key, returning its node and whether it was newly added.
    pub fn insert(
        &mut self,
        key: &[u8],
        nbit: u16,
    ) -> Result<(NodeRef, bool), StoreError> {
        self.map.insert(key, nbit, ())
    }

    /// Whether the exact key is in the set.
    pub fn contains(&self, key: &[u8], nbit: u16) -> bool {
        self.map.exact_match(key, nbit).is_some()
    }

    /// Looks up a key, returning its node on an exact match.
    pub fn exact_match(&self, key: &[u8], nbit: u16) -> Option<NodeRef> {
        self.map.exact_match(key, nbit)
    }

    /// Returns the node holding the longest stored key that is a bit-exact
    /// prefix of the given key and lies on its descent path.
    pub fn longest_match(&self, key: &[u8], nbit: u16) -> Option<NodeRef> {
        self.map.longest_match(key, nbit)
    }

    /// Removes a key, reporting whether it was resident.
    pub fn remove(&mut self, key: &[u8], nbit: u16) -> bool {
        self.map.remove(key, nbit).is_some()
    }

    /// Removes the given node from the set.
    pub fn evict(&mut self, node: NodeRef) -> Result<(), StoreError> {
        self.map.evict(node).map(|()| ())
    }

    /// Keeps only the keys for which `pred` returns `true`.
    pub fn retain<F: FnMut(&[u8], u16) -> bool>(&mut self, mut pred: F) {
        self.map.retain(|key, nbit, _| pred(key, nbit));
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// The key bytes of a resident node.
    pub fn key(&self, node: NodeRef) -> &[u8] {
        self.map.key(node)
    }

    /// The key length of a resident node, in bits.
    pub fn key_bits(&self, node: NodeRef) -> u16 {
        self.map.key_bits(node)
    }

    /// The branch bit position of a resident node.
    pub fn branch_bit(&self, node: NodeRef) -> u32 {
        self.map.branch_bit(node)
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the whole set in key order.
    pub fn iter(&self) -> Iter<'_, (), A> {
        self.map.iter()
    }

    /// Iterates in the given order and direction, over the whole set or one
    /// subtree.
    pub fn iter_with(
        &self,
        root: Option<NodeRef>,
        dir: Direction,
        order: Order,
    ) -> Iter<'_, (), A> {
        self.map.iter_with(root, dir, order)
    }

    /// Writes an indented dump of the tree.
    pub fn write_text<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        self.map.write_text(w)
    }

    /// Writes the tree as a GraphViz digraph.
    pub fn write_dot<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        self.map.write_dot(w)
    }

    /// Writes the tree as a GraphViz digraph with a custom label callback.
    pub fn write_dot_with<W, F>(&self, w: &mut W, label: F) -> io::Result<()>
    where
        W: io::Write,
        F: FnMut(NodeRef) -> String,
    {
        self.map.write_dot_with(w, label)
    }

    #[doc(hidden)]
    pub fn check_invariants(&self) {
        self.map.check_invariants();
    }
}
