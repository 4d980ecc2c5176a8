use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::alloc::{AllocPolicy, HeapAlloc};
use crate::iter::{Direction, Iter, Order, Walk};
use crate::node::{Node, NodeIdx, NodeRef, Slab};
use crate::types::bits::{bitdiff, equkey, getbit};
use crate::types::errors::StoreError;
use crate::types::key_bytes;

//------------ PatriciaMap ---------------------------------------------------

// The tree uses a compact "dual-use" node representation: every node is both
// an internal routing node and a terminal key holder, so no separate node
// kinds exist. No parent pointers are stored either. Each node carries two
// child slots, and the invariant that every node is referenced by exactly
// two slots - one downlink from a node with a smaller branch bit, one uplink
// from a descendant or from itself - is enough to reconstruct the topology:
// an edge x -> y is a downlink iff y branches on a later bit than x.
//
// Eviction leans on this invariant the hardest. A node to be removed is
// guaranteed to have exactly one remaining descendant branch and exactly one
// parent-side reference, and comparing child slots against node indices
// (`child[i] == x`) pinpoints the slots to rewire without ever testing a key
// bit. Two slot rewrites splice any node out; the self-linked leaf falls
// out of the same comparison.
//
// The layout is the arena-index form of that design: nodes live in a slab,
// child slots are indices, and the self-link is a slot holding the node's
// own index. The synthetic root sentinel is index 0 and sits outside the
// slab; its child[0] holds the top of the real tree (or index 0 itself when
// the tree is empty) and its bpos reads as 0.

/// A mutable map keyed by arbitrary bit strings, stored as a PATRICIA tree.
///
/// Keys are sequences of up to 65535 bits, handed in as a byte buffer plus
/// a bit length; the buffer must hold at least `⌈nbit/8⌉` bytes and bits of
/// the final byte past the counted length are ignored. Lookup is available
/// as an exact match and as a longest-prefix match, and iteration walks the
/// downlink tree in any of the three classic orders, in both directions.
///
/// The payload type `P` is free; a tree without payloads is
/// [`PatriciaSet`](crate::set::PatriciaSet). Key storage goes through an
/// exchangeable [`AllocPolicy`].
///
/// Methods taking a [`NodeRef`] panic when handed a handle that is no
/// longer resident; see [`NodeRef`] for the invalidation rules.
#[derive(Debug)]
pub struct PatriciaMap<P, A: AllocPolicy = HeapAlloc> {
    slab: Slab<P>,
    // child[0]: top of the real tree; child[1]: reserved self-back-pointer
    sentinel: [NodeIdx; 2],
    alloc: A,
    len: usize,
}

impl<P> PatriciaMap<P, HeapAlloc> {
    /// Creates an empty map with the default heap policy.
    pub fn new() -> Self {
        Self::with_policy(HeapAlloc::default())
    }
}

impl<P> Default for PatriciaMap<P, HeapAlloc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, A: AllocPolicy> PatriciaMap<P, A> {
    /// Creates an empty map drawing key storage from `alloc`.
    pub fn with_policy(alloc: A) -> Self {
        PatriciaMap {
            slab: Slab::new(),
            sentinel: [NodeIdx::SENTINEL; 2],
            alloc,
            len: 0,
        }
    }

    //--- Node plumbing ------------------------------------------------------

    fn node(&self, n: NodeIdx) -> &Node<P> {
        match self.slab.get(n) {
            Some(node) => node,
            None => panic!("node reference is not resident in this tree"),
        }
    }

    fn node_mut(&mut self, n: NodeIdx) -> &mut Node<P> {
        match self.slab.get_mut(n) {
            Some(node) => node,
            None => panic!("node reference is not resident in this tree"),
        }
    }

    pub(crate) fn child(&self, n: NodeIdx, side: usize) -> NodeIdx {
        if n.is_sentinel() {
            self.sentinel[side]
        } else {
            self.node(n).child[side]
        }
    }

    fn set_child(&mut self, n: NodeIdx, side: usize, to: NodeIdx) {
        if n.is_sentinel() {
            self.sentinel[side] = to;
        } else {
            self.node_mut(n).child[side] = to;
        }
    }

    pub(crate) fn bpos(&self, n: NodeIdx) -> u32 {
        if n.is_sentinel() {
            0
        } else {
            self.node(n).bpos
        }
    }

    pub(crate) fn keybits(&self, n: NodeIdx) -> (&[u8], u16) {
        if n.is_sentinel() {
            (&[], 0)
        } else {
            let node = self.node(n);
            (self.alloc.get(node.key), node.nbit)
        }
    }

    pub(crate) fn live(&self, n: NodeIdx) -> bool {
        self.slab.get(n).is_some()
    }

    pub(crate) fn top_idx(&self) -> Option<NodeIdx> {
        let top = self.sentinel[0];
        (!top.is_sentinel()).then_some(top)
    }

    //--- Search -------------------------------------------------------------

    // Bit-guided descent: at every node follow the child selected by the
    // key's bit at the node's branch position, until the next edge no
    // longer increases the branch position. The uplink target is the unique
    // candidate that may match or prefix the key on this path.
    fn descend(&self, key: &[u8], nbit: u16) -> NodeIdx {
        let mut cur = NodeIdx::SENTINEL;
        loop {
            let side = getbit(key, nbit, self.bpos(cur)) as usize;
            let nxt = self.child(cur, side);
            if self.bpos(nxt) <= self.bpos(cur) {
                return nxt;
            }
            cur = nxt;
        }
    }

    /// Looks up a key, returning its node on an exact match.
    pub fn exact_match(&self, key: &[u8], nbit: u16) -> Option<NodeRef> {
        let cand = self.descend(key, nbit);
        if cand.is_sentinel() {
            return None;
        }
        let (ckey, cbits) = self.keybits(cand);
        equkey(key, nbit, ckey, cbits).then_some(NodeRef(cand))
    }

    /// Returns the node holding the longest stored key that is a bit-exact
    /// prefix of the given key and lies on its descent path.
    pub fn longest_match(&self, key: &[u8], nbit: u16) -> Option<NodeRef> {
        let mut best = None;
        let mut cur = NodeIdx::SENTINEL;
        loop {
            let side = getbit(key, nbit, self.bpos(cur)) as usize;
            let nxt = self.child(cur, side);
            if self.bpos(nxt) <= self.bpos(cur) {
                self.note_prefix(&mut best, nxt, key, nbit);
                return best.map(NodeRef);
            }
            self.note_prefix(&mut best, nxt, key, nbit);
            cur = nxt;
        }
    }

    // A visited node is a prefix candidate when its key is non-empty, no
    // longer than the search key and matches it bit for bit. The descent
    // meets candidates in order of strictly increasing branch position, so
    // the last one recorded is the longest.
    fn note_prefix(
        &self,
        best: &mut Option<NodeIdx>,
        n: NodeIdx,
        key: &[u8],
        nbit: u16,
    ) {
        if n.is_sentinel() {
            return;
        }
        let (nkey, nbits) = self.keybits(n);
        if nbits != 0 && nbits <= nbit && equkey(key, nbits, nkey, nbits) {
            *best = Some(n);
        }
    }

    //--- Insertion ----------------------------------------------------------

    /// Inserts a key, returning its node and whether it was newly created.
    ///
    /// A key that is already resident is left alone: the existing node is
    /// returned with `false` and `payload` is dropped. Replacing a payload
    /// is the caller's move, via [`payload_mut`](Self::payload_mut) or
    /// evict-then-insert.
    pub fn insert(
        &mut self,
        key: &[u8],
        nbit: u16,
        payload: P,
    ) -> Result<(NodeRef, bool), StoreError> {
        if nbit == 0 {
            return Err(StoreError::ZeroLengthKey);
        }

        let cand = self.descend(key, nbit);
        if !cand.is_sentinel() {
            let (ckey, cbits) = self.keybits(cand);
            if equkey(key, nbit, ckey, cbits) {
                trace!("insert: key of {} bits already resident", nbit);
                return Ok((NodeRef(cand), false));
            }
        }

        // The first bit distinguishing the new key from the candidate
        // becomes the branch position of the new node.
        let b = {
            let (ckey, cbits) = self.keybits(cand);
            bitdiff(key, nbit, ckey, cbits)
        };
        debug_assert_ne!(b, 0);

        let slot = self
            .alloc
            .alloc(&key[..key_bytes(nbit)])
            .ok_or(StoreError::ArenaExhausted)?;

        // Re-descend to the splice point: advance while the next edge is a
        // downlink branching before b.
        let mut p = NodeIdx::SENTINEL;
        loop {
            let side = getbit(key, nbit, self.bpos(p)) as usize;
            let c = self.child(p, side);
            if self.bpos(c) <= self.bpos(p) || self.bpos(c) >= b {
                let d = getbit(key, nbit, b) as usize;
                let mut child = [NodeIdx::SENTINEL; 2];
                child[1 - d] = c;
                let n = self.slab.insert(Node {
                    child,
                    bpos: b,
                    nbit,
                    key: slot,
                    payload,
                });
                // the self-link goes on the side of the node's own bit at b
                self.node_mut(n).child[d] = n;
                self.set_child(p, side, n);
                self.len += 1;
                trace!("insert: new node for {} bits at branch {}", nbit, b);
                return Ok((NodeRef(n), true));
            }
            p = c;
        }
    }

    //--- Eviction -----------------------------------------------------------

    /// Removes the given node from the tree, returning its payload.
    ///
    /// Fails with [`StoreError::NodeNotFound`] when the node is not
    /// resident, leaving the tree unchanged.
    pub fn evict(&mut self, node: NodeRef) -> Result<P, StoreError> {
        let x = node.0;
        if !self.live(x) {
            return Err(StoreError::NodeNotFound);
        }

        // Tracked walk by the victim's own key. `last` ends up as the node
        // whose uplink points at x (x itself for a self-linked victim),
        // `over` as the node visited just before `last`, and `npar` as the
        // downlink parent of x, spotted en route. From here on, topology
        // only: not a single key bit is consulted below.
        let walk = {
            let (key, nbit) = self.keybits(x);
            let mut prev = NodeIdx::SENTINEL;
            let mut cur = NodeIdx::SENTINEL;
            let mut npar = NodeIdx::SENTINEL;
            loop {
                let side = getbit(key, nbit, self.bpos(cur)) as usize;
                let nxt = self.child(cur, side);
                if self.bpos(nxt) <= self.bpos(cur) {
                    break (nxt == x).then_some((prev, cur, npar));
                }
                if nxt == x {
                    npar = cur;
                }
                prev = cur;
                cur = nxt;
            }
        };
        let Some((over, last, npar)) = walk else {
            return Err(StoreError::NodeNotFound);
        };

        // Step I: splice `last` out. Its slot away from the victim is found
        // by index comparison alone; for a self-linked victim this selects
        // the non-self slot.
        let toward = usize::from(self.child(last, 0) != x);
        let other = self.child(last, 1 - toward);
        let over_side = usize::from(self.child(over, 0) != last);
        self.set_child(over, over_side, other);

        // Step II: `last` takes the victim's place in the tree. Reading the
        // victim's slots after Step I matters: when `over` is the victim,
        // Step I just rewired one of them.
        if last != x {
            let npar_side = usize::from(self.child(npar, 0) != x);
            self.set_child(npar, npar_side, last);
            let victim = self.node(x);
            let (child, bpos) = (victim.child, victim.bpos);
            let survivor = self.node_mut(last);
            survivor.child = child;
            survivor.bpos = bpos;
        }

        let dead = self.slab.remove(x);
        self.alloc.free(dead.key);
        self.len -= 1;
        trace!("evict: removed node at branch {}", dead.bpos);
        Ok(dead.payload)
    }

    /// Removes a key, returning its payload if it was resident.
    pub fn remove(&mut self, key: &[u8], nbit: u16) -> Option<P> {
        let node = self.exact_match(key, nbit)?;
        self.evict(node).ok()
    }

    //--- Teardown -----------------------------------------------------------

    /// Removes every key, handing each payload to `deleter`.
    ///
    /// The tree is flattened with the funnel walk: an iterative O(N) pass
    /// that needs neither recursion nor parent pointers. The tree stays
    /// usable (empty) afterwards.
    pub fn clear_with<F: FnMut(P)>(&mut self, mut deleter: F) {
        let top = self.sentinel[0];
        self.sentinel = [NodeIdx::SENTINEL; 2];
        if top.is_sentinel() {
            self.alloc.teardown();
            return;
        }
        let drained = self.len;

        // Plant the sentinel at the rightmost tip as the terminator.
        let mut tip = top;
        loop {
            let r = self.child(tip, 1);
            if self.bpos(r) <= self.bpos(tip) {
                break;
            }
            tip = r;
        }
        self.set_child(tip, 1, NodeIdx::SENTINEL);

        // Funnel the tree into a singly linked dead list. Whatever hangs to
        // the right of a node is grafted onto the rightmost tip of its left
        // subtree, so the continuation always waits at the tip of the
        // current right spine. Zeroing bpos makes every reference to a
        // retired node read as an uplink for the remaining walks.
        let mut dead = NodeIdx::SENTINEL;
        let mut h = top;
        while !h.is_sentinel() {
            let c0 = self.child(h, 0);
            let next = if self.bpos(c0) <= self.bpos(h) {
                self.child(h, 1)
            } else {
                let right = self.child(h, 1);
                let mut tip = c0;
                loop {
                    let r = self.child(tip, 1);
                    if self.bpos(r) <= self.bpos(tip) {
                        break;
                    }
                    tip = r;
                }
                self.set_child(tip, 1, right);
                c0
            };
            let node = self.node_mut(h);
            node.bpos = 0;
            node.child[0] = dead;
            dead = h;
            h = next;
        }

        // Drain the dead list.
        while !dead.is_sentinel() {
            let node = self.slab.remove(dead);
            dead = node.child[0];
            deleter(node.payload);
            self.alloc.free(node.key);
        }
        self.slab.reset();
        self.alloc.teardown();
        self.len = 0;
        debug!("teardown: drained {} nodes", drained);
    }

    /// Removes every key, dropping the payloads.
    pub fn clear(&mut self) {
        self.clear_with(|_| ());
    }

    /// Keeps only the keys for which `pred` returns `true`.
    ///
    /// The walk is post-order, which is the one traversal where removing
    /// the node just visited cannot disturb what is still to come: both of
    /// its subtrees have already been emitted.
    pub fn retain<F: FnMut(&[u8], u16, &mut P) -> bool>(
        &mut self,
        mut pred: F,
    ) {
        let mut walk =
            Walk::new(None, Direction::LeftToRight, Order::PostOrder);
        while let Some(x) = walk.forward(self) {
            let keep = {
                let slab = &mut self.slab;
                let alloc = &self.alloc;
                match slab.get_mut(x) {
                    Some(node) => pred(
                        alloc.get(node.key),
                        node.nbit,
                        &mut node.payload,
                    ),
                    None => continue,
                }
            };
            if !keep {
                let _ = self.evict(NodeRef(x));
            }
        }
    }

    //--- Node access --------------------------------------------------------

    /// The key bytes of a resident node.
    pub fn key(&self, node: NodeRef) -> &[u8] {
        let n = self.node(node.0);
        self.alloc.get(n.key)
    }

    /// The key length of a resident node, in bits.
    pub fn key_bits(&self, node: NodeRef) -> u16 {
        self.node(node.0).nbit
    }

    /// The branch bit position of a resident node.
    pub fn branch_bit(&self, node: NodeRef) -> u32 {
        self.node(node.0).bpos
    }

    /// The payload of a resident node.
    pub fn payload(&self, node: NodeRef) -> &P {
        &self.node(node.0).payload
    }

    /// Mutable access to the payload of a resident node.
    pub fn payload_mut(&mut self, node: NodeRef) -> &mut P {
        &mut self.node_mut(node.0).payload
    }

    /// Number of keys in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    //--- Iteration ----------------------------------------------------------

    /// Iterates over the whole tree, in-order and left to right.
    pub fn iter(&self) -> Iter<'_, P, A> {
        self.iter_with(None, Direction::LeftToRight, Order::InOrder)
    }

    /// Iterates in the given order and direction, over the whole tree or,
    /// with a root, over one subtree.
    pub fn iter_with(
        &self,
        root: Option<NodeRef>,
        dir: Direction,
        order: Order,
    ) -> Iter<'_, P, A> {
        Iter::new(self, root.map(|r| r.0), dir, order)
    }

    //--- Test support -------------------------------------------------------

    #[doc(hidden)]
    pub fn top(&self) -> Option<NodeRef> {
        self.top_idx().map(NodeRef)
    }

    #[doc(hidden)]
    pub fn down_children(&self, node: NodeRef) -> [Option<NodeRef>; 2] {
        [0, 1].map(|side| {
            let c = self.child(node.0, side);
            (self.bpos(c) > self.bpos(node.0)).then_some(NodeRef(c))
        })
    }

    // Checks the two-reference invariant, downlink monotonicity, key
    // uniqueness and the length bookkeeping over the whole tree. Panics on
    // the first violation; meant for tests.
    #[doc(hidden)]
    pub fn check_invariants(&self) {
        let mut down: HashMap<NodeIdx, u32> = HashMap::new();
        let mut up: HashMap<NodeIdx, u32> = HashMap::new();
        let mut keys: HashSet<(Vec<u8>, u16)> = HashSet::new();
        let mut stack = Vec::new();
        let mut reached = 0usize;

        let top = self.sentinel[0];
        if top.is_sentinel() {
            assert_eq!(self.len, 0, "empty tree with a non-zero length");
            assert_eq!(self.slab.occupied(), 0, "orphaned slab entries");
            return;
        }
        assert!(
            self.bpos(top) > 0,
            "sentinel's downlink does not descend"
        );
        *down.entry(top).or_default() += 1;
        stack.push(top);

        while let Some(n) = stack.pop() {
            reached += 1;
            assert!(self.live(n), "edge to a vacant slab entry");

            let (key, nbit) = self.keybits(n);
            assert_ne!(nbit, 0, "resident node with a zero-length key");
            let mut norm = key[..key_bytes(nbit)].to_vec();
            if nbit & 7 != 0 {
                let last = norm.len() - 1;
                norm[last] &= 0xff << (8 - (nbit & 7));
            }
            assert!(
                keys.insert((norm, nbit)),
                "two nodes hold an equal key"
            );

            for side in 0..2 {
                let c = self.child(n, side);
                if self.bpos(c) > self.bpos(n) {
                    *down.entry(c).or_default() += 1;
                    stack.push(c);
                } else {
                    *up.entry(c).or_default() += 1;
                }
            }
        }

        assert_eq!(reached, self.len, "length does not match the topology");
        assert_eq!(
            self.slab.occupied(),
            self.len,
            "slab and topology disagree"
        );
        for (&n, &cnt) in &down {
            assert_eq!(cnt, 1, "node with {} downlinks", cnt);
            assert_eq!(
                up.get(&n).copied().unwrap_or(0),
                1,
                "node without exactly one uplink"
            );
        }
        for &n in up.keys() {
            assert!(
                n.is_sentinel() || down.contains_key(&n),
                "uplink to a node outside the tree"
            );
        }
    }
}
