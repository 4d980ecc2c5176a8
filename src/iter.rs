use log::trace;

use crate::alloc::AllocPolicy;
use crate::node::{NodeIdx, NodeRef};
use crate::tree::PatriciaMap;
use crate::types::bits::getbit;

//------------ Order / Direction ---------------------------------------------

/// The traversal order of an iteration over the downlink tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Order {
    /// A node is yielded before either of its subtrees.
    PreOrder,
    /// A node is yielded between its two subtrees.
    InOrder,
    /// A node is yielded after both of its subtrees.
    PostOrder,
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Order::PreOrder => write!(f, "pre-order"),
            Order::InOrder => write!(f, "in-order"),
            Order::PostOrder => write!(f, "post-order"),
        }
    }
}

/// Which child slot an iteration visits first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// `child[0]` first.
    LeftToRight,
    /// `child[1]` first; the mirror image.
    RightToLeft,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Direction::LeftToRight => write!(f, "left-to-right"),
            Direction::RightToLeft => write!(f, "right-to-left"),
        }
    }
}

//------------ Walk ----------------------------------------------------------

// Iterating a tree without parent pointers needs either an unbounded stack
// of ancestors or a walk from the root whenever the cursor has to go up.
// Neither is appealing on its own, so this is a hybrid: a size-bound FIFO
// of recent ancestors, refilled by a root-to-cursor recovery walk whenever
// it runs dry or a popped entry fails its parenthood check. Descending is
// cheap in a PATRICIA tree - single bit probes, no key compares - so the
// recovery stays affordable, and with 8 slots it is rare to begin with.
//
// The cursor state is one node plus the label describing how the node was
// entered. No label encodes a half-processed subtree, so every saved
// (cursor, label) pair is a safe point to resume from, forwards or
// backwards.

// Arrival labels of the cursor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    // before the first reachable node
    Head,
    // just entered the cursor from its parent
    Down,
    // returned to the cursor from its first in-order subtree
    UpFirst,
    // returned to the cursor from its second in-order subtree
    UpSecond,
    // past the last reachable node
    Tail,
}

// power of two; the FIFO is round-robin indexed
const FIFO_SIZE: usize = 8;

#[derive(Debug)]
pub(crate) struct Walk {
    // requested iteration root; None iterates the whole tree
    root: Option<NodeIdx>,
    // the root the running iteration is anchored to; sentinel = not started
    anchor: NodeIdx,
    node: NodeIdx,
    state: State,
    order: Order,
    dir: Direction,
    fifo: [NodeIdx; FIFO_SIZE],
    fifo_len: u8,
    fifo_top: u8,
}

impl Walk {
    pub(crate) fn new(
        root: Option<NodeIdx>,
        dir: Direction,
        order: Order,
    ) -> Self {
        Walk {
            root,
            anchor: NodeIdx::SENTINEL,
            node: NodeIdx::SENTINEL,
            state: State::Head,
            order,
            dir,
            fifo: [NodeIdx::SENTINEL; FIFO_SIZE],
            fifo_len: 0,
            fifo_top: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.anchor = NodeIdx::SENTINEL;
        self.node = NodeIdx::SENTINEL;
        self.state = State::Head;
        self.fifo_len = 0;
    }

    fn first_side(&self) -> usize {
        match self.dir {
            Direction::LeftToRight => 0,
            Direction::RightToLeft => 1,
        }
    }

    fn down_child<P, A: AllocPolicy>(
        &self,
        t: &PatriciaMap<P, A>,
        n: NodeIdx,
        side: usize,
    ) -> Option<NodeIdx> {
        let c = t.child(n, side);
        (t.bpos(c) > t.bpos(n)).then_some(c)
    }

    //--- The parent FIFO ----------------------------------------------------

    fn push(&mut self, n: NodeIdx) {
        self.fifo_top = (self.fifo_top + 1) % FIFO_SIZE as u8;
        self.fifo[self.fifo_top as usize] = n;
        if usize::from(self.fifo_len) < FIFO_SIZE {
            self.fifo_len += 1;
        }
    }

    fn pop(&mut self) -> Option<NodeIdx> {
        if self.fifo_len == 0 {
            return None;
        }
        let n = self.fifo[self.fifo_top as usize];
        self.fifo_top = (self.fifo_top + FIFO_SIZE as u8 - 1) % FIFO_SIZE as u8;
        self.fifo_len -= 1;
        Some(n)
    }

    // Parent acquisition without parent pointers: try the FIFO first, fall
    // back to the recovery walk. A popped entry must still be a downlink
    // parent of the cursor to count.
    fn parent<P, A: AllocPolicy>(
        &mut self,
        t: &PatriciaMap<P, A>,
        n: NodeIdx,
    ) -> Option<NodeIdx> {
        if let Some(p) = self.pop() {
            if t.live(p)
                && t.bpos(p) < t.bpos(n)
                && (t.child(p, 0) == n || t.child(p, 1) == n)
            {
                return Some(p);
            }
        }
        self.recover(t, n)
    }

    // Root-to-cursor walk guided by the cursor's own key, refilling the
    // FIFO with the ancestors it passes. The downlink path to a node is the
    // leading part of that node's own search path, so the bit probes land
    // exactly on the ancestors.
    fn recover<P, A: AllocPolicy>(
        &mut self,
        t: &PatriciaMap<P, A>,
        n: NodeIdx,
    ) -> Option<NodeIdx> {
        trace!("iterator: rebuilding the parent path");
        self.fifo_len = 0;
        let (key, nbit) = t.keybits(n);
        let mut cur = t.top_idx()?;
        loop {
            let side = getbit(key, nbit, t.bpos(cur)) as usize;
            let nxt = t.child(cur, side);
            if nxt == n {
                return Some(cur);
            }
            if t.bpos(nxt) <= t.bpos(cur) {
                // the cursor is no longer reachable
                return None;
            }
            self.push(cur);
            cur = nxt;
        }
    }

    //--- Stepping -----------------------------------------------------------

    fn start_node<P, A: AllocPolicy>(
        &self,
        t: &PatriciaMap<P, A>,
    ) -> Option<NodeIdx> {
        match self.root {
            Some(r) => t.live(r).then_some(r),
            None => t.top_idx(),
        }
    }

    // One forward transition per loop turn; a node is returned once the
    // transition's yielding order matches the configured one.
    pub(crate) fn forward<P, A: AllocPolicy>(
        &mut self,
        t: &PatriciaMap<P, A>,
    ) -> Option<NodeIdx> {
        loop {
            let (n, yields) = match self.state {
                State::Tail => return None,
                State::Head => {
                    match self.start_node(t) {
                        Some(r) => {
                            self.anchor = r;
                            self.node = r;
                            self.state = State::Down;
                        }
                        None => self.state = State::Tail,
                    }
                    continue;
                }
                State::Down => {
                    let n = self.node;
                    match self.down_child(t, n, self.first_side()) {
                        Some(c) => {
                            self.push(n);
                            self.node = c;
                        }
                        None => self.state = State::UpFirst,
                    }
                    (n, Order::PreOrder)
                }
                State::UpFirst => {
                    let n = self.node;
                    match self.down_child(t, n, 1 - self.first_side()) {
                        Some(c) => {
                            self.push(n);
                            self.node = c;
                            self.state = State::Down;
                        }
                        None => self.state = State::UpSecond,
                    }
                    (n, Order::InOrder)
                }
                State::UpSecond => {
                    let n = self.node;
                    if n == self.anchor {
                        self.state = State::Tail;
                    } else {
                        match self.parent(t, n) {
                            Some(p) => {
                                self.state = if t.child(p, self.first_side())
                                    == n
                                {
                                    State::UpFirst
                                } else {
                                    State::UpSecond
                                };
                                self.node = p;
                            }
                            None => self.state = State::Tail,
                        }
                    }
                    (n, Order::PostOrder)
                }
            };
            if yields == self.order {
                return Some(n);
            }
        }
    }

    // The mirror image of `forward`: every transition is inverted, and the
    // event emitted is the one of the state stepped back onto. A backward
    // walk therefore replays the forward sequence in reverse; stepping
    // forward right after `backward` re-yields the same node.
    pub(crate) fn backward<P, A: AllocPolicy>(
        &mut self,
        t: &PatriciaMap<P, A>,
    ) -> Option<NodeIdx> {
        loop {
            let (n, yields) = match self.state {
                State::Head => return None,
                State::Tail => {
                    if self.anchor.is_sentinel() {
                        self.state = State::Head;
                        continue;
                    }
                    self.node = self.anchor;
                    self.state = State::UpSecond;
                    (self.node, Order::PostOrder)
                }
                State::Down => {
                    let n = self.node;
                    if n == self.anchor {
                        self.state = State::Head;
                        continue;
                    }
                    match self.parent(t, n) {
                        Some(p) => {
                            let from_first =
                                t.child(p, self.first_side()) == n;
                            self.node = p;
                            if from_first {
                                (p, Order::PreOrder)
                            } else {
                                self.state = State::UpFirst;
                                (p, Order::InOrder)
                            }
                        }
                        None => {
                            self.state = State::Head;
                            continue;
                        }
                    }
                }
                State::UpFirst => {
                    let n = self.node;
                    match self.down_child(t, n, self.first_side()) {
                        Some(c) => {
                            self.push(n);
                            self.node = c;
                            self.state = State::UpSecond;
                            (c, Order::PostOrder)
                        }
                        None => {
                            self.state = State::Down;
                            (n, Order::PreOrder)
                        }
                    }
                }
                State::UpSecond => {
                    let n = self.node;
                    match self.down_child(t, n, 1 - self.first_side()) {
                        Some(c) => {
                            self.push(n);
                            self.node = c;
                            (c, Order::PostOrder)
                        }
                        None => {
                            self.state = State::UpFirst;
                            (n, Order::InOrder)
                        }
                    }
                }
            };
            if yields == self.order {
                return Some(n);
            }
        }
    }
}

//------------ Iter ----------------------------------------------------------

/// An iterator over the nodes of a tree or one of its subtrees.
///
/// Created by [`PatriciaMap::iter`] and [`PatriciaMap::iter_with`]. The
/// iterator walks the downlink tree only and yields every reachable node
/// exactly once, in the configured [`Order`] and [`Direction`]. It can also
/// step [backwards](Self::prev), replaying the forward sequence in reverse,
/// and [`reset`](Self::reset) to the beginning.
///
/// The iterator holds a shared borrow of the tree, so the tree cannot be
/// mutated while one is alive. For removing keys mid-walk use
/// [`PatriciaMap::retain`].
pub struct Iter<'a, P, A: AllocPolicy = crate::alloc::HeapAlloc> {
    tree: &'a PatriciaMap<P, A>,
    walk: Walk,
}

impl<'a, P, A: AllocPolicy> Iter<'a, P, A> {
    pub(crate) fn new(
        tree: &'a PatriciaMap<P, A>,
        root: Option<NodeIdx>,
        dir: Direction,
        order: Order,
    ) -> Self {
        Iter {
            tree,
            walk: Walk::new(root, dir, order),
        }
    }

    /// Steps backwards, yielding the node the cursor steps back onto.
    ///
    /// After the iterator is exhausted, repeated `prev` calls replay the
    /// whole sequence in reverse. A `next` right after a `prev` re-yields
    /// the same node. On a fresh iterator there is nothing to step back
    /// onto, so `prev` yields `None`.
    pub fn prev(&mut self) -> Option<NodeRef> {
        self.walk.backward(self.tree).map(NodeRef)
    }

    /// Rewinds to the state before the first node.
    pub fn reset(&mut self) {
        self.walk.reset();
    }
}

impl<'a, P, A: AllocPolicy> Iterator for Iter<'a, P, A> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        self.walk.forward(self.tree).map(NodeRef)
    }
}
