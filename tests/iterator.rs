mod common {
    use std::io::Write;

    pub fn init() {
        let _ = env_logger::builder()
            .format(|buf, record| writeln!(buf, "{}", record.args()))
            .is_test(true)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use patricia_store::{
        Direction, NodeRef, Order, PatriciaMap,
    };

    fn bits(s: &str) -> u16 {
        (s.len() * 8) as u16
    }

    fn build(words: &[&str]) -> PatriciaMap<usize> {
        let mut map = PatriciaMap::new();
        for (i, w) in words.iter().enumerate() {
            assert!(map.insert(w.as_bytes(), bits(w), i).unwrap().1);
        }
        map.check_invariants();
        map
    }

    // The textbook recursive traversal of the downlink tree, the yardstick
    // for the iterator's state machine.
    fn reference(
        map: &PatriciaMap<usize>,
        node: NodeRef,
        dir: Direction,
        order: Order,
        out: &mut Vec<NodeRef>,
    ) {
        let [left, right] = map.down_children(node);
        let (first, second) = match dir {
            Direction::LeftToRight => (left, right),
            Direction::RightToLeft => (right, left),
        };
        if order == Order::PreOrder {
            out.push(node);
        }
        if let Some(c) = first {
            reference(map, c, dir, order, out);
        }
        if order == Order::InOrder {
            out.push(node);
        }
        if let Some(c) = second {
            reference(map, c, dir, order, out);
        }
        if order == Order::PostOrder {
            out.push(node);
        }
    }

    const ORDERS: [Order; 3] =
        [Order::PreOrder, Order::InOrder, Order::PostOrder];
    const DIRS: [Direction; 2] =
        [Direction::LeftToRight, Direction::RightToLeft];

    fn assert_all_traversals(map: &PatriciaMap<usize>) {
        for dir in DIRS {
            for order in ORDERS {
                let mut want = Vec::new();
                if let Some(top) = map.top() {
                    reference(map, top, dir, order, &mut want);
                }
                let mut iter = map.iter_with(None, dir, order);
                let got: Vec<_> = iter.by_ref().collect();
                assert_eq!(got, want, "forward {} {}", dir, order);
                assert_eq!(got.len(), map.len());

                // stepping back from the end replays the reverse
                let back: Vec<_> =
                    std::iter::from_fn(|| iter.prev()).collect();
                let mut reversed = want.clone();
                reversed.reverse();
                assert_eq!(back, reversed, "backward {} {}", dir, order);

                // and the same again after a reset
                iter.reset();
                let again: Vec<_> = iter.collect();
                assert_eq!(again, want, "after reset {} {}", dir, order);
            }
        }
    }

    #[test]
    fn empty_tree_iteration() {
        super::common::init();
        let map: PatriciaMap<usize> = PatriciaMap::new();
        for dir in DIRS {
            for order in ORDERS {
                let mut iter = map.iter_with(None, dir, order);
                assert!(iter.next().is_none());
                assert!(iter.next().is_none());
                assert!(iter.prev().is_none());
            }
        }
    }

    #[test]
    fn single_node_iteration() {
        super::common::init();
        let map = build(&["solo"]);
        let solo = map.exact_match(b"solo", 32).unwrap();
        for dir in DIRS {
            for order in ORDERS {
                let mut iter = map.iter_with(None, dir, order);
                assert_eq!(iter.next(), Some(solo));
                assert_eq!(iter.next(), None);
                assert_eq!(iter.prev(), Some(solo));
            }
        }
        assert_all_traversals(&map);
    }

    #[test]
    fn small_manual_tree() {
        super::common::init();
        let map = build(&["a", "b", "ab"]);
        assert_all_traversals(&map);
    }

    #[test]
    fn example_word_tree_all_modes() {
        super::common::init();
        let map =
            build(&["alpha", "alpine", "al", "beta", "bet", "z", "zero"]);
        assert_all_traversals(&map);
    }

    #[test]
    fn fresh_iterator_has_no_predecessor() {
        super::common::init();
        let map = build(&["a", "b", "ab"]);
        let mut iter =
            map.iter_with(None, Direction::LeftToRight, Order::InOrder);
        assert_eq!(iter.prev(), None);
        assert!(iter.next().is_some());
    }

    #[test]
    fn next_after_prev_re_yields_the_node() {
        super::common::init();
        let map =
            build(&["alpha", "alpine", "al", "beta", "bet", "z", "zero"]);
        for order in ORDERS {
            let mut iter =
                map.iter_with(None, Direction::LeftToRight, order);
            let first = iter.next().unwrap();
            let second = iter.next().unwrap();
            assert_ne!(first, second);
            assert_eq!(iter.prev(), Some(second));
            assert_eq!(iter.next(), Some(second));
            assert_eq!(iter.prev(), Some(second));
            assert_eq!(iter.prev(), Some(first));
            assert_eq!(iter.prev(), None);
        }
    }

    #[test]
    fn subtree_iteration() {
        super::common::init();
        let map =
            build(&["alpha", "alpine", "al", "beta", "bet", "z", "zero"]);
        let top = map.top().unwrap();
        for root in map.down_children(top).into_iter().flatten() {
            for dir in DIRS {
                for order in ORDERS {
                    let mut want = Vec::new();
                    reference(&map, root, dir, order, &mut want);
                    let got: Vec<_> =
                        map.iter_with(Some(root), dir, order).collect();
                    assert_eq!(got, want, "subtree {} {}", dir, order);
                }
            }
        }
    }

    #[test]
    fn iteration_covers_every_key() {
        super::common::init();
        let words =
            ["alpha", "alpine", "al", "beta", "bet", "z", "zero"];
        let map = build(&words);
        let mut seen: Vec<_> = map
            .iter()
            .map(|n| {
                String::from_utf8(map.key(n).to_vec()).unwrap()
            })
            .collect();
        seen.sort_unstable();
        let mut want: Vec<_> =
            words.iter().map(|w| w.to_string()).collect();
        want.sort_unstable();
        assert_eq!(seen, want);
    }
}
