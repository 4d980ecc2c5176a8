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
    use patricia_store::{Direction, NodeRef, Order, PatriciaMap};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    const ORDERS: [Order; 3] =
        [Order::PreOrder, Order::InOrder, Order::PostOrder];
    const DIRS: [Direction; 2] =
        [Direction::LeftToRight, Direction::RightToLeft];

    fn build_random(nkeys: usize, seed: u64) -> PatriciaMap<usize> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut map = PatriciaMap::new();
        let mut next_payload = 0;
        while next_payload < nkeys {
            let len = rng.random_range(1..=32usize);
            let mut key = vec![0u8; len];
            rng.fill(key.as_mut_slice());
            let (_, fresh) = map
                .insert(&key, (len * 8) as u16, next_payload)
                .unwrap();
            if fresh {
                next_payload += 1;
            }
        }
        map.check_invariants();
        map
    }

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

    fn check_traversals(map: &PatriciaMap<usize>) {
        for dir in DIRS {
            for order in ORDERS {
                let mut want = Vec::new();
                if let Some(top) = map.top() {
                    reference(map, top, dir, order, &mut want);
                }
                let mut iter = map.iter_with(None, dir, order);
                let got: Vec<_> = iter.by_ref().collect();
                assert_eq!(got, want, "forward {} {}", dir, order);

                let back: Vec<_> =
                    std::iter::from_fn(|| iter.prev()).collect();
                let mut reversed = want;
                reversed.reverse();
                assert_eq!(back, reversed, "backward {} {}", dir, order);
            }
        }
    }

    #[test]
    fn random_small() {
        super::common::init();
        check_traversals(&build_random(20, 1));
    }

    #[test]
    fn random_medium() {
        super::common::init();
        check_traversals(&build_random(80, 123));
    }

    #[test]
    fn random_large_exercises_the_parent_fifo() {
        super::common::init();
        // ≥ 120 keys of up to 32 bytes: plenty of paths deeper than the
        // 8-slot FIFO, so the recovery walk runs for real
        check_traversals(&build_random(140, 98765));
    }

    #[test]
    fn chain_deeper_than_the_fifo() {
        super::common::init();
        // a 40-node chain: every key a bit-prefix of the next, so the tree
        // is one long spine and every ascent past slot 8 needs recovery
        let mut map = PatriciaMap::new();
        let mut word = String::new();
        for i in 0..40 {
            word.push('a');
            assert!(map
                .insert(word.as_bytes(), (word.len() * 8) as u16, i)
                .unwrap()
                .1);
        }
        map.check_invariants();
        check_traversals(&map);
    }

    #[test]
    fn random_inserts_and_removals_hold_the_invariants() {
        super::common::init();
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        let mut map = PatriciaMap::new();
        let mut resident: Vec<Vec<u8>> = Vec::new();

        for round in 0..400 {
            if resident.is_empty() || rng.random_bool(0.6) {
                let len = rng.random_range(1..=16usize);
                let mut key = vec![0u8; len];
                rng.fill(key.as_mut_slice());
                if map.insert(&key, (len * 8) as u16, round).unwrap().1 {
                    resident.push(key);
                }
            } else {
                let pick = rng.random_range(0..resident.len());
                let key = resident.swap_remove(pick);
                assert!(map
                    .remove(&key, (key.len() * 8) as u16)
                    .is_some());
            }
            if round % 25 == 0 {
                map.check_invariants();
            }
        }
        map.check_invariants();
        assert_eq!(map.len(), resident.len());
        for key in &resident {
            assert!(map
                .exact_match(key, (key.len() * 8) as u16)
                .is_some());
        }
        check_traversals(&map);
    }
}
