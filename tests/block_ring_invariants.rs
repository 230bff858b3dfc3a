// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use phantomd::core::block_ring::{BlockRing, CAPACITY};
use proptest::prelude::*;

fn hash(b: u8) -> [u8; 32] {
    [b; 32]
}

proptest! {
    /// Invariant 1: for any interleaving of `push`/`force_hash`, the ring
    /// never exceeds 12 entries and `top()` tracks the most recent write.
    #[test]
    fn ring_bound_holds_across_mixed_operations(
        ops in proptest::collection::vec(
            (any::<bool>(), any::<u8>()),
            0..200,
        ),
    ) {
        let mut ring = BlockRing::new();
        let mut last = None;
        for (force, b) in ops {
            let h = hash(b);
            if force {
                ring.force_hash(h);
            } else {
                ring.push(h);
            }
            last = Some(h);
            prop_assert!(ring.len() <= CAPACITY);
        }
        if let Some(expected) = last {
            prop_assert_eq!(ring.top(), Some(expected));
        }
    }

    /// `top_minus_k` never returns a hash that wasn't actually pushed, and
    /// is `None` exactly when fewer than `k + 1` hashes have been seen.
    #[test]
    fn top_minus_k_agrees_with_push_order(
        pushes in proptest::collection::vec(any::<u8>(), 1..30),
    ) {
        let mut ring = BlockRing::new();
        for b in &pushes {
            ring.push(hash(*b));
        }
        let deduped: Vec<u8> = {
            let mut out = Vec::new();
            for b in &pushes {
                if out.last() != Some(b) {
                    out.push(*b);
                }
            }
            out
        };
        let retained: Vec<u8> = deduped.iter().rev().take(CAPACITY).rev().copied().collect();
        for k in 0..CAPACITY {
            let expected = retained.len().checked_sub(k + 1).map(|i| hash(retained[i]));
            prop_assert_eq!(ring.top_minus_k(k), expected);
        }
    }
}

#[test]
fn force_hash_seeds_a_bootstrap_ring_to_a_single_entry() {
    let mut ring = BlockRing::new();
    ring.push([1u8; 32]);
    ring.push([2u8; 32]);
    ring.force_hash([9u8; 32]);
    assert_eq!(ring.len(), 1);
    assert_eq!(ring.top(), Some([9u8; 32]));
    assert_eq!(ring.top_minus_k(1), None);
}
