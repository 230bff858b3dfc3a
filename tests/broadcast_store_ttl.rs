// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use phantomd::core::broadcast_store::{BroadcastStore, TTL};
use phantomd::core::types::{MasternodeBroadcast, NetAddress, Outpoint};
use proptest::prelude::*;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

fn sample(tag: u8) -> MasternodeBroadcast {
    MasternodeBroadcast {
        outpoint: Outpoint {
            txid: [tag; 32],
            index: tag as u32,
        },
        address: NetAddress {
            ip: Ipv4Addr::new(10, 0, 0, tag),
            port: 9999,
            services: 1,
            last_seen_unix: 0,
        },
        collateral_pubkey: vec![0u8; 33],
        masternode_pubkey: vec![0u8; 33],
        signature: vec![0u8; 65],
        sig_time: 0,
        protocol_version: 70_208,
        last_ping: None,
    }
}

proptest! {
    /// Invariant 6: after a sweep, every surviving entry was inserted less
    /// than `TTL` before `now`, and every entry older than `TTL` is gone.
    #[test]
    fn sweep_evicts_exactly_the_expired_entries(
        ages_secs in proptest::collection::vec(0u64..(4 * 3600 * 2), 0..30),
    ) {
        let mut store = BroadcastStore::new();
        let now = Instant::now() + Duration::from_secs(4 * 3600 * 2);
        let mut expected_survivors = 0usize;
        for (tag, age) in ages_secs.iter().enumerate() {
            let inserted_at = now - Duration::from_secs(*age);
            store.store(sample(tag as u8), inserted_at);
            if Duration::from_secs(*age) < TTL {
                expected_survivors += 1;
            }
        }
        store.sweep(now);
        prop_assert_eq!(store.len(), expected_survivors);
    }
}

#[test]
fn fresh_entry_survives_a_sweep_at_insertion_time() {
    let mut store = BroadcastStore::new();
    let now = Instant::now();
    store.store(sample(1), now);
    store.sweep(now);
    assert_eq!(store.len(), 1);
}

#[test]
fn entry_exactly_at_ttl_boundary_is_evicted() {
    let mut store = BroadcastStore::new();
    let now = Instant::now() + TTL;
    store.store(sample(1), now - TTL);
    store.sweep(now);
    assert!(store.is_empty());
}
