// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Thread-safe in-memory store of known peer endpoints.
//!
//! Only IPv4 peers are tracked; IPv6 addresses observed via gossip are
//! dropped at the message-decode layer (see
//! [`crate::networking::wire::messages::AddrPayload`]) before they ever
//! reach this store.

use crate::core::types::Peer;
use rand::seq::IteratorRandom;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// Single-writer-at-a-time peer address store, keyed by `(ip, port)`.
#[derive(Default)]
pub struct PeerStore {
    peers: Mutex<HashMap<(Ipv4Addr, u16), Peer>>,
}

impl PeerStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a single peer's last-seen time.
    pub fn store_peer(&self, peer: Peer) {
        let mut peers = self.peers.lock().expect("peer store mutex poisoned");
        peers.insert((peer.address, peer.port), peer);
    }

    /// Insert or refresh a batch of peers.
    pub fn store_peers(&self, batch: impl IntoIterator<Item = Peer>) {
        let mut peers = self.peers.lock().expect("peer store mutex poisoned");
        for peer in batch {
            peers.insert((peer.address, peer.port), peer);
        }
    }

    /// Number of peers currently known.
    pub fn len(&self) -> usize {
        self.peers.lock().expect("peer store mutex poisoned").len()
    }

    /// True if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample one peer uniformly at random, excluding any endpoint present
    /// in `exclude` (the supervisor's set of currently connected peers).
    pub fn get_random_peer(&self, exclude: &[(Ipv4Addr, u16)]) -> Option<Peer> {
        self.get_random_peers(1, exclude).into_iter().next()
    }

    /// Sample up to `n` distinct peers uniformly at random without
    /// replacement, excluding any endpoint present in `exclude`.
    pub fn get_random_peers(&self, n: usize, exclude: &[(Ipv4Addr, u16)]) -> Vec<Peer> {
        let peers = self.peers.lock().expect("peer store mutex poisoned");
        let mut rng = rand::thread_rng();
        peers
            .iter()
            .filter(|(key, _)| !exclude.contains(key))
            .map(|(_, peer)| *peer)
            .choose_multiple(&mut rng, n)
    }

    /// Snapshot all known peers (used by the peer cache writer).
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers
            .lock()
            .expect("peer store mutex poisoned")
            .values()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(a: u8, port: u16) -> Peer {
        Peer {
            address: Ipv4Addr::new(10, 0, 0, a),
            port,
            last_seen_unix: 0,
        }
    }

    #[test]
    fn store_peer_upserts_by_endpoint() {
        let store = PeerStore::new();
        store.store_peer(peer(1, 9999));
        let mut updated = peer(1, 9999);
        updated.last_seen_unix = 42;
        store.store_peer(updated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn random_sampling_excludes_connected_peers() {
        let store = PeerStore::new();
        store.store_peers((0..5).map(|i| peer(i, 9999)));
        let exclude = vec![(Ipv4Addr::new(10, 0, 0, 0), 9999)];
        for _ in 0..20 {
            let sampled = store.get_random_peers(10, &exclude);
            assert!(sampled
                .iter()
                .all(|p| (p.address, p.port) != exclude[0]));
            assert_eq!(sampled.len(), 4);
        }
    }

    #[test]
    fn get_random_peer_returns_none_on_empty_store() {
        let store = PeerStore::new();
        assert!(store.get_random_peer(&[]).is_none());
    }
}
