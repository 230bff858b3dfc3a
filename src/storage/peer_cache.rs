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

//! Best-effort, `sled`-backed persistence for the peer address store.
//!
//! Survives process restart but is never load-bearing for correctness —
//! every read path falls back to bootstrap/DNS/gossip discovery if the
//! cache is empty or unavailable. Keyed by endpoint string (`"ip:port"`),
//! deliberately not the upstream daemon's single fixed key (see
//! `SPEC_FULL.md` §4.14 / spec.md §9 open question #2): a fixed key would
//! silently overwrite every prior peer on each write.

use crate::core::types::Peer;
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::warn;

/// Errors raised opening or writing the peer cache. All are non-fatal to
/// the daemon; callers log and continue (`DatabaseError`, spec §7).
#[derive(Debug, Error)]
pub enum PeerCacheError {
    /// The sled database could not be opened at the configured path.
    #[error("opening peer cache at {path}: {source}")]
    Open {
        /// Configured database path.
        path: String,
        /// Underlying sled error.
        #[source]
        source: sled::Error,
    },
    /// A read or write against the open database failed.
    #[error("peer cache io: {0}")]
    Io(#[from] sled::Error),
    /// A stored value could not be decoded back into a [`Peer`].
    #[error("decoding cached peer entry")]
    Decode,
}

/// Handle to the on-disk peer cache.
pub struct PeerCache {
    db: sled::Db,
}

impl PeerCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &str) -> Result<Self, PeerCacheError> {
        let db = sled::open(path).map_err(|source| PeerCacheError::Open {
            path: path.to_string(),
            source,
        })?;
        Ok(Self { db })
    }

    /// Persist one peer under its endpoint-string key. Fire-and-forget:
    /// callers log the error and continue rather than treat it as fatal.
    pub fn put(&self, peer: &Peer) -> Result<(), PeerCacheError> {
        let key = peer.endpoint();
        let value = bincode::serialize(peer).map_err(|_| PeerCacheError::Decode)?;
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    /// Persist every peer in `peers`, logging (but not aborting on) any
    /// individual failure.
    pub fn put_all(&self, peers: &[Peer]) {
        for peer in peers {
            if let Err(err) = self.put(peer) {
                warn!(endpoint = %peer.endpoint(), error = %err, "failed to cache peer");
            }
        }
    }

    /// Load every cached peer, skipping (and logging) any entry that fails
    /// to decode rather than aborting the whole load.
    pub fn load_all(&self) -> Vec<Peer> {
        let mut peers = Vec::new();
        for item in self.db.iter() {
            match item {
                Ok((_, value)) => match bincode::deserialize::<Peer>(&value) {
                    Ok(peer) => peers.push(peer),
                    Err(_) => warn!("skipping undecodable peer cache entry"),
                },
                Err(err) => warn!(error = %err, "peer cache iteration error"),
            }
        }
        peers
    }

    /// Remove a single cached entry by endpoint.
    pub fn remove(&self, address: Ipv4Addr, port: u16) -> Result<(), PeerCacheError> {
        let key = format!("{address}:{port}");
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    /// Number of cached peers.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// True if the cache holds no peers.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(a: u8) -> Peer {
        Peer {
            address: Ipv4Addr::new(10, 0, 0, a),
            port: 9999,
            last_seen_unix: 100,
        }
    }

    #[test]
    fn put_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PeerCache::open(dir.path().to_str().unwrap()).unwrap();
        cache.put(&peer(1)).unwrap();
        cache.put(&peer(2)).unwrap();
        let loaded = cache.load_all();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn put_keys_by_endpoint_not_a_fixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PeerCache::open(dir.path().to_str().unwrap()).unwrap();
        cache.put(&peer(1)).unwrap();
        cache.put(&peer(2)).unwrap();
        // A fixed-key cache (the upstream daemon's bug) would overwrite
        // peer(1) with peer(2), leaving only one entry.
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn remove_deletes_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PeerCache::open(dir.path().to_str().unwrap()).unwrap();
        cache.put(&peer(1)).unwrap();
        cache.put(&peer(2)).unwrap();
        cache.remove(Ipv4Addr::new(10, 0, 0, 1), 9999).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
