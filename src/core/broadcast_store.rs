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

//! In-memory store of observed masternode broadcasts, keyed by collateral
//! outpoint, with a 4-hour time-to-live.

use crate::core::types::MasternodeBroadcast;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entries older than this are evicted on the next sweep.
pub const TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Time-to-live keyed broadcast store.
#[derive(Default)]
pub struct BroadcastStore {
    entries: HashMap<String, (MasternodeBroadcast, Instant)>,
}

impl BroadcastStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert or replace a broadcast, stamped with `now`.
    pub fn store(&mut self, broadcast: MasternodeBroadcast, now: Instant) {
        let key = broadcast.outpoint.store_key();
        self.entries.insert(key, (broadcast, now));
    }

    /// Look up a broadcast by outpoint key.
    pub fn get(&self, key: &str) -> Option<&MasternodeBroadcast> {
        self.entries.get(key).map(|(b, _)| b)
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict all entries older than [`TTL`] relative to `now`. Returns the
    /// number of entries removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, inserted_at)| now.duration_since(*inserted_at) < TTL);
        before - self.entries.len()
    }
}
