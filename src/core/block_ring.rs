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

//! A bounded FIFO of recently observed block hashes, capped at 12 entries.
//! The ping generator anchors each signed ping to `top_minus_k(12)` so it
//! always references a hash old enough to have propagated network-wide.

use std::collections::VecDeque;

/// Fixed ring capacity, matching the upstream daemon's queue depth.
pub const CAPACITY: usize = 12;

/// Bounded FIFO of block hashes, newest at the back.
#[derive(Debug, Default)]
pub struct BlockRing {
    hashes: VecDeque<[u8; 32]>,
}

impl BlockRing {
    /// Construct an empty ring.
    pub fn new() -> Self {
        Self {
            hashes: VecDeque::with_capacity(CAPACITY),
        }
    }

    /// Push a newly observed hash, evicting the oldest entry if at capacity.
    pub fn push(&mut self, hash: [u8; 32]) {
        if self.hashes.back() == Some(&hash) {
            return;
        }
        if self.hashes.len() == CAPACITY {
            self.hashes.pop_front();
        }
        self.hashes.push_back(hash);
    }

    /// Most recently pushed hash.
    pub fn top(&self) -> Option<[u8; 32]> {
        self.hashes.back().copied()
    }

    /// Hash `k` positions behind the top (0 = top itself). `None` if the
    /// ring does not yet hold `k + 1` entries.
    pub fn top_minus_k(&self, k: usize) -> Option<[u8; 32]> {
        let len = self.hashes.len();
        if k >= len {
            return None;
        }
        self.hashes.get(len - 1 - k).copied()
    }

    /// Reset the ring to hold exactly one hash, discarding all others. Used
    /// to seed the ring from a bootstrap source at startup.
    pub fn force_hash(&mut self, hash: [u8; 32]) {
        self.hashes.clear();
        self.hashes.push_back(hash);
    }

    /// Number of hashes currently held.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// True if the ring holds no hashes.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// True once the ring has reached its full 12-entry capacity.
    pub fn is_full(&self) -> bool {
        self.hashes.len() == CAPACITY
    }
}
