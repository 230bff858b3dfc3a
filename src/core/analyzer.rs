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

//! Auto-sense analyzer: infers the network's `(outpoint_form,
//! sentinel_version, daemon_version)` triple by tallying observed
//! masternode pings, rather than requiring the operator to hardcode it.
//!
//! The first triple to reach [`DEFAULT_THRESHOLD`] observations wins and is
//! frozen; every later call to [`Analyzer::analyze_ping`] is then a no-op.

use std::collections::HashMap;

/// Default number of matching observations required to declare consensus.
pub const DEFAULT_THRESHOLD: u32 = 10;

/// The inferred wire-format triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SenseTriple {
    /// Whether pings on this network use the outpoint signing form.
    pub outpoint_form: bool,
    /// Observed sentinel version.
    pub sentinel_version: u32,
    /// Observed daemon version.
    pub daemon_version: u32,
}

/// Tallies observed triples until one reaches consensus.
pub struct Analyzer {
    threshold: u32,
    tally: HashMap<SenseTriple, u32>,
    frozen: Option<SenseTriple>,
}

impl Analyzer {
    /// Construct an analyzer with the default threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    /// Construct an analyzer with an explicit threshold (primarily for
    /// tests).
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            threshold,
            tally: HashMap::new(),
            frozen: None,
        }
    }

    /// Pre-seed the analyzer with a statically configured triple, disabling
    /// further tallying. Used when the operator supplies both
    /// `sentinel_version` and `daemon_version` explicitly.
    pub fn freeze(&mut self, triple: SenseTriple) {
        self.frozen = Some(triple);
    }

    /// True once a triple has reached consensus (or was pre-frozen).
    pub fn is_done(&self) -> bool {
        self.frozen.is_some()
    }

    /// The frozen triple, if consensus has been reached.
    pub fn result(&self) -> Option<SenseTriple> {
        self.frozen
    }

    /// Record one observation. Returns `true` exactly once: on the call
    /// whose triple's tally reaches the threshold. All later calls are
    /// no-ops and return `false`.
    pub fn analyze_ping(&mut self, observed: SenseTriple) -> bool {
        if self.frozen.is_some() {
            return false;
        }
        let count = self.tally.entry(observed).or_insert(0);
        *count += 1;
        if *count >= self.threshold {
            self.frozen = Some(observed);
            return true;
        }
        false
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(a: bool, b: u32, c: u32) -> SenseTriple {
        SenseTriple {
            outpoint_form: a,
            sentinel_version: b,
            daemon_version: c,
        }
    }

    #[test]
    fn freezes_exactly_once_at_threshold() {
        let mut analyzer = Analyzer::with_threshold(3);
        let t = triple(true, 1, 2);
        assert!(!analyzer.analyze_ping(t));
        assert!(!analyzer.analyze_ping(t));
        assert!(analyzer.analyze_ping(t));
        assert!(analyzer.is_done());
        // Further observations, even of a different triple, are no-ops.
        assert!(!analyzer.analyze_ping(triple(false, 9, 9)));
        assert_eq!(analyzer.result(), Some(t));
    }

    #[test]
    fn competing_triples_tally_independently() {
        let mut analyzer = Analyzer::with_threshold(2);
        let a = triple(true, 1, 1);
        let b = triple(false, 2, 2);
        assert!(!analyzer.analyze_ping(a));
        assert!(!analyzer.analyze_ping(b));
        assert!(!analyzer.analyze_ping(b));
        // b reached 2 first.
        assert_eq!(analyzer.result(), Some(b));
    }

    #[test]
    fn freeze_short_circuits_tallying() {
        let mut analyzer = Analyzer::with_threshold(10);
        let t = triple(true, 7, 7);
        analyzer.freeze(t);
        assert!(analyzer.is_done());
        assert!(!analyzer.analyze_ping(triple(false, 1, 1)));
        assert_eq!(analyzer.result(), Some(t));
    }
}
