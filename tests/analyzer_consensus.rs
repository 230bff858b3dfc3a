// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use phantomd::core::analyzer::{Analyzer, SenseTriple};
use proptest::prelude::*;

fn triple(tag: u8) -> SenseTriple {
    SenseTriple {
        outpoint_form: tag % 2 == 0,
        sentinel_version: tag as u32,
        daemon_version: tag as u32,
    }
}

proptest! {
    /// Invariant 3: regardless of how many distinct triples are observed,
    /// `analyze_ping` returns `true` exactly once, and every observation
    /// afterwards — whatever triple it carries — leaves the result frozen.
    #[test]
    fn consensus_is_reached_exactly_once_and_then_frozen(
        noise in proptest::collection::vec(0u8..5, 0..50),
        winner_tag in 0u8..5,
        trailing in proptest::collection::vec(0u8..5, 0..20),
    ) {
        let threshold = 10;
        let mut analyzer = Analyzer::with_threshold(threshold);
        let winner = triple(winner_tag);

        // Observe noise first -- none of it alone reaches the threshold.
        for tag in &noise {
            if *tag != winner_tag {
                analyzer.analyze_ping(triple(*tag));
            }
        }
        prop_assert!(!analyzer.is_done());

        let mut true_count = 0;
        for _ in 0..threshold {
            if analyzer.analyze_ping(winner) {
                true_count += 1;
            }
        }
        prop_assert_eq!(true_count, 1);
        prop_assert!(analyzer.is_done());
        prop_assert_eq!(analyzer.result(), Some(winner));

        for tag in trailing {
            prop_assert!(!analyzer.analyze_ping(triple(tag)));
            prop_assert_eq!(analyzer.result(), Some(winner));
        }
    }
}

#[test]
fn static_freeze_disables_tallying_immediately() {
    let mut analyzer = Analyzer::new();
    let configured = SenseTriple {
        outpoint_form: true,
        sentinel_version: 1_020_000,
        daemon_version: 1_070_200,
    };
    analyzer.freeze(configured);
    assert!(analyzer.is_done());
    assert_eq!(analyzer.result(), Some(configured));
    // Even a flood of a competing triple cannot unfreeze it.
    let other = SenseTriple {
        outpoint_form: false,
        sentinel_version: 1,
        daemon_version: 1,
    };
    for _ in 0..50 {
        assert!(!analyzer.analyze_ping(other));
    }
    assert_eq!(analyzer.result(), Some(configured));
}
