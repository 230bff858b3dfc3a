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

//! Prometheus metrics for the daemon's connection pool, signing cycle, and
//! auto-sense analyzer.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics registration errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric name collided with one already registered, or the
    /// underlying `prometheus` registry call otherwise failed.
    #[error("prometheus")]
    Prom,
}

/// All metrics the daemon exposes, registered against one [`Registry`].
#[derive(Clone)]
pub struct Metrics {
    /// Registry these metrics are bound to; served over HTTP by `main`.
    pub registry: Registry,

    /// Currently connected (live) peer slots.
    pub peers_connected: IntGauge,
    /// Signed liveness pings produced across all signing cycles.
    pub pings_signed_total: IntCounter,
    /// Pings successfully handed to a live peer for forwarding.
    pub pings_forwarded_total: IntCounter,
    /// 1 once the auto-sense analyzer has reached consensus (or was
    /// pre-frozen by static configuration), 0 until then.
    pub analyzer_consensus_reached: IntGauge,
    /// Current number of entries held in the broadcast store.
    pub broadcast_store_size: IntGauge,
    /// Number of times the restart watchdog has exited the process.
    pub watchdog_restarts_total: IntCounter,
}

impl Metrics {
    /// Construct and register every metric against a fresh [`Registry`].
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let peers_connected = IntGauge::new("phantomd_peers_connected", "Currently connected peers")
            .map_err(|_| MetricsError::Prom)?;
        let pings_signed_total = IntCounter::new(
            "phantomd_pings_signed_total",
            "Liveness pings signed across all cycles",
        )
        .map_err(|_| MetricsError::Prom)?;
        let pings_forwarded_total = IntCounter::new(
            "phantomd_pings_forwarded_total",
            "Pings handed to a live peer for forwarding",
        )
        .map_err(|_| MetricsError::Prom)?;
        let analyzer_consensus_reached = IntGauge::new(
            "phantomd_analyzer_consensus_reached",
            "1 once auto-sense has resolved a wire-format triple",
        )
        .map_err(|_| MetricsError::Prom)?;
        let broadcast_store_size = IntGauge::new(
            "phantomd_broadcast_store_size",
            "Entries currently held in the broadcast store",
        )
        .map_err(|_| MetricsError::Prom)?;
        let watchdog_restarts_total = IntCounter::new(
            "phantomd_watchdog_restarts_total",
            "Process exits requested by the restart watchdog",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(peers_connected.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(pings_signed_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(pings_forwarded_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(analyzer_consensus_reached.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(broadcast_store_size.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(watchdog_restarts_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            peers_connected,
            pings_signed_total,
            pings_forwarded_total,
            analyzer_consensus_reached,
            broadcast_store_size,
            watchdog_restarts_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_every_metric_without_name_collisions() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.registry.gather().len(), 6);
    }
}
