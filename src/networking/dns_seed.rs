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

//! DNS seed resolution: turns configured seed hostnames into [`Peer`]
//! entries at the daemon's default port.
//!
//! A failure to resolve one seed is logged and does not prevent the
//! remaining seeds from being tried (`BootstrapError`, per spec §7).

use crate::core::types::Peer;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

/// Errors raised while resolving a single DNS seed.
#[derive(Debug, Error)]
pub enum DnsSeedError {
    /// The resolver could not be constructed from system configuration.
    #[error("building resolver: {0}")]
    ResolverInit(String),
    /// Lookup of a hostname failed (NXDOMAIN, timeout, etc.).
    #[error("resolving {hostname}: {source}")]
    Lookup {
        /// Hostname that failed to resolve.
        hostname: String,
        /// Underlying resolver error.
        #[source]
        source: hickory_resolver::error::ResolveError,
    },
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Resolve one DNS seed hostname to its A-record peers at `default_port`.
pub async fn resolve_seed(hostname: &str, default_port: u16) -> Result<Vec<Peer>, DnsSeedError> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let response = resolver
        .ipv4_lookup(hostname)
        .await
        .map_err(|source| DnsSeedError::Lookup {
            hostname: hostname.to_string(),
            source,
        })?;
    let now = now_unix();
    Ok(response
        .iter()
        .map(|record| Peer {
            address: record.0,
            port: default_port,
            last_seen_unix: now,
        })
        .collect())
}

/// Resolve every configured seed, logging and skipping any that fail.
/// Returns the union of peers discovered across all seeds that succeeded.
pub async fn resolve_all(hostnames: &[String], default_port: u16) -> Vec<Peer> {
    let mut peers = Vec::new();
    for hostname in hostnames {
        match resolve_seed(hostname, default_port).await {
            Ok(mut found) => peers.append(&mut found),
            Err(err) => warn!(%hostname, error = %err, "dns seed resolution failed"),
        }
    }
    peers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_all_skips_failing_seeds_without_aborting() {
        // "." is not a resolvable hostname; this exercises the
        // log-and-continue path without requiring network access in CI.
        let peers = resolve_all(&[".".to_string()], 9999).await;
        assert!(peers.is_empty());
    }
}
