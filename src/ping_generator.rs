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

//! The 10-minute signing cycle: re-reads the masternode credentials file,
//! signs one liveness ping per entry, and hands each off to the supervisor
//! for fan-out across live peers.
//!
//! Only runs once the auto-sense analyzer has closed (or was pre-frozen by
//! static `sentinel_version`/`daemon_version` configuration) — the
//! supervisor is responsible for not starting this loop before then.

use crate::core::analyzer::SenseTriple;
use crate::core::block_ring::{BlockRing, CAPACITY};
use crate::core::masternode_conf;
use crate::core::security::signing::{
    decode_wif, legacy_signing_bytes, outpoint_signing_bytes, sign_message, SignError,
};
use crate::core::types::{MasternodePing, Outpoint};
use crate::monitoring::metrics::Metrics;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cycle period: 10 minutes plus 5 seconds of slack, matching the upstream
/// daemon's `time.Sleep((time.Minute * 10) + (time.Second * 5))`.
pub const CYCLE_INTERVAL: Duration = Duration::from_secs(10 * 60 + 5);

/// A single masternode entry's signing failure. Logged and skipped; never
/// aborts the rest of the cycle.
#[derive(Debug, Error)]
enum PingCycleError {
    #[error("funding_txid is not 32 bytes of hex: {0}")]
    BadTxid(String),
    #[error("decoding private key: {0}")]
    BadKey(#[from] SignError),
}

/// Static, ambient configuration for the signing cycle.
#[derive(Clone, Debug)]
pub struct PingGeneratorConfig {
    /// Path to the masternode credentials file, re-read every cycle.
    pub masternode_conf_path: String,
    /// Prefix used in both signing message forms.
    pub magic_message: String,
    /// Whether the magic message is newline-terminated before the rest of
    /// the signing payload.
    pub magic_message_newline: bool,
    /// Cycle period; defaults to [`CYCLE_INTERVAL`].
    pub cycle_interval: Duration,
}

impl Default for PingGeneratorConfig {
    fn default() -> Self {
        Self {
            masternode_conf_path: "masternode.conf".to_string(),
            magic_message: "DarkNet Signed Message:".to_string(),
            magic_message_newline: true,
            cycle_interval: CYCLE_INTERVAL,
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn parse_txid(hex_str: &str) -> Result<[u8; 32], PingCycleError> {
    let bytes =
        hex::decode(hex_str).map_err(|_| PingCycleError::BadTxid(hex_str.to_string()))?;
    if bytes.len() != 32 {
        return Err(PingCycleError::BadTxid(hex_str.to_string()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn sign_one(
    cfg: &PingGeneratorConfig,
    sense: SenseTriple,
    entry: &crate::core::types::MasternodeEntry,
    block_hash: [u8; 32],
    sig_time: i64,
) -> Result<MasternodePing, PingCycleError> {
    let txid = parse_txid(&entry.funding_txid)?;
    let outpoint = Outpoint {
        txid,
        index: entry.funding_output_index,
    };
    let address_string = entry.address.to_string();
    let message_bytes = if sense.outpoint_form {
        outpoint_signing_bytes(
            &cfg.magic_message,
            cfg.magic_message_newline,
            &address_string,
            sig_time,
            &outpoint.to_wire_bytes(),
            &block_hash,
        )
    } else {
        legacy_signing_bytes(
            &cfg.magic_message,
            cfg.magic_message_newline,
            &address_string,
            sig_time,
            &outpoint.to_hex(),
            &hex::encode(block_hash),
        )
    };
    let decoded = decode_wif(&entry.private_key_wif)?;
    let signature = sign_message(&decoded.secret_key, &message_bytes).to_vec();
    Ok(MasternodePing {
        outpoint,
        block_hash,
        sig_time,
        sentinel_version: sense.sentinel_version,
        daemon_version: sense.daemon_version,
        signature,
    })
}

/// Run one signing cycle immediately, returning the number of pings
/// produced. Exposed separately from [`run`] so the supervisor and tests
/// can drive a single cycle deterministically.
pub fn run_cycle(
    cfg: &PingGeneratorConfig,
    sense: SenseTriple,
    block_ring: &Mutex<BlockRing>,
    ping_tx: &mpsc::Sender<MasternodePing>,
) -> usize {
    let block_hash = {
        let ring = block_ring.lock().expect("block ring mutex poisoned");
        if !ring.is_full() {
            debug!("skipping ping cycle: block ring not yet at full depth");
            return 0;
        }
        match ring.top_minus_k(CAPACITY - 1) {
            Some(h) => h,
            None => return 0,
        }
    };

    let parsed = match masternode_conf::load(&cfg.masternode_conf_path) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to read masternode credentials file");
            return 0;
        }
    };
    for malformed in &parsed.malformed {
        warn!(
            line = malformed.line_number,
            reason = %malformed.reason,
            "skipping malformed masternode.conf line"
        );
    }

    let sig_time = now_unix();
    let mut signed = 0usize;
    for entry in &parsed.entries {
        match sign_one(cfg, sense, entry, block_hash, sig_time) {
            Ok(ping) => {
                if ping_tx.try_send(ping).is_err() {
                    warn!(alias = %entry.alias, "ping channel full, dropping signed ping");
                } else {
                    signed += 1;
                }
            }
            Err(err) => warn!(alias = %entry.alias, error = %err, "skipping masternode entry"),
        }
    }
    signed
}

/// Drive the signing cycle forever, honoring `cancel` between cycles.
pub async fn run(
    cfg: PingGeneratorConfig,
    sense: SenseTriple,
    block_ring: Arc<Mutex<BlockRing>>,
    ping_tx: mpsc::Sender<MasternodePing>,
    cancel: CancellationToken,
    metrics: Arc<Metrics>,
) {
    info!(?sense, "ping generator starting");
    loop {
        let signed = run_cycle(&cfg, sense, &block_ring, &ping_tx);
        metrics.pings_signed_total.inc_by(signed as u64);
        info!(signed, "ping cycle complete");
        tokio::select! {
            _ = tokio::time::sleep(cfg.cycle_interval) => {}
            _ = cancel.cancelled() => {
                info!("ping generator stopping");
                return;
            }
        }
    }
}
