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

//! Wire-facing data types shared across the codec, the peer store, and the
//! ping generator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::SystemTime;

/// A network address as carried in `addr` messages and the peer store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetAddress {
    /// IPv4 address. IPv6 peers are never stored (see `peer_store`).
    pub ip: Ipv4Addr,
    /// TCP port.
    pub port: u16,
    /// Advertised service bits.
    pub services: u64,
    /// Last time this address was seen, seconds since UNIX epoch.
    pub last_seen_unix: u64,
}

impl NetAddress {
    /// Age of this entry relative to `now`.
    pub fn age(&self, now: SystemTime) -> std::time::Duration {
        let now_unix = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        std::time::Duration::from_secs(now_unix.saturating_sub(self.last_seen_unix))
    }
}

/// A peer address held by the peer store or the persistent cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// IPv4 address.
    pub address: Ipv4Addr,
    /// TCP port.
    pub port: u16,
    /// Last time this peer was observed (seconds since UNIX epoch).
    pub last_seen_unix: u64,
}

impl Peer {
    /// Format as `ip:port`, the canonical peer-cache key.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

/// A single line of the masternode credentials file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasternodeEntry {
    /// Operator-chosen alias, used only for logging.
    pub alias: String,
    /// IPv4 address and port the masternode is announced under.
    pub address: std::net::SocketAddrV4,
    /// WIF-encoded masternode private key used to sign pings.
    pub private_key_wif: String,
    /// Collateral transaction id, hex encoded, big-endian display order.
    pub funding_txid: String,
    /// Collateral transaction output index.
    pub funding_output_index: u32,
}

/// Collateral outpoint identifying a masternode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    /// Transaction id, internal (big-endian display) byte order.
    pub txid: [u8; 32],
    /// Output index.
    pub index: u32,
}

impl Outpoint {
    /// Hex-encode `txid` in display order followed by `index` (matches the
    /// legacy signing message's `hex(outpoint)` field).
    pub fn to_hex(&self) -> String {
        format!("{}-{}", hex::encode(self.txid), self.index)
    }

    /// Little-endian wire encoding: `txid[32] || index[4]`.
    pub fn to_wire_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        let mut txid_le = self.txid;
        txid_le.reverse();
        out[..32].copy_from_slice(&txid_le);
        out[32..].copy_from_slice(&self.index.to_le_bytes());
        out
    }

    /// Stable string key for the broadcast store: `"{txid}:{index}"`.
    pub fn store_key(&self) -> String {
        format!("{}:{}", hex::encode(self.txid), self.index)
    }
}

/// A signed masternode liveness ping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodePing {
    /// Collateral outpoint this ping attests for.
    pub outpoint: Outpoint,
    /// Block hash used as a freshness anchor.
    pub block_hash: [u8; 32],
    /// Signing time, seconds since UNIX epoch.
    pub sig_time: i64,
    /// Encoded sentinel version (`a*10^6+b*10^3+c`).
    pub sentinel_version: u32,
    /// Encoded daemon version (`a*10^6+b*10^3+c`).
    pub daemon_version: u32,
    /// 65-byte compact recoverable ECDSA signature.
    pub signature: Vec<u8>,
}

/// A masternode broadcast announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodeBroadcast {
    /// Collateral outpoint.
    pub outpoint: Outpoint,
    /// Announced network address.
    pub address: NetAddress,
    /// Collateral (owner) public key, compressed SEC1 bytes.
    pub collateral_pubkey: Vec<u8>,
    /// Masternode (hot) public key, compressed SEC1 bytes.
    pub masternode_pubkey: Vec<u8>,
    /// 65-byte compact recoverable ECDSA signature over the broadcast.
    pub signature: Vec<u8>,
    /// Signing time, seconds since UNIX epoch.
    pub sig_time: i64,
    /// Protocol version the broadcasting node advertised.
    pub protocol_version: u32,
    /// Most recent ping carried alongside the broadcast, if any.
    pub last_ping: Option<MasternodePing>,
}

/// Encode a three-part version as `a*10^6 + b*10^3 + c`, the scheme used for
/// `sentinel_version`/`daemon_version` on the wire.
pub fn encode_version(major: u32, minor: u32, patch: u32) -> u32 {
    major * 1_000_000 + minor * 1_000 + patch
}

/// Decode a version integer back into its `(major, minor, patch)` parts.
pub fn decode_version(v: u32) -> (u32, u32, u32) {
    (v / 1_000_000, (v / 1_000) % 1_000, v % 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_round_trips() {
        assert_eq!(encode_version(1, 2, 3), 1_002_003);
        assert_eq!(decode_version(1_002_003), (1, 2, 3));
        assert_eq!(decode_version(0), (0, 0, 0));
    }

    #[test]
    fn outpoint_wire_bytes_are_little_endian_txid() {
        let mut txid = [0u8; 32];
        txid[0] = 0xAA;
        txid[31] = 0xBB;
        let op = Outpoint { txid, index: 7 };
        let wire = op.to_wire_bytes();
        assert_eq!(wire[0], 0xBB);
        assert_eq!(wire[31], 0xAA);
        assert_eq!(&wire[32..], &7u32.to_le_bytes());
    }

    #[test]
    fn peer_endpoint_format() {
        let p = Peer {
            address: Ipv4Addr::new(10, 0, 0, 1),
            port: 9999,
            last_seen_unix: 0,
        };
        assert_eq!(p.endpoint(), "10.0.0.1:9999");
    }
}
