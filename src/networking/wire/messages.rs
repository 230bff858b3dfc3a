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

//! Per-command payload encoding, built on top of the frame codec in
//! [`super::codec`]. Payloads use the legacy Bitcoin-family wire
//! conventions (compact-size length prefixes, little-endian integers,
//! IPv4-mapped IPv6 addresses in `net_addr` entries) so this daemon's
//! frames are indistinguishable on the wire from a real masternode's.

use crate::core::security::signing::double_sha256;
use crate::core::types::{MasternodeBroadcast, MasternodePing, NetAddress, Outpoint};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors raised while decoding a message payload.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The payload ended before all expected fields were read.
    #[error("truncated payload")]
    Truncated,
    /// A length-prefixed field declared an implausible size.
    #[error("invalid length prefix")]
    BadLength,
    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 string field")]
    BadString,
}

type MResult<T> = Result<T, MessageError>;

/// A small byte cursor used by every payload decoder below.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> MResult<&'a [u8]> {
        if self.data.len() < self.pos + n {
            return Err(MessageError::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> MResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> MResult<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32_le(&mut self) -> MResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i32_le(&mut self) -> MResult<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64_le(&mut self) -> MResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64_le(&mut self) -> MResult<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bytes32(&mut self) -> MResult<[u8; 32]> {
        Ok(self.take(32)?.try_into().unwrap())
    }

    fn var_int(&mut self) -> MResult<u64> {
        let prefix = self.u8()?;
        Ok(match prefix {
            0xfd => self.u16_le()? as u64,
            0xfe => self.u32_le()? as u64,
            0xff => self.u64_le()?,
            n => n as u64,
        })
    }

    fn var_bytes(&mut self) -> MResult<&'a [u8]> {
        let len = self.var_int()?;
        if len > 32 * 1024 * 1024 {
            return Err(MessageError::BadLength);
        }
        self.take(len as usize)
    }

    fn var_string(&mut self) -> MResult<String> {
        let bytes = self.var_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| MessageError::BadString)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

fn put_var_int(out: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

fn put_var_string(out: &mut Vec<u8>, s: &str) {
    put_var_int(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

/// Encode a `net_addr` entry: `time[4] || services[8] || ip[16 mapped] || port[2 BE]`.
fn encode_net_addr(out: &mut Vec<u8>, time: u32, addr: &NetAddress) {
    out.extend_from_slice(&time.to_le_bytes());
    out.extend_from_slice(&addr.services.to_le_bytes());
    out.extend_from_slice(&addr.ip.to_ipv6_mapped().octets());
    out.extend_from_slice(&addr.port.to_be_bytes());
}

fn decode_net_addr(r: &mut Reader) -> MResult<(u32, NetAddress)> {
    let time = r.u32_le()?;
    let services = r.u64_le()?;
    let ip_bytes = r.take(16)?;
    let ip = match ip_bytes {
        [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, a, b, c, d] => Ipv4Addr::new(*a, *b, *c, *d),
        _ => Ipv4Addr::UNSPECIFIED,
    };
    let port = u16::from_be_bytes(r.take(2)?.try_into().unwrap());
    Ok((
        time,
        NetAddress {
            ip,
            port,
            services,
            last_seen_unix: time as u64,
        },
    ))
}

/// `version` message payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionPayload {
    /// Protocol version the sender speaks.
    pub protocol_version: i32,
    /// Advertised service bits.
    pub services: u64,
    /// Sender wall-clock time, seconds since UNIX epoch.
    pub timestamp: i64,
    /// Recipient's address as seen by the sender.
    pub addr_recv: NetAddress,
    /// Sender's own address.
    pub addr_from: NetAddress,
    /// Random nonce for self-connection detection.
    pub nonce: u64,
    /// User agent string.
    pub user_agent: String,
    /// Sender's best known block height.
    pub start_height: i32,
}

impl VersionPayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.protocol_version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        encode_net_addr(&mut out, 0, &self.addr_recv);
        encode_net_addr(&mut out, 0, &self.addr_from);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        put_var_string(&mut out, &self.user_agent);
        out.extend_from_slice(&self.start_height.to_le_bytes());
        out
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        let protocol_version = r.i32_le()?;
        let services = r.u64_le()?;
        let timestamp = r.i64_le()?;
        let (_, addr_recv) = decode_net_addr(&mut r)?;
        let (_, addr_from) = decode_net_addr(&mut r)?;
        let nonce = r.u64_le()?;
        let user_agent = r.var_string()?;
        let start_height = r.i32_le()?;
        Ok(Self {
            protocol_version,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
        })
    }
}

/// `ping`/`pong` payload: a single nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoncePayload {
    /// Echoed nonce.
    pub nonce: u64,
}

impl NoncePayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.nonce.to_le_bytes().to_vec()
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        Ok(Self { nonce: r.u64_le()? })
    }
}

/// `addr` payload: a list of peer addresses.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AddrPayload {
    /// Addresses, each with the time they were last seen.
    pub addresses: Vec<NetAddress>,
}

impl AddrPayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_var_int(&mut out, self.addresses.len() as u64);
        for addr in &self.addresses {
            encode_net_addr(&mut out, addr.last_seen_unix as u32, addr);
        }
        out
    }

    /// Decode from wire bytes. Entries whose IP is not a mapped IPv4
    /// address are dropped (IPv6 peers are never stored).
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        let count = r.var_int()?;
        if count > 10_000 {
            return Err(MessageError::BadLength);
        }
        let mut addresses = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (_, addr) = decode_net_addr(&mut r)?;
            if addr.ip != Ipv4Addr::UNSPECIFIED {
                addresses.push(addr);
            }
        }
        Ok(Self { addresses })
    }
}

/// Inventory item type, as carried in `inv`/`getdata`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvType {
    /// A transaction.
    Tx,
    /// A block.
    Block,
    /// A masternode liveness ping.
    MnPing,
    /// A masternode broadcast.
    MnBroadcast,
    /// Any other inventory type this daemon does not act on.
    Other(u32),
}

impl InvType {
    fn to_u32(self) -> u32 {
        match self {
            InvType::Tx => 1,
            InvType::Block => 2,
            InvType::MnBroadcast => 14,
            InvType::MnPing => 15,
            InvType::Other(n) => n,
        }
    }

    fn from_u32(n: u32) -> Self {
        match n {
            1 => InvType::Tx,
            2 => InvType::Block,
            14 => InvType::MnBroadcast,
            15 => InvType::MnPing,
            other => InvType::Other(other),
        }
    }
}

/// One `inv`/`getdata` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InventoryItem {
    /// What kind of object this refers to.
    pub kind: InvType,
    /// Object hash.
    pub hash: [u8; 32],
}

/// `inv` or `getdata` payload: a list of inventory items.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InventoryPayload {
    /// Inventory items, in wire order.
    pub items: Vec<InventoryItem>,
}

impl InventoryPayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_var_int(&mut out, self.items.len() as u64);
        for item in &self.items {
            out.extend_from_slice(&item.kind.to_u32().to_le_bytes());
            out.extend_from_slice(&item.hash);
        }
        out
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        let count = r.var_int()?;
        if count > 50_000 {
            return Err(MessageError::BadLength);
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let kind = InvType::from_u32(r.u32_le()?);
            let hash = r.bytes32()?;
            items.push(InventoryItem { kind, hash });
        }
        Ok(Self { items })
    }
}

/// `getheaders` payload: block locator hashes plus an optional stop hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetHeadersPayload {
    /// Protocol version of the requester.
    pub version: u32,
    /// Locator hashes, densest-first.
    pub locator_hashes: Vec<[u8; 32]>,
    /// Hash to stop at, or all-zero for "as many as possible".
    pub hash_stop: [u8; 32],
}

impl GetHeadersPayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        put_var_int(&mut out, self.locator_hashes.len() as u64);
        for h in &self.locator_hashes {
            out.extend_from_slice(h);
        }
        out.extend_from_slice(&self.hash_stop);
        out
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        let version = r.u32_le()?;
        let count = r.var_int()?;
        if count > 2_000 {
            return Err(MessageError::BadLength);
        }
        let mut locator_hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            locator_hashes.push(r.bytes32()?);
        }
        let hash_stop = r.bytes32()?;
        Ok(Self {
            version,
            locator_hashes,
            hash_stop,
        })
    }
}

/// A block header, the only part of `block`/`headers` payloads this daemon
/// inspects (it never validates or stores full blocks).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Raw 80-byte legacy header.
    pub raw: [u8; 80],
}

impl BlockHeader {
    /// The block hash: double-SHA-256 of the raw header, reversed to
    /// display (big-endian) byte order.
    pub fn hash(&self) -> [u8; 32] {
        let mut h = double_sha256(&self.raw);
        h.reverse();
        h
    }

    fn decode(r: &mut Reader) -> MResult<Self> {
        let raw: [u8; 80] = r.take(80)?.try_into().unwrap();
        Ok(Self { raw })
    }
}

/// `headers` payload: a list of block headers (each followed by a
/// transaction-count varint this daemon ignores).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct HeadersPayload {
    /// Headers, oldest first.
    pub headers: Vec<BlockHeader>,
}

impl HeadersPayload {
    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        let count = r.var_int()?;
        if count > 2_000 {
            return Err(MessageError::BadLength);
        }
        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            headers.push(BlockHeader::decode(&mut r)?);
            let _tx_count = r.var_int()?;
        }
        Ok(Self { headers })
    }
}

/// `block` payload: only the header is decoded; transaction bytes are kept
/// opaque since this daemon never validates blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPayload {
    /// The block's header.
    pub header: BlockHeader,
    /// Remaining bytes (transactions), kept opaque.
    pub rest: Vec<u8>,
}

impl BlockPayload {
    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        let header = BlockHeader::decode(&mut r)?;
        Ok(Self {
            header,
            rest: r.remaining().to_vec(),
        })
    }
}

fn encode_outpoint(out: &mut Vec<u8>, outpoint: &Outpoint) {
    out.extend_from_slice(&outpoint.to_wire_bytes());
}

fn decode_outpoint(r: &mut Reader) -> MResult<Outpoint> {
    let mut txid = r.bytes32()?;
    txid.reverse();
    let index = r.u32_le()?;
    Ok(Outpoint { txid, index })
}

/// `mnp` payload: a signed masternode liveness ping.
pub struct MnPingPayload;

impl MnPingPayload {
    /// Encode a [`MasternodePing`] to wire bytes.
    pub fn encode(ping: &MasternodePing) -> Vec<u8> {
        let mut out = Vec::new();
        encode_outpoint(&mut out, &ping.outpoint);
        let mut block_hash_le = ping.block_hash;
        block_hash_le.reverse();
        out.extend_from_slice(&block_hash_le);
        out.extend_from_slice(&ping.sig_time.to_le_bytes());
        put_var_int(&mut out, ping.signature.len() as u64);
        out.extend_from_slice(&ping.signature);
        out.extend_from_slice(&ping.sentinel_version.to_le_bytes());
        out.extend_from_slice(&ping.daemon_version.to_le_bytes());
        out
    }

    /// Decode a [`MasternodePing`] from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<MasternodePing> {
        let mut r = Reader::new(data);
        let outpoint = decode_outpoint(&mut r)?;
        let mut block_hash = r.bytes32()?;
        block_hash.reverse();
        let sig_time = r.i64_le()?;
        let signature = r.var_bytes()?.to_vec();
        let sentinel_version = r.u32_le()?;
        let daemon_version = r.u32_le()?;
        Ok(MasternodePing {
            outpoint,
            block_hash,
            sig_time,
            sentinel_version,
            daemon_version,
            signature,
        })
    }
}

/// `mnb` payload: a masternode broadcast.
pub struct MnBroadcastPayload;

impl MnBroadcastPayload {
    /// Encode a [`MasternodeBroadcast`] to wire bytes.
    pub fn encode(b: &MasternodeBroadcast) -> Vec<u8> {
        let mut out = Vec::new();
        encode_outpoint(&mut out, &b.outpoint);
        encode_net_addr(&mut out, b.address.last_seen_unix as u32, &b.address);
        put_var_int(&mut out, b.collateral_pubkey.len() as u64);
        out.extend_from_slice(&b.collateral_pubkey);
        put_var_int(&mut out, b.masternode_pubkey.len() as u64);
        out.extend_from_slice(&b.masternode_pubkey);
        put_var_int(&mut out, b.signature.len() as u64);
        out.extend_from_slice(&b.signature);
        out.extend_from_slice(&b.sig_time.to_le_bytes());
        out.extend_from_slice(&b.protocol_version.to_le_bytes());
        match &b.last_ping {
            Some(ping) => {
                out.push(1);
                out.extend_from_slice(&MnPingPayload::encode(ping));
            }
            None => out.push(0),
        }
        out
    }

    /// Decode a [`MasternodeBroadcast`] from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<MasternodeBroadcast> {
        let mut r = Reader::new(data);
        let outpoint = decode_outpoint(&mut r)?;
        let (_, address) = decode_net_addr(&mut r)?;
        let collateral_pubkey = r.var_bytes()?.to_vec();
        let masternode_pubkey = r.var_bytes()?.to_vec();
        let signature = r.var_bytes()?.to_vec();
        let sig_time = r.i64_le()?;
        let protocol_version = r.u32_le()?;
        let has_ping = r.u8()? != 0;
        let last_ping = if has_ping {
            Some(MnPingPayload::decode(r.remaining())?)
        } else {
            None
        };
        Ok(MasternodeBroadcast {
            outpoint,
            address,
            collateral_pubkey,
            masternode_pubkey,
            signature,
            sig_time,
            protocol_version,
            last_ping,
        })
    }
}

/// `dseg` payload: request the masternode list, optionally filtered to one
/// outpoint (all-zero outpoint means "send the full list").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DsegPayload {
    /// Outpoint filter; all-zero means unfiltered.
    pub filter: Outpoint,
}

impl DsegPayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_outpoint(&mut out, &self.filter);
        out
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        Ok(Self {
            filter: decode_outpoint(&mut r)?,
        })
    }
}

/// `mnget` payload: request a single masternode ping by outpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MnGetPayload {
    /// Outpoint being requested.
    pub outpoint: Outpoint,
}

impl MnGetPayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_outpoint(&mut out, &self.outpoint);
        out
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        Ok(Self {
            outpoint: decode_outpoint(&mut r)?,
        })
    }
}

/// `ssc` (spork sync complete) payload: a count of sporks the peer sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SporkSyncPayload {
    /// Number of spork entries the peer has sent this session.
    pub count: u32,
}

impl SporkSyncPayload {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.count.to_le_bytes().to_vec()
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        Ok(Self {
            count: r.u32_le()?,
        })
    }
}

/// `reject` payload: rejection of a previously sent message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectPayload {
    /// Command of the rejected message.
    pub message: String,
    /// Reject code.
    pub code: u8,
    /// Human-readable reason.
    pub reason: String,
}

impl RejectPayload {
    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> MResult<Self> {
        let mut r = Reader::new(data);
        let message = r.var_string()?;
        let code = r.u8()?;
        let reason = r.var_string()?;
        Ok(Self {
            message,
            code,
            reason,
        })
    }
}
