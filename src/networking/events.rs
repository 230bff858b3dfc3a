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

//! The single inbound event stream carrying tagged messages from every peer
//! FSM to the supervisor.
//!
//! Many producers (one per live peer), one consumer (the supervisor). The
//! channel is bounded at [`EVENT_BUS_CAPACITY`]; producers use `try_send`
//! so a saturated bus never blocks a peer's read loop — the event is
//! dropped and the peer logs at debug level instead.

use crate::core::types::{MasternodeBroadcast, MasternodePing, NetAddress};
use std::net::Ipv4Addr;
use tokio::sync::mpsc;

/// Event bus buffer depth; absorbs bursts from many peers without forcing
/// producers to block.
pub const EVENT_BUS_CAPACITY: usize = 1500;

/// Identifies which live peer an event originated from, or is targeted at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerRef {
    /// Peer's IPv4 address.
    pub address: Ipv4Addr,
    /// Peer's TCP port.
    pub port: u16,
}

/// One tagged event posted by a peer FSM to the supervisor.
#[derive(Clone, Debug)]
pub enum DaemonEvent {
    /// A masternode liveness ping observed on the wire.
    NewMasternodePing(MasternodePing),
    /// A masternode broadcast observed on the wire.
    NewMasternodeBroadcast(MasternodeBroadcast),
    /// A new block hash observed via `inv` or `headers`.
    NewBlock([u8; 32]),
    /// A new peer address observed via `addr` gossip.
    NewAddr(NetAddress),
    /// A peer's connection has closed.
    PeerDisconnect(PeerRef),
}

/// Construct a fresh event bus with the standard capacity.
pub fn channel() -> (mpsc::Sender<DaemonEvent>, mpsc::Receiver<DaemonEvent>) {
    mpsc::channel(EVENT_BUS_CAPACITY)
}

/// Post an event without blocking; silently drops the event (the caller is
/// expected to log at debug level) if the bus is saturated.
pub fn post(sender: &mpsc::Sender<DaemonEvent>, event: DaemonEvent) -> bool {
    sender.try_send(event).is_ok()
}
