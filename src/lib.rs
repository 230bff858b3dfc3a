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

//! phantomd - a phantom masternode liveness daemon for Dash-family
//! proof-of-service networks.
//!
//! This crate impersonates one or more masternodes by periodically
//! producing and broadcasting signed liveness pings over the P2P wire
//! protocol, without running a full node, wallet, or block-serving
//! workload. It provides:
//! - A hand-rolled magic-framed wire codec and per-command message types
//! - A per-peer connection state machine driven by `tokio::select!`
//! - An in-memory peer store, block-hash ring, broadcast store, and
//!   auto-sense analyzer, all owned by a single supervisor task
//! - A 10-minute signing cycle producing Bitcoin-style compact recoverable
//!   ECDSA signatures over the masternode liveness message
//! - A restart watchdog, DNS/remote-chain bootstrap clients, a
//!   `sled`-backed peer cache, and Prometheus metrics

/// Core protocol primitives (wire types, configuration, credentials
/// parsing, block-hash ring, broadcast store, auto-sense analyzer, signing).
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// P2P networking stack (wire codec, peer store, event bus, peer FSM,
/// bootstrap-time DNS/remote-chain clients).
pub mod networking;
/// The 10-minute masternode ping signing cycle.
pub mod ping_generator;
/// Best-effort on-disk persistence (the peer address cache).
pub mod storage;
/// The peer-pool supervisor, ping fan-out, and restart watchdog.
pub mod supervisor;
