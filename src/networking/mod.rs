#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: the wire codec, peer address store, event bus, per-peer
//! connection FSM, and the bootstrap-time DNS/remote-chain clients.

pub mod dns_seed;
pub mod events;
pub mod peer_fsm;
pub mod peer_store;
pub mod remote_chain;
pub mod wire;
