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

//! The per-peer connection state machine: `Dialing -> Handshaking ->
//! Connected -> Syncing -> Live -> Closing -> Closed`.
//!
//! One Tokio task per dialed peer, `tokio::select!`-driven over the framed
//! socket, the inbound ping-forwarding channel, and the ping/idle timers —
//! the same task/channel/select shape the teacher uses for its single
//! libp2p swarm loop, generalized here to N independently dialed raw TCP
//! connections instead of one shared swarm.

use crate::core::types::{MasternodePing, NetAddress, Outpoint, Peer};
use crate::networking::events::{DaemonEvent, PeerRef};
use crate::networking::wire::codec::{Command, Frame, FrameCodec};
use crate::networking::wire::messages::{
    AddrPayload, DsegPayload, GetHeadersPayload, HeadersPayload, InvType, InventoryItem,
    InventoryPayload, MnBroadcastPayload, MnPingPayload, NoncePayload, VersionPayload,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Connection lifecycle state, logged on every transition (spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerState {
    /// Establishing the TCP connection.
    Dialing,
    /// Exchanging `version`/`verack`.
    Handshaking,
    /// Handshake complete; initial gossip/sync requests issued.
    Connected,
    /// Draining initial `headers`/`addr`/`dseg` responses.
    Syncing,
    /// Steady state: periodic pings, ongoing ping fan-out.
    Live,
    /// Shutting down; draining outbound work with a bounded budget.
    Closing,
    /// Socket closed, task about to exit.
    Closed,
}

/// Why a connection was torn down.
#[derive(Clone, Debug)]
pub enum CloseReason {
    /// TCP connect failed or timed out.
    DialError(String),
    /// Handshake or framing violated protocol expectations.
    ProtocolError(String),
    /// A read or write against the socket failed.
    IoError(String),
    /// No `pong` was received within the idle-ping timeout.
    PingTimeout,
    /// The inbound ping-forwarding channel closed (peer replaced/shutdown).
    ChannelClosed,
    /// The supervisor or shutdown sequence requested cancellation.
    Cancelled,
}

/// Static per-connection configuration, shared (read-only) across peers.
#[derive(Clone, Debug)]
pub struct PeerFsmConfig {
    /// Network magic bytes.
    pub magic: [u8; 4],
    /// Protocol version to advertise, and the floor a peer must meet.
    pub protocol_number: u32,
    /// User agent string advertised in `version`.
    pub user_agent: String,
    /// Locator hash used in the initial `getheaders` request.
    pub bootstrap_locator: [u8; 32],
    /// TCP connect timeout.
    pub dial_timeout: Duration,
    /// Time allowed for the full version/verack exchange.
    pub handshake_timeout: Duration,
    /// Steady-state ping cadence once `Live`.
    pub ping_interval: Duration,
    /// Idle time after which an unsolicited ping is sent to probe liveness.
    pub idle_ping_after: Duration,
    /// Time allowed for a `pong` to arrive after a ping before closing.
    pub pong_timeout: Duration,
}

impl Default for PeerFsmConfig {
    fn default() -> Self {
        Self {
            magic: [0xbf, 0x0c, 0x6b, 0xbd],
            protocol_number: 70_208,
            user_agent: "/phantomd:1.0.0/".to_string(),
            bootstrap_locator: [0u8; 32],
            dial_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(60),
            idle_ping_after: Duration::from_secs(120),
            pong_timeout: Duration::from_secs(120),
        }
    }
}

/// Whether outbound pings are wrapped as an `inv` announcement (awaiting
/// `getdata`) or pushed to the peer directly, per the auto-sense
/// `outpoint_form` signal (spec §9 open question, resolved in
/// `SPEC_FULL.md` §4.7): wrap while auto-sense has not yet closed; once
/// closed, honor the frozen flag.
#[derive(Default)]
pub struct ForwardingGate(AtomicU8);

const GATE_UNCLOSED: u8 = 0;
const GATE_WRAP: u8 = 1;
const GATE_DIRECT: u8 = 2;

impl ForwardingGate {
    /// Construct a gate in the "auto-sense still open" state.
    pub fn new() -> Self {
        Self(AtomicU8::new(GATE_UNCLOSED))
    }

    /// Freeze the gate once auto-sense has closed.
    pub fn close(&self, outpoint_form: bool) {
        self.0.store(
            if outpoint_form { GATE_DIRECT } else { GATE_WRAP },
            Ordering::SeqCst,
        );
    }

    /// True if outbound pings should be pushed directly rather than
    /// wrapped as an inventory announcement.
    pub fn should_push_direct(&self) -> bool {
        self.0.load(Ordering::SeqCst) == GATE_DIRECT
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn unspecified_addr() -> NetAddress {
    NetAddress {
        ip: Ipv4Addr::UNSPECIFIED,
        port: 0,
        services: 0,
        last_seen_unix: 0,
    }
}

fn frame(command: Command, payload: Vec<u8>) -> Frame {
    Frame { command, payload }
}

/// A peer slot's inbound ping queue, shared (not reallocated) across
/// successive occupants of the same connection slot so a disconnect never
/// loses a ping queued for whichever peer ends up in that slot next.
pub type SlotPingQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<MasternodePing>>>;

/// Unix timestamp (seconds) of this connection's last observed activity,
/// shared with the supervisor so the restart watchdog can apply spec
/// §4.11's "last-seen ≤ 20 minutes ago" staleness filter rather than
/// treating every open socket as active regardless of how long it has sat
/// idle.
pub type PeerActivity = Arc<AtomicI64>;

fn touch(activity: &PeerActivity) {
    activity.store(now_unix(), Ordering::SeqCst);
}

/// Drive one peer connection end to end, from dial through close. Returns
/// only after the socket is closed and a [`DaemonEvent::PeerDisconnect`]
/// has been posted.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    peer: Peer,
    cfg: Arc<PeerFsmConfig>,
    gate: Arc<ForwardingGate>,
    event_tx: mpsc::Sender<DaemonEvent>,
    ping_rx: SlotPingQueue,
    activity: PeerActivity,
    cancel: CancellationToken,
) {
    let peer_ref = PeerRef {
        address: peer.address,
        port: peer.port,
    };
    let mut state = PeerState::Dialing;
    info!(peer = %peer, ?state, "peer state transition");

    let stream = tokio::select! {
        result = timeout(cfg.dial_timeout, TcpStream::connect((peer.address, peer.port))) => {
            match result {
                Ok(Ok(s)) => s,
                Ok(Err(e)) => return close(peer, &event_tx, peer_ref, CloseReason::DialError(e.to_string())).await,
                Err(_) => return close(peer, &event_tx, peer_ref, CloseReason::DialError("dial timeout".to_string())).await,
            }
        }
        _ = cancel.cancelled() => return close(peer, &event_tx, peer_ref, CloseReason::Cancelled).await,
    };
    let _ = stream.set_nodelay(true);

    state = PeerState::Handshaking;
    info!(peer = %peer, ?state, "peer state transition");
    let mut framed = Framed::new(stream, FrameCodec::new(cfg.magic));

    let our_version = VersionPayload {
        protocol_version: cfg.protocol_number as i32,
        services: 0,
        timestamp: now_unix(),
        addr_recv: unspecified_addr(),
        addr_from: unspecified_addr(),
        nonce: rand::random(),
        user_agent: cfg.user_agent.clone(),
        start_height: 0,
    };
    if let Err(e) = framed
        .send(frame(Command::Version, our_version.encode()))
        .await
    {
        return close(peer, &event_tx, peer_ref, CloseReason::IoError(e.to_string())).await;
    }

    let handshake_result = timeout(cfg.handshake_timeout, async {
        let mut got_version = false;
        let mut got_verack = false;
        while !(got_version && got_verack) {
            let item = framed.next().await;
            match item {
                Some(Ok(f)) => match f.command {
                    Command::Version => {
                        let peer_version = VersionPayload::decode(&f.payload)
                            .map_err(|e| format!("bad version payload: {e}"))?;
                        if (peer_version.protocol_version as u32) < cfg.protocol_number {
                            return Err(format!(
                                "peer protocol {} below floor {}",
                                peer_version.protocol_version, cfg.protocol_number
                            ));
                        }
                        got_version = true;
                        framed
                            .send(frame(Command::VerAck, Vec::new()))
                            .await
                            .map_err(|e| e.to_string())?;
                    }
                    Command::VerAck => got_verack = true,
                    other => debug!(peer = %peer, ?other, "ignoring frame during handshake"),
                },
                Some(Err(e)) => return Err(e.to_string()),
                None => return Err("connection closed during handshake".to_string()),
            }
        }
        Ok(())
    })
    .await;

    match handshake_result {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => {
            return close(
                peer,
                &event_tx,
                peer_ref,
                CloseReason::ProtocolError(reason),
            )
            .await
        }
        Err(_) => {
            return close(
                peer,
                &event_tx,
                peer_ref,
                CloseReason::ProtocolError("handshake timed out".to_string()),
            )
            .await
        }
    }

    state = PeerState::Connected;
    info!(peer = %peer, ?state, "peer state transition");
    touch(&activity);

    let getaddr = framed.send(frame(Command::Addr, Vec::new())).await;
    let dseg = framed
        .send(frame(
            Command::DsegMnList,
            DsegPayload {
                filter: Outpoint {
                    txid: [0u8; 32],
                    index: 0,
                },
            }
            .encode(),
        ))
        .await;
    let getheaders = framed
        .send(frame(
            Command::GetHeaders,
            GetHeadersPayload {
                version: cfg.protocol_number,
                locator_hashes: vec![cfg.bootstrap_locator],
                hash_stop: [0u8; 32],
            }
            .encode(),
        ))
        .await;
    if getaddr.is_err() || dseg.is_err() || getheaders.is_err() {
        return close(
            peer,
            &event_tx,
            peer_ref,
            CloseReason::IoError("failed sending initial sync requests".to_string()),
        )
        .await;
    }

    state = PeerState::Syncing;
    info!(peer = %peer, ?state, "peer state transition");
    state = PeerState::Live;
    info!(peer = %peer, ?state, "peer entered steady state");

    let mut ping_ticker = interval(cfg.ping_interval);
    ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut awaiting_pong: Option<(u64, Instant)> = None;
    let mut pending_announced: HashMap<[u8; 32], MasternodePing> = HashMap::new();
    let mut last_activity = Instant::now();

    let close_reason = 'conn: loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break 'conn CloseReason::Cancelled,

            maybe_frame = framed.next() => {
                last_activity = Instant::now();
                touch(&activity);
                match maybe_frame {
                    Some(Ok(f)) => {
                        if let Err(reason) = handle_inbound(
                            &mut framed,
                            f,
                            &peer,
                            &event_tx,
                            &mut awaiting_pong,
                            &mut pending_announced,
                        ).await {
                            break 'conn reason;
                        }
                    }
                    Some(Err(e)) => break 'conn CloseReason::ProtocolError(e.to_string()),
                    None => break 'conn CloseReason::IoError("connection closed by peer".to_string()),
                }
            }

            maybe_ping = async { ping_rx.lock().await.recv().await } => {
                match maybe_ping {
                    Some(ping) => {
                        if let Err(e) = forward_ping(&mut framed, &gate, &mut pending_announced, ping).await {
                            break 'conn CloseReason::IoError(e);
                        }
                    }
                    None => break 'conn CloseReason::ChannelClosed,
                }
            }

            _ = ping_ticker.tick() => {
                if let Some((_, sent_at)) = awaiting_pong {
                    if sent_at.elapsed() > cfg.pong_timeout {
                        break 'conn CloseReason::PingTimeout;
                    }
                }
                if last_activity.elapsed() >= cfg.idle_ping_after || awaiting_pong.is_none() {
                    let nonce: u64 = rand::random();
                    if let Err(e) = framed
                        .send(frame(Command::Ping, NoncePayload { nonce }.encode()))
                        .await
                    {
                        break 'conn CloseReason::IoError(e.to_string());
                    }
                    awaiting_pong = Some((nonce, Instant::now()));
                }
            }
        }
    };

    state = PeerState::Closing;
    info!(peer = %peer, ?state, reason = ?close_reason, "peer closing");
    let _ = timeout(Duration::from_secs(5), framed.flush()).await;
    close(peer, &event_tx, peer_ref, close_reason).await;
}

async fn handle_inbound(
    framed: &mut Framed<TcpStream, FrameCodec>,
    f: Frame,
    peer: &Peer,
    event_tx: &mpsc::Sender<DaemonEvent>,
    awaiting_pong: &mut Option<(u64, Instant)>,
    pending_announced: &mut HashMap<[u8; 32], MasternodePing>,
) -> Result<(), CloseReason> {
    match f.command {
        Command::Ping => {
            let p = NoncePayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            framed
                .send(frame(Command::Pong, NoncePayload { nonce: p.nonce }.encode()))
                .await
                .map_err(|e| CloseReason::IoError(e.to_string()))?;
        }
        Command::Pong => {
            let p = NoncePayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            if awaiting_pong.map(|(n, _)| n) == Some(p.nonce) {
                *awaiting_pong = None;
            }
        }
        Command::Addr => {
            let p = AddrPayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            for addr in p.addresses {
                crate::networking::events::post(event_tx, DaemonEvent::NewAddr(addr));
            }
        }
        Command::Inv => {
            let p = InventoryPayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            for item in p.items {
                if item.kind == InvType::Block {
                    crate::networking::events::post(event_tx, DaemonEvent::NewBlock(item.hash));
                }
            }
        }
        Command::Headers => {
            let p = HeadersPayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            for header in p.headers {
                crate::networking::events::post(event_tx, DaemonEvent::NewBlock(header.hash()));
            }
        }
        Command::Block => {
            // This daemon never validates full blocks; only the header's
            // hash is of interest, and that already arrives via `inv`/
            // `headers`. Discard the payload.
        }
        Command::MnPing => {
            let ping = MnPingPayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            crate::networking::events::post(event_tx, DaemonEvent::NewMasternodePing(ping));
        }
        Command::MnBroadcast => {
            let b = MnBroadcastPayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            crate::networking::events::post(event_tx, DaemonEvent::NewMasternodeBroadcast(b));
        }
        Command::GetData => {
            let p = InventoryPayload::decode(&f.payload)
                .map_err(|e| CloseReason::ProtocolError(e.to_string()))?;
            for item in p.items {
                if item.kind == InvType::MnPing {
                    if let Some(ping) = pending_announced.remove(&item.hash) {
                        framed
                            .send(frame(Command::MnPing, MnPingPayload::encode(&ping)))
                            .await
                            .map_err(|e| CloseReason::IoError(e.to_string()))?;
                    }
                }
            }
        }
        Command::DsegMnList | Command::MnGet | Command::GetHeaders | Command::SporkSync => {
            // Requests this daemon doesn't serve (it holds no masternode
            // list or chain state of its own); acknowledged implicitly by
            // ignoring them, matching a node with nothing to answer.
            debug!(peer = %peer, command = ?f.command, "ignoring unserved request");
        }
        Command::Version | Command::VerAck => {
            debug!(peer = %peer, "unexpected post-handshake version/verack");
        }
        Command::Reject => {
            debug!(peer = %peer, "peer sent reject");
        }
        Command::Unknown(raw) => {
            debug!(peer = %peer, command = ?raw, "discarding unknown command");
        }
    }
    Ok(())
}

async fn forward_ping(
    framed: &mut Framed<TcpStream, FrameCodec>,
    gate: &ForwardingGate,
    pending_announced: &mut HashMap<[u8; 32], MasternodePing>,
    ping: MasternodePing,
) -> Result<(), String> {
    let encoded = MnPingPayload::encode(&ping);
    if gate.should_push_direct() {
        framed
            .send(frame(Command::MnPing, encoded))
            .await
            .map_err(|e| e.to_string())
    } else {
        let id_hash = crate::core::security::signing::double_sha256(&encoded);
        pending_announced.insert(id_hash, ping);
        framed
            .send(frame(
                Command::Inv,
                InventoryPayload {
                    items: vec![InventoryItem {
                        kind: InvType::MnPing,
                        hash: id_hash,
                    }],
                }
                .encode(),
            ))
            .await
            .map_err(|e| e.to_string())
    }
}

async fn close(
    peer: Peer,
    event_tx: &mpsc::Sender<DaemonEvent>,
    peer_ref: PeerRef,
    reason: CloseReason,
) {
    warn!(peer = %peer, ?reason, "peer connection closed");
    crate::networking::events::post(event_tx, DaemonEvent::PeerDisconnect(peer_ref));
}
