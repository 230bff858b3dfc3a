// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use futures::{SinkExt, StreamExt};
use phantomd::core::types::{NetAddress, Peer};
use phantomd::networking::events::DaemonEvent;
use phantomd::networking::peer_fsm::{self, ForwardingGate, PeerFsmConfig};
use std::sync::atomic::AtomicI64;
use phantomd::networking::wire::codec::{Command, Frame, FrameCodec};
use phantomd::networking::wire::messages::VersionPayload;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

fn fsm_config() -> PeerFsmConfig {
    PeerFsmConfig {
        dial_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        ping_interval: Duration::from_millis(200),
        idle_ping_after: Duration::from_millis(100),
        pong_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn loopback_version(protocol_number: u32) -> VersionPayload {
    VersionPayload {
        protocol_version: protocol_number as i32,
        services: 0,
        timestamp: 1_700_000_000,
        addr_recv: NetAddress {
            ip: Ipv4Addr::new(127, 0, 0, 1),
            port: 0,
            services: 0,
            last_seen_unix: 0,
        },
        addr_from: NetAddress {
            ip: Ipv4Addr::new(127, 0, 0, 1),
            port: 0,
            services: 0,
            last_seen_unix: 0,
        },
        nonce: 0x1122_3344,
        user_agent: "/fake-peer:1.0.0/".to_string(),
        start_height: 1000,
    }
}

/// S2 bootstrap-handshake scenario: against a fake peer that completes the
/// version/verack exchange, the FSM reaches `Connected` and issues the
/// expected follow-up requests (`getaddr`, `dseg`, `getheaders`) before
/// settling into its steady-state ping loop.
#[tokio::test]
async fn handshake_reaches_connected_and_issues_sync_requests() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cfg = Arc::new(fsm_config());

    let fake_peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::new(cfg_magic()));

        let first = framed.next().await.unwrap().unwrap();
        assert_eq!(first.command, Command::Version);
        let their_version = VersionPayload::decode(&first.payload).unwrap();
        assert_eq!(their_version.protocol_version as u32, 70_208);

        framed
            .send(Frame {
                command: Command::Version,
                payload: loopback_version(70_210).encode(),
            })
            .await
            .unwrap();
        framed
            .send(Frame {
                command: Command::VerAck,
                payload: Vec::new(),
            })
            .await
            .unwrap();

        // Drain the verack our side sends in response to our version, then
        // the initial sync requests.
        let mut seen = Vec::new();
        while seen.len() < 4 {
            let f = framed.next().await.unwrap().unwrap();
            seen.push(f.command);
        }
        seen
    });

    let peer = Peer {
        address: addr.ip().to_string().parse().unwrap(),
        port: addr.port(),
        last_seen_unix: 0,
    };
    let gate = Arc::new(ForwardingGate::new());
    let (event_tx, mut event_rx) = mpsc::channel(8);
    let (_ping_tx, ping_rx) = mpsc::channel(8);
    let ping_rx = Arc::new(tokio::sync::Mutex::new(ping_rx));
    let activity = Arc::new(AtomicI64::new(0));
    let cancel = CancellationToken::new();
    let cancel_for_run = cancel.clone();

    let run_handle = tokio::spawn(peer_fsm::run(
        peer,
        cfg,
        gate,
        event_tx,
        ping_rx,
        activity,
        cancel_for_run,
    ));

    let seen = tokio::time::timeout(Duration::from_secs(2), fake_peer)
        .await
        .expect("handshake completed within 2s")
        .unwrap();
    assert!(seen.contains(&Command::VerAck));
    assert!(seen.contains(&Command::Addr));
    assert!(seen.contains(&Command::DsegMnList));
    assert!(seen.contains(&Command::GetHeaders));

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), run_handle).await;
    let event = event_rx.recv().await.unwrap();
    assert!(matches!(event, DaemonEvent::PeerDisconnect(_)));
}

fn cfg_magic() -> [u8; 4] {
    PeerFsmConfig::default().magic
}

/// S5 peer-replacement scenario: when a live peer's socket drops, the FSM
/// emits exactly one `PeerDisconnect` for that endpoint and the event bus
/// carries no further events for it, matching the supervisor's "replace
/// within one tick" contract (the supervisor itself is exercised via its
/// own in-module `maintain_pool` tests; this confirms the FSM side of the
/// handoff: termination is clean and single-shot).
#[tokio::test]
async fn dropped_socket_emits_a_single_peer_disconnect() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cfg = Arc::new(fsm_config());

    let fake_peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Accept then immediately drop the connection, simulating a dead peer.
        drop(stream);
    });

    let peer = Peer {
        address: addr.ip().to_string().parse().unwrap(),
        port: addr.port(),
        last_seen_unix: 0,
    };
    let gate = Arc::new(ForwardingGate::new());
    let (event_tx, mut event_rx) = mpsc::channel(8);
    let (_ping_tx, ping_rx) = mpsc::channel(8);
    let ping_rx = Arc::new(tokio::sync::Mutex::new(ping_rx));
    let activity = Arc::new(AtomicI64::new(0));
    let cancel = CancellationToken::new();

    // Run concurrently with the fake peer: the FSM must dial in before the
    // fake peer's `accept()` can return.
    let (run_result, accept_result) = tokio::join!(
        peer_fsm::run(peer, cfg, gate, event_tx, ping_rx, activity, cancel),
        fake_peer
    );
    accept_result.unwrap();
    let _ = run_result;

    let event = tokio::time::timeout(Duration::from_secs(2), event_rx.recv())
        .await
        .expect("disconnect event delivered")
        .unwrap();
    assert!(matches!(event, DaemonEvent::PeerDisconnect(_)));
    // Exactly one event for this peer: the channel has nothing else queued.
    assert!(event_rx.try_recv().is_err());
}
