// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use bytes::BytesMut;
use phantomd::networking::wire::codec::{Command, Frame, FrameCodec};
use phantomd::networking::wire::messages::{MnPingPayload, VersionPayload};
use phantomd::core::types::{MasternodePing, NetAddress, Outpoint};
use proptest::prelude::*;
use std::net::Ipv4Addr;
use tokio_util::codec::{Decoder, Encoder};

const MAGIC: [u8; 4] = [0xbf, 0x0c, 0x6b, 0xbd];

proptest! {
    /// Invariant 5 (well-formed half): for any payload, `decode(encode(m))`
    /// reproduces the command and payload bytes exactly.
    #[test]
    fn well_formed_frame_round_trips(
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let mut codec = FrameCodec::new(MAGIC);
        let mut buf = BytesMut::new();
        let frame = Frame { command: Command::Block, payload: payload.clone() };
        codec.encode(frame, &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        prop_assert_eq!(decoded.payload, payload);
        prop_assert!(buf.is_empty());
    }

    /// Invariant 5 (corrupted half): flipping any single payload byte
    /// produces `BadChecksum` and still consumes the frame, so a stream of
    /// frames can't wedge on one corruption.
    #[test]
    fn corrupted_checksum_is_rejected_and_consumed(
        payload in proptest::collection::vec(any::<u8>(), 1..256),
        flip_index in 0usize..256,
    ) {
        prop_assume!(flip_index < payload.len());
        let mut codec = FrameCodec::new(MAGIC);
        let mut buf = BytesMut::new();
        codec
            .encode(Frame { command: Command::Ping, payload: payload.clone() }, &mut buf)
            .unwrap();
        // Payload starts right after the 24-byte header.
        let byte_offset = 24 + flip_index;
        buf[byte_offset] ^= 0xFF;
        let result = codec.decode(&mut buf);
        prop_assert!(matches!(
            result,
            Err(phantomd::networking::wire::codec::CodecError::BadChecksum)
        ));
        prop_assert!(buf.is_empty());
    }
}

#[test]
fn full_frame_carries_a_version_payload_end_to_end() {
    let mut codec = FrameCodec::new(MAGIC);
    let mut buf = BytesMut::new();
    let version = VersionPayload {
        protocol_version: 70_208,
        services: 0,
        timestamp: 1_700_000_000,
        addr_recv: NetAddress {
            ip: Ipv4Addr::new(127, 0, 0, 1),
            port: 9999,
            services: 0,
            last_seen_unix: 0,
        },
        addr_from: NetAddress {
            ip: Ipv4Addr::new(127, 0, 0, 1),
            port: 9999,
            services: 0,
            last_seen_unix: 0,
        },
        nonce: 0x1234_5678,
        user_agent: "/phantomd:1.0.0/".to_string(),
        start_height: 0,
    };
    codec
        .encode(
            Frame {
                command: Command::Version,
                payload: version.encode(),
            },
            &mut buf,
        )
        .unwrap();
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.command, Command::Version);
    assert_eq!(VersionPayload::decode(&frame.payload).unwrap(), version);
}

#[test]
fn full_frame_carries_a_masternode_ping_end_to_end() {
    let mut codec = FrameCodec::new(MAGIC);
    let mut buf = BytesMut::new();
    let ping = MasternodePing {
        outpoint: Outpoint {
            txid: [5u8; 32],
            index: 2,
        },
        block_hash: [6u8; 32],
        sig_time: 1_700_000_500,
        sentinel_version: 1_020_000,
        daemon_version: 1_070_200,
        signature: vec![9u8; 65],
    };
    codec
        .encode(
            Frame {
                command: Command::MnPing,
                payload: MnPingPayload::encode(&ping),
            },
            &mut buf,
        )
        .unwrap();
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.command, Command::MnPing);
    assert_eq!(MnPingPayload::decode(&frame.payload).unwrap(), ping);
}

#[test]
fn two_frames_back_to_back_decode_independently() {
    let mut codec = FrameCodec::new(MAGIC);
    let mut buf = BytesMut::new();
    codec
        .encode(Frame { command: Command::Ping, payload: vec![1, 2, 3] }, &mut buf)
        .unwrap();
    codec
        .encode(Frame { command: Command::Pong, payload: vec![4, 5, 6] }, &mut buf)
        .unwrap();
    let first = codec.decode(&mut buf).unwrap().unwrap();
    let second = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(first.command, Command::Ping);
    assert_eq!(second.command, Command::Pong);
    assert!(buf.is_empty());
}
