// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use libsecp256k1::{PublicKey, SecretKey};
use phantomd::core::security::signing::{
    legacy_signing_bytes, outpoint_signing_bytes, sign_message, verify_message,
};
use phantomd::core::types::{MasternodePing, Outpoint};
use phantomd::networking::wire::messages::MnPingPayload;

fn secret_key(seed: u8) -> SecretKey {
    SecretKey::parse_slice(&[seed.max(1); 32]).expect("valid scalar")
}

/// Invariant 4: a `MasternodePing` signed against a given block hash
/// verifies under ECDSA-recover for both the legacy and outpoint signing
/// forms, and the ping itself round-trips through the codec byte-for-byte.
#[test]
fn ping_signed_under_legacy_form_verifies_and_round_trips() {
    let sk = secret_key(0x11);
    let pk = PublicKey::from_secret_key(&sk);

    let outpoint = Outpoint {
        txid: [0xAA; 32],
        index: 3,
    };
    let block_hash = [0xBB; 32];
    let sig_time = 1_700_000_000i64;

    let message = legacy_signing_bytes(
        "DarkNet Signed Message:",
        true,
        "XcollateralAddressPlaceholder",
        sig_time,
        &outpoint.to_hex(),
        &hex::encode(block_hash),
    );
    let signature = sign_message(&sk, &message);
    assert!(verify_message(&message, &signature, &pk).unwrap());

    let ping = MasternodePing {
        outpoint,
        block_hash,
        sig_time,
        sentinel_version: 1_020_000,
        daemon_version: 1_070_200,
        signature: signature.to_vec(),
    };
    let decoded = MnPingPayload::decode(&MnPingPayload::encode(&ping)).unwrap();
    assert_eq!(decoded, ping);
    assert!(verify_message(&message, &decoded.signature, &pk).unwrap());
}

#[test]
fn ping_signed_under_outpoint_form_verifies_and_round_trips() {
    let sk = secret_key(0x22);
    let pk = PublicKey::from_secret_key(&sk);

    let outpoint = Outpoint {
        txid: [0xCC; 32],
        index: 7,
    };
    let block_hash = [0xDD; 32];
    let sig_time = 1_700_000_500i64;

    let message = outpoint_signing_bytes(
        "DarkNet Signed Message:",
        true,
        "XcollateralAddressPlaceholder",
        sig_time,
        &outpoint.to_wire_bytes(),
        &block_hash,
    );
    let signature = sign_message(&sk, &message);
    assert!(verify_message(&message, &signature, &pk).unwrap());

    let ping = MasternodePing {
        outpoint,
        block_hash,
        sig_time,
        sentinel_version: 1_020_000,
        daemon_version: 1_070_200,
        signature: signature.to_vec(),
    };
    let decoded = MnPingPayload::decode(&MnPingPayload::encode(&ping)).unwrap();
    assert_eq!(decoded, ping);
}

#[test]
fn legacy_and_outpoint_signatures_do_not_cross_verify() {
    let sk = secret_key(0x33);
    let pk = PublicKey::from_secret_key(&sk);
    let outpoint = Outpoint {
        txid: [1u8; 32],
        index: 0,
    };
    let block_hash = [2u8; 32];

    let legacy_msg = legacy_signing_bytes(
        "m", true, "addr", 1, &outpoint.to_hex(), &hex::encode(block_hash),
    );
    let outpoint_msg =
        outpoint_signing_bytes("m", true, "addr", 1, &outpoint.to_wire_bytes(), &block_hash);

    let legacy_sig = sign_message(&sk, &legacy_msg);
    // A signature produced over the legacy message must not verify against
    // the differently-shaped outpoint-form message.
    assert!(!verify_message(&outpoint_msg, &legacy_sig, &pk).unwrap());
}

#[test]
fn verify_rejects_a_wrong_public_key() {
    let sk = secret_key(0x44);
    let wrong_pk = PublicKey::from_secret_key(&secret_key(0x55));
    let message = b"masternode liveness".to_vec();
    let signature = sign_message(&sk, &message);
    assert!(!verify_message(&message, &signature, &wrong_pk).unwrap());
}
