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

//! The masternode ping/broadcast signing contract.
//!
//! Both the legacy and outpoint signing forms hash their message bytes with
//! double SHA-256 and sign the digest with ECDSA over secp256k1, producing
//! a 65-byte compact recoverable signature: `recid + 27` followed by the
//! big-endian `r` and `s` scalars. This is the "Bitcoin signmessage"
//! format, not a DER signature.

use libsecp256k1::{Message, PublicKey, SecretKey};
use ring::digest::{digest, SHA256};
use thiserror::Error;

/// Errors produced while decoding keys or signing/verifying pings.
#[derive(Debug, Error)]
pub enum SignError {
    /// The WIF string was not valid base58check.
    #[error("invalid WIF encoding")]
    BadWifEncoding,
    /// The WIF checksum did not match its payload.
    #[error("WIF checksum mismatch")]
    BadWifChecksum,
    /// The decoded WIF payload had an unexpected length.
    #[error("invalid WIF payload length: {0}")]
    BadWifLength(usize),
    /// The private key bytes did not form a valid secp256k1 scalar.
    #[error("invalid secp256k1 private key")]
    BadPrivateKey,
    /// The signature bytes did not form a valid compact recoverable signature.
    #[error("invalid compact signature")]
    BadSignature,
    /// Recovering the public key from a signature failed.
    #[error("signature recovery failed")]
    RecoveryFailed,
}

/// A decoded WIF private key plus the `compressed` flag recorded alongside it.
pub struct DecodedWif {
    /// Raw 32-byte secp256k1 private key.
    pub secret_key: SecretKey,
    /// Whether the WIF encodes a compressed-public-key hint.
    pub compressed: bool,
}

/// Decode a Base58Check WIF-encoded private key (version byte ignored,
/// since this daemon is coin-agnostic and never derives addresses for
/// display).
pub fn decode_wif(wif: &str) -> Result<DecodedWif, SignError> {
    let raw = bs58::decode(wif)
        .with_check(None)
        .into_vec()
        .map_err(|_| SignError::BadWifEncoding)?;
    // bs58's with_check strips the leading version byte check digit space
    // but keeps the version byte itself as raw[0].
    if raw.len() < 2 {
        return Err(SignError::BadWifLength(raw.len()));
    }
    let payload = &raw[1..];
    let (key_bytes, compressed) = match payload.len() {
        33 if payload[32] == 0x01 => (&payload[..32], true),
        32 => (payload, false),
        other => return Err(SignError::BadWifLength(other)),
    };
    let secret_key = SecretKey::parse_slice(key_bytes).map_err(|_| SignError::BadPrivateKey)?;
    Ok(DecodedWif {
        secret_key,
        compressed,
    })
}

/// Double SHA-256, the hash function used throughout the wire protocol.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let once = digest(&SHA256, data);
    let twice = digest(&SHA256, once.as_ref());
    let mut out = [0u8; 32];
    out.copy_from_slice(twice.as_ref());
    out
}

/// Build the legacy-form signing message:
/// `magic_message || address_string || sig_time_decimal_string || hex(outpoint) || block_hash_hex`.
pub fn legacy_signing_bytes(
    magic_message: &str,
    magic_message_newline: bool,
    address_string: &str,
    sig_time: i64,
    outpoint_hex: &str,
    block_hash_hex: &str,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(magic_message.as_bytes());
    if magic_message_newline {
        out.push(b'\n');
    }
    out.extend_from_slice(address_string.as_bytes());
    out.extend_from_slice(sig_time.to_string().as_bytes());
    out.extend_from_slice(outpoint_hex.as_bytes());
    out.extend_from_slice(block_hash_hex.as_bytes());
    out
}

/// Build the outpoint-form signing message: the legacy message with its
/// final two fields replaced by `txid[32 LE] || vout[4 LE] || block_hash[32 LE]`.
pub fn outpoint_signing_bytes(
    magic_message: &str,
    magic_message_newline: bool,
    address_string: &str,
    sig_time: i64,
    outpoint_wire_bytes: &[u8; 36],
    block_hash: &[u8; 32],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(magic_message.as_bytes());
    if magic_message_newline {
        out.push(b'\n');
    }
    out.extend_from_slice(address_string.as_bytes());
    out.extend_from_slice(sig_time.to_string().as_bytes());
    out.extend_from_slice(outpoint_wire_bytes);
    let mut block_hash_le = *block_hash;
    block_hash_le.reverse();
    out.extend_from_slice(&block_hash_le);
    out
}

/// Sign a double-SHA-256 digest, producing a 65-byte compact recoverable
/// signature (`recid + 27 || r[32] || s[32]`).
pub fn sign_compact(secret_key: &SecretKey, digest32: &[u8; 32]) -> [u8; 65] {
    let message = Message::parse(digest32);
    let (signature, recovery_id) = libsecp256k1::sign(&message, secret_key);
    let sig_bytes = signature.serialize();
    let mut out = [0u8; 65];
    out[0] = recovery_id.serialize() + 27;
    out[1..].copy_from_slice(&sig_bytes);
    out
}

/// Recover the signer's public key from a compact recoverable signature
/// over `digest32`.
pub fn recover_compact(digest32: &[u8; 32], signature: &[u8]) -> Result<PublicKey, SignError> {
    if signature.len() != 65 {
        return Err(SignError::BadSignature);
    }
    let recid_byte = signature[0];
    if !(27..=34).contains(&recid_byte) {
        return Err(SignError::BadSignature);
    }
    let recovery_id = libsecp256k1::RecoveryId::parse((recid_byte - 27) % 4)
        .map_err(|_| SignError::BadSignature)?;
    let sig = libsecp256k1::Signature::parse_standard_slice(&signature[1..])
        .map_err(|_| SignError::BadSignature)?;
    let message = Message::parse(digest32);
    libsecp256k1::recover(&message, &sig, &recovery_id).map_err(|_| SignError::RecoveryFailed)
}

/// Sign a masternode ping/broadcast message end to end: hash then sign.
pub fn sign_message(secret_key: &SecretKey, message_bytes: &[u8]) -> [u8; 65] {
    sign_compact(secret_key, &double_sha256(message_bytes))
}

/// Verify that `signature` recovers to `expected_pubkey` over `message_bytes`.
pub fn verify_message(
    message_bytes: &[u8],
    signature: &[u8],
    expected_pubkey: &PublicKey,
) -> Result<bool, SignError> {
    let digest32 = double_sha256(message_bytes);
    let recovered = recover_compact(&digest32, signature)?;
    Ok(recovered.serialize_compressed() == expected_pubkey.serialize_compressed())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_secret_key() -> SecretKey {
        SecretKey::parse_slice(&[0x11; 32]).unwrap()
    }

    #[test]
    fn sign_and_verify_round_trips() {
        let sk = sample_secret_key();
        let pk = PublicKey::from_secret_key(&sk);
        let msg = legacy_signing_bytes(
            "DarkNet Signed Message:",
            true,
            "XaddressPlaceholder",
            1_700_000_000,
            "abcd-0",
            "deadbeef",
        );
        let sig = sign_message(&sk, &msg);
        assert_eq!(sig.len(), 65);
        assert!(verify_message(&msg, &sig, &pk).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let sk = sample_secret_key();
        let pk = PublicKey::from_secret_key(&sk);
        let msg = b"hello masternode".to_vec();
        let sig = sign_message(&sk, &msg);
        let mut tampered = msg.clone();
        tampered[0] ^= 0xFF;
        assert!(!verify_message(&tampered, &sig, &pk).unwrap());
    }

    #[test]
    fn recid_offset_is_bitcoin_style() {
        let sk = sample_secret_key();
        let sig = sign_message(&sk, b"anything");
        assert!(sig[0] >= 27 && sig[0] <= 34);
    }

    #[test]
    fn outpoint_form_differs_from_legacy_form() {
        let mut txid = [0u8; 32];
        txid[0] = 1;
        let wire = crate::core::types::Outpoint { txid, index: 0 }.to_wire_bytes();
        let block_hash = [2u8; 32];
        let legacy = legacy_signing_bytes(
            "m", true, "addr", 1, "abcd-0", &hex::encode(block_hash),
        );
        let outpoint = outpoint_signing_bytes("m", true, "addr", 1, &wire, &block_hash);
        assert_ne!(legacy, outpoint);
    }
}
