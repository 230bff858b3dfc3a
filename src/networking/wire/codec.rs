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

//! Frame-level wire codec.
//!
//! ```text
//! magic[4] || command[12, null padded ascii] || length[4 LE u32] || checksum[4] || payload[length]
//! ```
//!
//! `checksum` is the first 4 bytes of `double_sha256(payload)`. Frames
//! larger than [`MAX_PAYLOAD_LEN`] are rejected before the payload is even
//! buffered, so a malicious `length` field cannot be used to exhaust memory.

use crate::core::security::signing::double_sha256;
use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Header size: magic(4) + command(12) + length(4) + checksum(4).
const HEADER_LEN: usize = 24;
/// Refuse payloads larger than this; no message in the supported command
/// set legitimately approaches it.
pub const MAX_PAYLOAD_LEN: u32 = 32 * 1024 * 1024;

/// Errors the frame codec can raise.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame magic did not match the configured network.
    #[error("bad magic bytes")]
    BadMagic,
    /// Payload checksum did not match the header.
    #[error("checksum mismatch")]
    BadChecksum,
    /// Declared payload length exceeded [`MAX_PAYLOAD_LEN`].
    #[error("oversized payload: {0} bytes")]
    OversizedPayload(u32),
    /// Command bytes were not valid ASCII / not null-padded correctly.
    #[error("malformed command field")]
    BadCommand,
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Commands carried in the 12-byte command field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Version,
    VerAck,
    Ping,
    Pong,
    Addr,
    Inv,
    GetData,
    GetHeaders,
    Headers,
    Block,
    MnPing,
    MnBroadcast,
    DsegMnList,
    MnGet,
    SporkSync,
    Reject,
    /// A command byte sequence this daemon does not recognize. Carries the
    /// raw bytes for logging; never fatal to the connection.
    Unknown([u8; 12]),
}

impl Command {
    /// All commands with a fixed byte representation, used for lookup.
    const KNOWN: &'static [(Command, &'static [u8])] = &[
        (Command::Version, b"version"),
        (Command::VerAck, b"verack"),
        (Command::Ping, b"ping"),
        (Command::Pong, b"pong"),
        (Command::Addr, b"addr"),
        (Command::Inv, b"inv"),
        (Command::GetData, b"getdata"),
        (Command::GetHeaders, b"getheaders"),
        (Command::Headers, b"headers"),
        (Command::Block, b"block"),
        (Command::MnPing, b"mnp"),
        (Command::MnBroadcast, b"mnb"),
        (Command::DsegMnList, b"dseg"),
        (Command::MnGet, b"mnget"),
        (Command::SporkSync, b"ssc"),
        (Command::Reject, b"reject"),
    ];

    /// Encode as a null-padded 12-byte ASCII field.
    pub fn to_bytes(self) -> [u8; 12] {
        let name: &[u8] = match self {
            Command::Unknown(raw) => return raw,
            other => Self::KNOWN
                .iter()
                .find(|(c, _)| *c == other)
                .map(|(_, n)| *n)
                .unwrap_or(b""),
        };
        let mut out = [0u8; 12];
        out[..name.len()].copy_from_slice(name);
        out
    }

    /// Decode a 12-byte command field, falling back to [`Command::Unknown`]
    /// for unrecognized commands rather than failing the parse.
    pub fn from_bytes(raw: [u8; 12]) -> Command {
        for (cmd, name) in Self::KNOWN {
            let mut padded = [0u8; 12];
            padded[..name.len()].copy_from_slice(name);
            if padded == raw {
                return *cmd;
            }
        }
        Command::Unknown(raw)
    }
}

/// A fully parsed (or about-to-be-sent) wire frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Command identifying the payload shape.
    pub command: Command,
    /// Raw, not-yet-decoded payload bytes.
    pub payload: Vec<u8>,
}

/// Stateless frame codec parameterized by the network's magic bytes.
/// Implements [`tokio_util::codec::Decoder`]/[`Encoder`] so callers can wrap
/// a `TcpStream` in `Framed<TcpStream, FrameCodec>`.
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    magic: [u8; 4],
}

impl FrameCodec {
    /// Construct a codec bound to `magic`.
    pub fn new(magic: [u8; 4]) -> Self {
        Self { magic }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        if frame.payload.len() > MAX_PAYLOAD_LEN as usize {
            return Err(CodecError::OversizedPayload(frame.payload.len() as u32));
        }
        let checksum = double_sha256(&frame.payload);
        dst.reserve(HEADER_LEN + frame.payload.len());
        dst.put_slice(&self.magic);
        dst.put_slice(&frame.command.to_bytes());
        dst.put_u32_le(frame.payload.len() as u32);
        dst.put_slice(&checksum[..4]);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let magic = &src[0..4];
        if magic != self.magic {
            return Err(CodecError::BadMagic);
        }

        let mut command_bytes = [0u8; 12];
        command_bytes.copy_from_slice(&src[4..16]);

        let length = u32::from_le_bytes(src[16..20].try_into().unwrap());
        if length > MAX_PAYLOAD_LEN {
            return Err(CodecError::OversizedPayload(length));
        }

        let mut checksum_prefix = [0u8; 4];
        checksum_prefix.copy_from_slice(&src[20..24]);

        let total_len = HEADER_LEN + length as usize;
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        let payload = src[HEADER_LEN..total_len].to_vec();
        let actual_checksum = double_sha256(&payload);
        // Consume the frame before reporting a checksum failure: a
        // corrupted frame must not be re-examined on the next poll, or a
        // single bad checksum would wedge the stream in an infinite loop.
        src.advance(total_len);
        if actual_checksum[..4] != checksum_prefix {
            return Err(CodecError::BadChecksum);
        }

        Ok(Some(Frame {
            command: Command::from_bytes(command_bytes),
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: [u8; 4] = [0xbf, 0x0c, 0x6b, 0xbd];

    #[test]
    fn command_round_trips_through_bytes() {
        for (cmd, _) in Command::KNOWN {
            let bytes = cmd.to_bytes();
            assert_eq!(Command::from_bytes(bytes), *cmd);
        }
    }

    #[test]
    fn unknown_command_is_non_fatal() {
        let raw = *b"mysterycmd\0\0";
        assert_eq!(Command::from_bytes(raw), Command::Unknown(raw));
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let mut codec = FrameCodec::new(MAGIC);
        let mut buf = BytesMut::new();
        let frame = Frame {
            command: Command::Ping,
            payload: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        codec.encode(frame.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.command, frame.command);
        assert_eq!(decoded.payload, frame.payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_full_frame() {
        let mut codec = FrameCodec::new(MAGIC);
        let mut buf = BytesMut::new();
        let mut full = BytesMut::new();
        codec
            .encode(
                Frame {
                    command: Command::Pong,
                    payload: vec![9; 16],
                },
                &mut full,
            )
            .unwrap();
        buf.extend_from_slice(&full[..HEADER_LEN + 4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&full[HEADER_LEN + 4..]);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut codec = FrameCodec::new(MAGIC);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&[0u8; 20]);
        assert!(matches!(codec.decode(&mut buf), Err(CodecError::BadMagic)));
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let mut codec = FrameCodec::new(MAGIC);
        let mut buf = BytesMut::new();
        codec
            .encode(
                Frame {
                    command: Command::Addr,
                    payload: vec![1, 2, 3],
                },
                &mut buf,
            )
            .unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::BadChecksum)
        ));
        // The corrupted frame must be consumed, not left to be re-decoded.
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_length_is_rejected_before_buffering() {
        let mut codec = FrameCodec::new(MAGIC);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&Command::Block.to_bytes());
        buf.put_u32_le(MAX_PAYLOAD_LEN + 1);
        buf.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::OversizedPayload(_))
        ));
    }
}
