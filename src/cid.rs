// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Content identifiers.
//!
//! A CID is the BLAKE3 digest of an envelope's canonical preimage:
//!
//! ```text
//! CID_DOMAIN
//! stream_id   (u32 LE length + UTF-8)
//! sequence    (u64 LE)
//! previous    (0x00 | 0x01 + 32 bytes)
//! event_type  (u32 LE length + UTF-8)
//! data        (u32 LE length + bytes)
//! ```
//!
//! `recorded_at` is not part of the preimage: two envelopes with identical
//! content and position carry the same CID no matter when they were written.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::config::CID_DOMAIN;
use crate::event::EventPayload;
use crate::types::id::StreamId;
use crate::types::Sequence;

/// 32-byte BLAKE3 content identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cid(pub [u8; 32]);

impl Cid {
    pub const LEN: usize = 32;

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for b in self.0.iter() {
            out.push(hex_digit(b >> 4));
            out.push(hex_digit(b & 0x0f));
        }
        out
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 64 {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, pair) in bytes.chunks_exact(2).enumerate() {
            out[i] = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
        }
        Some(Cid(out))
    }
}

fn hex_digit(v: u8) -> char {
    match v {
        0..=9 => (b'0' + v) as char,
        _ => (b'a' + v - 10) as char,
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self)
    }
}

impl FromStr for Cid {
    type Err = crate::error::KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::from_hex(s).ok_or(crate::error::KernelError::InvalidOperation("malformed cid"))
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Cid::from_hex(&s).ok_or_else(|| de::Error::custom("invalid cid hex"))
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Cid)
        }
    }
}

/// Builds the canonical byte preimage of an envelope.
pub fn canonical_preimage(
    stream_id: &StreamId,
    sequence: Sequence,
    previous: Option<&Cid>,
    payload: &EventPayload,
) -> Vec<u8> {
    let event_type = payload.event_type.as_bytes();
    let mut buf = Vec::with_capacity(
        CID_DOMAIN.len() + 4 + stream_id.as_str().len() + 8 + 33 + 4 + event_type.len() + 4 + payload.data.len(),
    );
    buf.extend_from_slice(CID_DOMAIN);
    push_len_prefixed(&mut buf, stream_id.as_str().as_bytes());
    buf.extend_from_slice(&sequence.to_le_bytes());
    match previous {
        Some(prev) => {
            buf.push(1);
            buf.extend_from_slice(&prev.0);
        }
        None => buf.push(0),
    }
    push_len_prefixed(&mut buf, event_type);
    push_len_prefixed(&mut buf, &payload.data);
    buf
}

fn push_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Computes the content identifier of an envelope's canonical preimage.
pub fn compute_cid(
    stream_id: &StreamId,
    sequence: Sequence,
    previous: Option<&Cid>,
    payload: &EventPayload,
) -> Cid {
    let preimage = canonical_preimage(stream_id, sequence, previous, payload);
    Cid(*blake3::hash(&preimage).as_bytes())
}
