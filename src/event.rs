// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Type-tagged event payloads.
//!
//! Every domain event travels as an `EventPayload`: a type tag plus the
//! bincode (standard config) encoding of the typed event. The bytes are what
//! the CID commits to, so the encoding must be canonical:
//! - No floats (Q16.16 `FxpScalar` only)
//! - No hash maps (`BTreeMap` only)
//! - No timestamps beyond those the event itself carries

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_EVENT_TYPE_LEN, MAX_PAYLOAD_BYTES};
use crate::error::{EncodingFault, KernelResult};

/// A typed domain event that can be folded by an aggregate.
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Stable tag of this variant, recorded next to the encoded bytes.
    fn event_type(&self) -> &'static str;
}

/// Canonical, type-tagged payload of an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_type: String,
    pub data: Vec<u8>,
}

impl EventPayload {
    /// Encodes a typed event into its canonical payload.
    pub fn encode<E: DomainEvent>(event: &E) -> KernelResult<Self> {
        let data = bincode::serde::encode_to_vec(event, bincode::config::standard())
            .map_err(|_| EncodingFault::Serialize)?;
        Self::from_parts(event.event_type(), data)
    }

    /// Builds a payload from an already encoded body, validating its bounds.
    pub fn from_parts(event_type: impl Into<String>, data: Vec<u8>) -> KernelResult<Self> {
        let event_type = event_type.into();
        if event_type.is_empty() {
            return Err(EncodingFault::EmptyEventType.into());
        }
        if event_type.len() > MAX_EVENT_TYPE_LEN {
            return Err(EncodingFault::EventTypeTooLong.into());
        }
        if data.len() > MAX_PAYLOAD_BYTES {
            return Err(EncodingFault::PayloadTooLarge.into());
        }
        Ok(Self { event_type, data })
    }

    /// Decodes the payload back into a typed event.
    ///
    /// Fails if the bytes do not decode exactly or the decoded variant
    /// disagrees with the recorded tag.
    pub fn decode<E: DomainEvent>(&self) -> KernelResult<E> {
        let (event, read): (E, usize) =
            bincode::serde::decode_from_slice(&self.data, bincode::config::standard())
                .map_err(|_| EncodingFault::Deserialize)?;
        if read != self.data.len() {
            return Err(EncodingFault::TrailingBytes.into());
        }
        if event.event_type() != self.event_type {
            return Err(EncodingFault::UnknownEventType.into());
        }
        Ok(event)
    }

    pub fn len(&self) -> usize {
        self.event_type.len() + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
