// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Immutable event envelopes.

use serde::{Deserialize, Serialize};

use crate::cid::{compute_cid, Cid};
use crate::event::{DomainEvent, EventPayload};
use crate::error::KernelResult;
use crate::types::id::StreamId;
use crate::types::{Sequence, TimestampMs};

/// One entry of a stream: payload, its CID and the link to its predecessor.
///
/// For `sequence > 0`, `previous_cid` is the `cid` of the envelope at
/// `sequence - 1` in the same stream; for `sequence == 0` it is `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub stream_id: StreamId,
    pub sequence: Sequence,
    pub previous_cid: Option<Cid>,
    pub cid: Cid,
    pub payload: EventPayload,
    pub recorded_at: TimestampMs,
}

impl Envelope {
    /// Chains a payload onto `previous` and computes its CID.
    pub fn seal(
        stream_id: StreamId,
        sequence: Sequence,
        previous_cid: Option<Cid>,
        payload: EventPayload,
        recorded_at: TimestampMs,
    ) -> Self {
        let cid = compute_cid(&stream_id, sequence, previous_cid.as_ref(), &payload);
        Self {
            stream_id,
            sequence,
            previous_cid,
            cid,
            payload,
            recorded_at,
        }
    }

    /// Recomputes the CID from the envelope's own content.
    pub fn expected_cid(&self) -> Cid {
        compute_cid(&self.stream_id, self.sequence, self.previous_cid.as_ref(), &self.payload)
    }

    /// True when the stored CID matches the content.
    pub fn is_sealed_correctly(&self) -> bool {
        self.expected_cid() == self.cid
    }

    pub fn is_genesis(&self) -> bool {
        self.sequence == 0
    }

    pub fn event_type(&self) -> &str {
        &self.payload.event_type
    }

    /// Decodes the payload as a typed event.
    pub fn decode<E: DomainEvent>(&self) -> KernelResult<E> {
        self.payload.decode()
    }
}
