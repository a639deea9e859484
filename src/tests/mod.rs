// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod fxp_tests;
pub mod cid_tests;
pub mod chain_tests;
pub mod proof_tests;

use crate::envelope::Envelope;
use crate::event::{DomainEvent, EventPayload};
use crate::types::id::StreamId;
use std::vec::Vec;

/// Seals `events` into a well-formed chain for `stream`.
pub(crate) fn chain_of<E: DomainEvent>(stream: &str, events: &[E]) -> Vec<Envelope> {
    let stream_id = StreamId::new(stream).unwrap();
    let mut out: Vec<Envelope> = Vec::new();
    for (i, event) in events.iter().enumerate() {
        let payload = EventPayload::encode(event).unwrap();
        let previous = out.last().map(|e| e.cid);
        out.push(Envelope::seal(stream_id.clone(), i as u64, previous, payload, 1_700_000_000_000 + i as u64));
    }
    out
}
