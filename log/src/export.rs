// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! JSON-friendly listings of a stream's chain.

use cim_kernel::cid::Cid;
use cim_kernel::envelope::Envelope;
use cim_kernel::types::id::StreamId;
use cim_kernel::types::Sequence;
use serde::Serialize;

/// One envelope as listed in a [`StreamExport`].
#[derive(Debug, Clone, Serialize)]
pub struct ExportedEnvelope {
    pub sequence: Sequence,
    pub cid: Cid,
    pub previous_cid: Option<Cid>,
    pub event_type: String,
    pub data_len: usize,
    pub recorded_at: u64,
}

impl From<&Envelope> for ExportedEnvelope {
    fn from(e: &Envelope) -> Self {
        Self {
            sequence: e.sequence,
            cid: e.cid,
            previous_cid: e.previous_cid,
            event_type: e.payload.event_type.clone(),
            data_len: e.payload.data.len(),
            recorded_at: e.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamExport {
    pub stream_id: StreamId,
    /// Length of the whole stream, not of `envelopes`.
    pub length: u64,
    pub head_cid: Option<Cid>,
    pub sealed: bool,
    /// Set when only the ancestry of this envelope was exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cid: Option<Cid>,
    pub envelopes: Vec<ExportedEnvelope>,
}

impl StreamExport {
    /// Export of a whole stream.
    pub fn full<'a, I>(stream_id: StreamId, envelopes: I, sealed: bool) -> Self
    where
        I: IntoIterator<Item = &'a Envelope>,
    {
        let envelopes: Vec<ExportedEnvelope> = envelopes.into_iter().map(ExportedEnvelope::from).collect();
        Self {
            stream_id,
            length: envelopes.len() as u64,
            head_cid: envelopes.last().map(|e| e.cid),
            sealed,
            root_cid: None,
            envelopes,
        }
    }
}
