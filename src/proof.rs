// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic Proof Structures.

use alloc::string::{String, ToString};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::cid::Cid;
use crate::config::KERNEL_VERSION;
use crate::types::id::StreamId;

/// Receipt binding a stream's chain head to the state it folds into.
///
/// The head CID commits to every envelope before it, so two proofs with the
/// same `head_cid` and different `state_digest` mean the fold is not
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamProof {
    /// The version of the kernel protocol.
    pub kernel_version: u64,
    /// Aggregate type the state was folded with.
    pub aggregate: String,
    pub stream_id: StreamId,
    /// Number of envelopes folded.
    pub length: u64,
    pub head_cid: Option<Cid>,
    /// BLAKE3 digest of the materialized state.
    pub state_digest: [u8; 32],
}

impl StreamProof {
    /// Proof for `state`, folded from the first `length` envelopes of a stream
    /// whose envelope at `length - 1` has CID `head_cid`.
    pub fn of<A: Aggregate>(stream_id: StreamId, length: u64, head_cid: Option<Cid>, state: &A) -> Self {
        Self {
            kernel_version: KERNEL_VERSION,
            aggregate: A::KIND.to_string(),
            stream_id,
            length,
            head_cid,
            state_digest: state.digest(),
        }
    }

    /// True when both proofs describe the same history and the same state.
    pub fn matches(&self, other: &StreamProof) -> bool {
        self.kernel_version == other.kernel_version
            && self.aggregate == other.aggregate
            && self.stream_id == other.stream_id
            && self.length == other.length
            && self.head_cid == other.head_cid
            && self.state_digest == other.state_digest
    }
}
