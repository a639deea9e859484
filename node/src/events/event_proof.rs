// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Proof - Audit Trail Generation
//!
//! Binds a stream's chain head to the digest of the state it folds into.
//!
//! # Guarantee
//! Same envelopes → same proof, on any architecture and whether the state
//! came from a snapshot or a full replay.

use cim_kernel::aggregate::Aggregate;
use cim_kernel::proof::StreamProof;

use crate::projection::Projection;

pub fn generate_proof<A: Aggregate>(projection: &Projection<A>) -> StreamProof {
    StreamProof::of(
        projection.stream_id.clone(),
        projection.length(),
        projection.head_cid,
        projection.state.as_ref(),
    )
}
