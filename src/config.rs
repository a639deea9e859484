// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Number of fractional bits for Fixed-Point representation (Q16.16).
pub const FRAC_BITS: u32 = 16;

/// Scaling factor for Fixed-Point representation (1 << FRAC_BITS).
pub const SCALE: i32 = 1 << FRAC_BITS;

/// Protocol version stamped into proofs.
pub const KERNEL_VERSION: u64 = 1;

/// Domain separation tag prepended to every CID preimage.
pub const CID_DOMAIN: &[u8] = b"cim-ledger/cid/v1";

/// Maximum size in bytes of an encoded event payload.
pub const MAX_PAYLOAD_BYTES: usize = 1 << 20;

/// Maximum length in bytes of an event type tag.
pub const MAX_EVENT_TYPE_LEN: usize = 128;

/// Maximum length in bytes of a stream identifier.
pub const MAX_STREAM_ID_LEN: usize = 256;

/// Node capacity of a single graph aggregate.
pub const MAX_GRAPH_NODES: usize = 10_000;

/// Edge capacity of a single graph aggregate.
pub const MAX_GRAPH_EDGES: usize = 100_000;
