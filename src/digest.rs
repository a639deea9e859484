// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canonical BLAKE3 state digests.
//!
//! Same state, same digest, on every architecture. Fields are fed in a fixed
//! order with explicit length prefixes and presence markers; maps are walked
//! in key order.

use crate::dialog::metrics::MetricsPolicy;
use crate::dialog::state::DialogState;
use crate::graph::state::GraphState;
use crate::types::attrs::{AttrValue, Attributes};
use crate::config::KERNEL_VERSION;

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_attrs(hasher: &mut blake3::Hasher, attrs: &Attributes) {
    hasher.update(&(attrs.len() as u64).to_le_bytes());
    for (key, value) in attrs.iter() {
        hash_str(hasher, key);
        match value {
            AttrValue::Text(s) => {
                hasher.update(&[0]);
                hash_str(hasher, s);
            }
            AttrValue::Int(i) => {
                hasher.update(&[1]);
                hasher.update(&i.to_le_bytes());
            }
            AttrValue::Bool(b) => {
                hasher.update(&[2, *b as u8]);
            }
            AttrValue::Fixed(f) => {
                hasher.update(&[3]);
                hasher.update(&f.0.to_le_bytes());
            }
        }
    }
}

fn hash_opt_u64(hasher: &mut blake3::Hasher, v: Option<u64>) {
    match v {
        Some(v) => {
            hasher.update(&[1]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Digest of a graph aggregate.
///
/// Covers version, metadata, nodes with attributes and adjacency heads, and
/// edges with endpoints, attributes and list links.
pub fn graph_state_hash(state: &GraphState) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"graph");
    hasher.update(&KERNEL_VERSION.to_le_bytes());
    hasher.update(&state.version.0.to_le_bytes());

    hasher.update(&[state.meta.created as u8]);
    hash_str(&mut hasher, &state.meta.name);
    hasher.update(&(state.meta.tags.len() as u64).to_le_bytes());
    for tag in state.meta.tags.iter() {
        hash_str(&mut hasher, tag);
    }

    hasher.update(&(state.nodes.len() as u64).to_le_bytes());
    for node in state.nodes.iter() {
        hasher.update(&node.id.0.to_le_bytes());
        hasher.update(&[node.kind as u8]);
        hash_attrs(&mut hasher, &node.attributes);
        hash_opt_u64(&mut hasher, node.first_out_edge.map(|e| e.0));
    }

    hasher.update(&(state.edges.len() as u64).to_le_bytes());
    for edge in state.edges.iter() {
        hasher.update(&edge.id.0.to_le_bytes());
        hasher.update(&[edge.kind as u8]);
        hasher.update(&edge.from.0.to_le_bytes());
        hasher.update(&edge.to.0.to_le_bytes());
        hash_attrs(&mut hasher, &edge.attributes);
        hash_opt_u64(&mut hasher, edge.next_out.map(|e| e.0));
    }

    *hasher.finalize().as_bytes()
}

/// Digest of a dialog aggregate, including its derived metrics.
pub fn dialog_state_hash<P: MetricsPolicy>(state: &DialogState<P>) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"dialog");
    hasher.update(&KERNEL_VERSION.to_le_bytes());
    hash_str(&mut hasher, P::NAME);
    hasher.update(&state.version.0.to_le_bytes());

    hasher.update(&[state.started as u8, state.closed as u8]);
    hash_str(&mut hasher, &state.title);
    match &state.model {
        Some(m) => {
            hasher.update(&[1]);
            hash_str(&mut hasher, m);
        }
        None => {
            hasher.update(&[0]);
        }
    }
    hasher.update(&(state.tags.len() as u64).to_le_bytes());
    for tag in state.tags.iter() {
        hash_str(&mut hasher, tag);
    }

    hasher.update(&(state.turns.len() as u64).to_le_bytes());
    for turn in state.turns.iter() {
        hasher.update(&turn.id.0.to_le_bytes());
        hasher.update(&[turn.role as u8]);
        hash_str(&mut hasher, &turn.content);
        hasher.update(&turn.at_ms.to_le_bytes());
        hash_opt_u64(&mut hasher, turn.sentiment.map(|s| s.0 as u32 as u64));
        hasher.update(&turn.tokens.to_le_bytes());
    }

    let m = &state.metrics;
    for v in [
        m.turns,
        m.tokens_total,
        m.response_total_ms,
        m.response_samples,
        m.sentiment_samples,
        m.alternating_turns,
    ] {
        hasher.update(&v.to_le_bytes());
    }
    hasher.update(&m.sentiment_trend.0.to_le_bytes());
    hasher.update(&m.coherence.0.to_le_bytes());

    *hasher.finalize().as_bytes()
}
