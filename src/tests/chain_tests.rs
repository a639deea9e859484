// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::chain_of;
use crate::cid::Cid;
use crate::event::EventPayload;
use crate::graph::GraphEvent;
use crate::types::attrs::Attributes;
use crate::types::enums::NodeKind;
use crate::types::id::{NodeId, StreamId};
use crate::verify::{verify_chain, BreakKind, ChainVerifier, VerificationResult};
use std::vec::Vec;

fn nodes(n: u64) -> Vec<GraphEvent> {
    (0..n)
        .map(|i| GraphEvent::NodeAdded {
            id: NodeId(i),
            kind: NodeKind::Entity,
            attributes: Attributes::new(),
        })
        .collect()
}

fn stream() -> StreamId {
    StreamId::new("graph-chain").unwrap()
}

#[test]
fn test_intact_chain() {
    let chain = chain_of("graph-chain", &nodes(5));
    match verify_chain(&stream(), &chain) {
        VerificationResult::Intact { length, head } => {
            assert_eq!(length, 5);
            assert_eq!(head, Some(chain[4].cid));
        }
        other => panic!("expected intact chain, got {:?}", other),
    }
}

#[test]
fn test_empty_chain_is_intact() {
    let chain: Vec<crate::envelope::Envelope> = Vec::new();
    assert_eq!(
        verify_chain(&stream(), &chain),
        VerificationResult::Intact { length: 0, head: None }
    );
}

#[test]
fn test_links_point_at_predecessor() {
    let chain = chain_of("graph-chain", &nodes(3));
    assert_eq!(chain[0].previous_cid, None);
    assert_eq!(chain[1].previous_cid, Some(chain[0].cid));
    assert_eq!(chain[2].previous_cid, Some(chain[1].cid));
}

#[test]
fn test_tampered_payload_is_detected() {
    let mut chain = chain_of("graph-chain", &nodes(4));
    let forged = GraphEvent::NodeAdded {
        id: NodeId(99),
        kind: NodeKind::Agent,
        attributes: Attributes::new(),
    };
    chain[2].payload = EventPayload::encode(&forged).unwrap();

    let result = verify_chain(&stream(), &chain);
    let chain_break = result.chain_break().unwrap();
    assert_eq!(chain_break.sequence, 2);
    assert_eq!(chain_break.kind, BreakKind::ContentMismatch);
    assert_eq!(chain_break.actual, Some(chain[2].cid));
    assert_ne!(chain_break.expected, chain_break.actual);
}

#[test]
fn test_recorded_at_is_not_content() {
    let mut chain = chain_of("graph-chain", &nodes(2));
    chain[1].recorded_at += 1_000;
    assert!(verify_chain(&stream(), &chain).is_intact());
}

#[test]
fn test_broken_link_is_detected() {
    let mut chain = chain_of("graph-chain", &nodes(3));
    chain[1].previous_cid = Some(Cid([7u8; 32]));
    chain[1].cid = chain[1].expected_cid();

    let result = verify_chain(&stream(), &chain);
    let chain_break = result.chain_break().unwrap();
    assert_eq!(chain_break.sequence, 1);
    assert_eq!(chain_break.kind, BreakKind::LinkMismatch);
    assert_eq!(chain_break.expected, Some(chain[0].cid));
    assert_eq!(chain_break.actual, Some(Cid([7u8; 32])));
}

#[test]
fn test_gap_is_detected() {
    let mut chain = chain_of("graph-chain", &nodes(4));
    chain.remove(1);
    let result = verify_chain(&stream(), &chain);
    let chain_break = result.chain_break().unwrap();
    assert_eq!(chain_break.sequence, 1);
    assert_eq!(chain_break.kind, BreakKind::SequenceGap);
}

#[test]
fn test_foreign_envelope_is_detected() {
    let mut chain = chain_of("graph-chain", &nodes(2));
    let other = chain_of("other", &nodes(2));
    chain[1] = other[1].clone();
    let result = verify_chain(&stream(), &chain);
    assert_eq!(result.chain_break().unwrap().kind, BreakKind::ForeignStream);
}

#[test]
fn test_incremental_verifier_tracks_head() {
    let chain = chain_of("graph-chain", &nodes(3));
    let mut verifier = ChainVerifier::new(stream());
    for envelope in chain.iter() {
        verifier.check(envelope).unwrap();
    }
    assert_eq!(verifier.length(), 3);
    assert_eq!(verifier.head(), Some(chain[2].cid));
}
