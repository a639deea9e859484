// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::cid::{canonical_preimage, compute_cid, Cid};
use crate::config::MAX_PAYLOAD_BYTES;
use crate::error::{EncodingFault, KernelError};
use crate::event::EventPayload;
use crate::graph::GraphEvent;
use crate::types::attrs::{AttrValue, Attributes};
use crate::types::enums::NodeKind;
use crate::types::id::{NodeId, StreamId};
use std::string::ToString;
use std::vec;

fn node_added(id: u64) -> EventPayload {
    let mut attributes = Attributes::new();
    attributes.insert("label".to_string(), AttrValue::Text("alpha".to_string()));
    attributes.insert("weight".to_string(), AttrValue::Int(7));
    EventPayload::encode(&GraphEvent::NodeAdded {
        id: NodeId(id),
        kind: NodeKind::Concept,
        attributes,
    })
    .unwrap()
}

#[test]
fn test_cid_is_stable_across_calls() {
    let stream = StreamId::new("graph-1").unwrap();
    let a = compute_cid(&stream, 0, None, &node_added(1));
    let b = compute_cid(&stream, 0, None, &node_added(1));
    assert_eq!(a, b);
}

#[test]
fn test_cid_depends_on_every_input() {
    let stream = StreamId::new("graph-1").unwrap();
    let other_stream = StreamId::new("graph-2").unwrap();
    let base = compute_cid(&stream, 0, None, &node_added(1));
    let prev = Cid([9u8; 32]);

    assert_ne!(base, compute_cid(&other_stream, 0, None, &node_added(1)));
    assert_ne!(base, compute_cid(&stream, 1, None, &node_added(1)));
    assert_ne!(base, compute_cid(&stream, 0, Some(&prev), &node_added(1)));
    assert_ne!(base, compute_cid(&stream, 0, None, &node_added(2)));
}

#[test]
fn test_preimage_layout() {
    let stream = StreamId::new("s").unwrap();
    let payload = EventPayload::from_parts("T", vec![0xAB]).unwrap();
    let bytes = canonical_preimage(&stream, 2, None, &payload);

    let mut expected = b"cim-ledger/cid/v1".to_vec();
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.push(b's');
    expected.extend_from_slice(&2u64.to_le_bytes());
    expected.push(0);
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.push(b'T');
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.push(0xAB);
    assert_eq!(bytes, expected);
}

#[test]
fn test_length_prefix_prevents_field_shifting() {
    // Same concatenated bytes, different split between type tag and body.
    let stream = StreamId::new("s").unwrap();
    let a = EventPayload::from_parts("AB", vec![b'C']).unwrap();
    let b = EventPayload::from_parts("A", vec![b'B', b'C']).unwrap();
    assert_ne!(compute_cid(&stream, 0, None, &a), compute_cid(&stream, 0, None, &b));
}

#[test]
fn test_cid_hex_roundtrip() {
    let stream = StreamId::new("graph-1").unwrap();
    let cid = compute_cid(&stream, 0, None, &node_added(1));
    let hex = cid.to_hex();
    assert_eq!(hex.len(), 64);
    assert_eq!(Cid::from_hex(&hex), Some(cid));
    assert_eq!(format!("{}", cid), hex);
    assert_eq!(Cid::from_hex("zz"), None);
}

#[test]
fn test_payload_bounds() {
    assert_eq!(
        EventPayload::from_parts("", vec![]),
        Err(KernelError::Encoding(EncodingFault::EmptyEventType))
    );
    assert_eq!(
        EventPayload::from_parts("Big", vec![0u8; MAX_PAYLOAD_BYTES + 1]),
        Err(KernelError::Encoding(EncodingFault::PayloadTooLarge))
    );
}

#[test]
fn test_payload_decode_checks_tag() {
    let payload = node_added(3);
    let decoded: GraphEvent = payload.decode().unwrap();
    assert!(matches!(decoded, GraphEvent::NodeAdded { id: NodeId(3), .. }));

    let mislabeled = EventPayload::from_parts("NodeRemoved", payload.data.clone()).unwrap();
    assert_eq!(
        mislabeled.decode::<GraphEvent>(),
        Err(KernelError::Encoding(EncodingFault::UnknownEventType))
    );
}

#[test]
fn test_invalid_stream_ids() {
    assert_eq!(StreamId::new(""), Err(KernelError::InvalidStreamId));
    assert_eq!(StreamId::new("a\nb"), Err(KernelError::InvalidStreamId));
    assert!(StreamId::new("dialog/42").is_ok());
}
