// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::chain_of;
use crate::config::KERNEL_VERSION;
use crate::dialog::{DialogEvent, DialogState};
use crate::proof::StreamProof;
use crate::replay::replay;
use crate::types::id::StreamId;
use std::string::ToString;

fn proof_for(state: &DialogState, length: u64, head: Option<crate::cid::Cid>) -> StreamProof {
    StreamProof::of(StreamId::new("dialog-1").unwrap(), length, head, state)
}

#[test]
fn test_proofs_match_for_identical_replays() {
    let events = [
        DialogEvent::DialogStarted { title: "t".to_string(), model: Some("m".to_string()) },
        DialogEvent::DialogTagged { tag: "x".to_string() },
    ];
    let chain = chain_of("dialog-1", &events);
    let a: DialogState = replay(&chain).unwrap();
    let b: DialogState = replay(&chain).unwrap();

    let pa = proof_for(&a, 2, Some(chain[1].cid));
    let pb = proof_for(&b, 2, Some(chain[1].cid));
    assert!(pa.matches(&pb));
    assert_eq!(pa.kernel_version, KERNEL_VERSION);
    assert_eq!(pa.aggregate, "dialog");

    let shorter: DialogState = replay(&chain[..1]).unwrap();
    let pc = proof_for(&shorter, 1, Some(chain[0].cid));
    assert!(!pa.matches(&pc));
}
