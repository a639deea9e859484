// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use cim_kernel::aggregate::Aggregate;
use cim_kernel::dialog::{DialogCommand, DialogState};
use cim_kernel::error::KernelError;
use cim_kernel::fxp::ops::{from_f64_checked, to_f64};
use cim_kernel::graph::{GraphCommand, GraphEvent, GraphState};
use cim_kernel::types::enums::{EdgeKind, NodeKind, SpeakerRole};
use cim_kernel::types::id::{EdgeId, NodeId, StreamId, Version};
use cim_node::config::{NodeConfig, StoreConfig};
use cim_node::engine::Engine;
use cim_node::errors::{EngineError, StoreError};
use cim_node::events::CommandOutcome;
use cim_node::notify::BroadcastPublisher;
use cim_node::store::StreamStore;
use std::sync::Arc;
use tempfile::tempdir;

fn graph_engine() -> Engine<GraphState> {
    Engine::new(Arc::new(StreamStore::in_memory()), &NodeConfig::default())
}

fn node(n: u64) -> GraphCommand {
    GraphCommand::AddNode {
        id: NodeId(n),
        kind: NodeKind::Entity,
        attributes: Default::default(),
    }
}

fn edge(id: u64, a: u64, b: u64) -> GraphCommand {
    GraphCommand::AddEdge {
        id: EdgeId(id),
        source: NodeId(a),
        target: NodeId(b),
        kind: EdgeKind::DependsOn,
        attributes: Default::default(),
    }
}

#[test]
fn test_remove_node_cascades_edges() {
    let engine = graph_engine();
    let s = StreamId::new("scenario").unwrap();

    for cmd in [node(1), node(2), edge(10, 1, 2), GraphCommand::RemoveNode { id: NodeId(1) }] {
        assert!(engine.execute(&s, &cmd).unwrap().is_accepted());
    }

    let p = engine.get_materialized_state(&s).unwrap();
    assert!(p.state.get_node(NodeId(1)).is_none());
    assert!(p.state.get_node(NodeId(2)).is_some());
    assert_eq!(p.state.node_count(), 1);
    assert_eq!(p.state.edge_count(), 0);
    assert_eq!(p.state.version(), Version(4));
    assert_eq!(p.sequence, Some(3));
    assert!(engine.verify_integrity(&s).unwrap().is_intact());
}

#[test]
fn test_dangling_edge_is_rejected_without_append() {
    let engine = graph_engine();
    let s = StreamId::new("g").unwrap();
    engine.execute(&s, &node(1)).unwrap();
    let before = engine.get_materialized_state(&s).unwrap();

    let outcome = engine.execute(&s, &edge(1, 1, 2)).unwrap();
    assert!(matches!(
        outcome,
        CommandOutcome::Rejected(KernelError::DanglingEdge { missing: NodeId(2), .. })
    ));

    let after = engine.get_materialized_state(&s).unwrap();
    assert_eq!(engine.store().len(&s), 1);
    assert_eq!(after.head_cid, before.head_cid);
    assert_eq!(*after.state, *before.state);
}

#[test]
fn test_duplicate_node_and_self_loop_rejected() {
    let engine = graph_engine();
    let s = StreamId::new("g").unwrap();
    engine.execute(&s, &node(1)).unwrap();

    let dup = engine.execute(&s, &node(1)).unwrap();
    assert_eq!(dup.rejection(), Some(&KernelError::DuplicateNodeIdentity(NodeId(1))));
    let looped = engine.execute(&s, &edge(1, 1, 1)).unwrap();
    assert_eq!(looped.rejection(), Some(&KernelError::SelfLoop(NodeId(1))));
    assert_eq!(engine.store().len(&s), 1);
}

#[test]
fn test_event_batch_is_all_or_nothing() {
    let engine = graph_engine();
    let s = StreamId::new("g").unwrap();
    let added = |n| GraphEvent::NodeAdded {
        id: NodeId(n),
        kind: NodeKind::Document,
        attributes: Default::default(),
    };
    let linked = |a, b| GraphEvent::EdgeAdded {
        id: EdgeId(a * 100 + b),
        source: NodeId(a),
        target: NodeId(b),
        kind: EdgeKind::References,
        attributes: Default::default(),
    };

    let rejected = engine.append_events(&s, vec![added(1), linked(1, 2)]).unwrap();
    assert!(!rejected.is_accepted());
    assert_eq!(engine.store().len(&s), 0);

    let change = engine
        .append_events(&s, vec![added(1), added(2), linked(1, 2)])
        .unwrap()
        .accepted()
        .unwrap();
    assert_eq!(change.envelopes.len(), 3);
    assert_eq!(change.sequence, 2);
    assert_eq!(change.state.edge_count(), 1);
    assert_eq!(change.events.len(), 3);
}

#[tokio::test]
async fn test_accepted_changes_are_broadcast() {
    let publisher = Arc::new(BroadcastPublisher::<GraphState>::new(8));
    let mut rx = publisher.subscribe();
    let engine = graph_engine().with_publisher(publisher.clone());
    let s = StreamId::new("g").unwrap();

    engine.execute(&s, &node(1)).unwrap();
    engine.execute(&s, &edge(1, 1, 5)).unwrap();

    let change = rx.recv().await.unwrap();
    assert_eq!(change.sequence, 0);
    assert_eq!(change.notice().event_types, vec!["NodeAdded".to_string()]);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_dialog_sentiment_trend() {
    let engine: Engine<DialogState> = Engine::new(Arc::new(StreamStore::in_memory()), &NodeConfig::default());
    let s = StreamId::new("chat").unwrap();
    engine
        .execute(
            &s,
            &DialogCommand::StartDialog {
                title: "support".into(),
                model: None,
            },
        )
        .unwrap();

    let turns = [
        (SpeakerRole::User, 0.2, 1_000),
        (SpeakerRole::Assistant, 0.6, 1_400),
        (SpeakerRole::User, 1.0, 2_000),
    ];
    for (role, sentiment, at_ms) in turns {
        let outcome = engine
            .execute(
                &s,
                &DialogCommand::AddTurn {
                    role,
                    content: "…".into(),
                    at_ms,
                    sentiment: from_f64_checked(sentiment),
                    tokens: 10,
                },
            )
            .unwrap();
        assert!(outcome.is_accepted());
    }

    let p = engine.get_materialized_state(&s).unwrap();
    let m = p.state.metrics();
    assert!((to_f64(m.sentiment_trend) - 0.7).abs() < 1e-3);
    assert_eq!(m.turns, 3);
    assert_eq!(m.tokens_total, 30);
    assert_eq!(m.average_response_ms(), Some(400));

    // Timestamps may not go backwards.
    let late = engine
        .execute(
            &s,
            &DialogCommand::AddTurn {
                role: SpeakerRole::Assistant,
                content: "late".into(),
                at_ms: 10,
                sentiment: None,
                tokens: 1,
            },
        )
        .unwrap();
    assert!(matches!(late.rejection(), Some(KernelError::TurnOutOfOrder(_))));

    engine.execute(&s, &DialogCommand::CloseDialog).unwrap();
    let closed = engine
        .execute(
            &s,
            &DialogCommand::AddTurn {
                role: SpeakerRole::User,
                content: "again".into(),
                at_ms: 3_000,
                sentiment: None,
                tokens: 1,
            },
        )
        .unwrap();
    assert_eq!(closed.rejection(), Some(&KernelError::DialogClosed));
}

#[test]
fn test_proof_is_stable_across_restart() {
    let dir = tempdir().unwrap();
    let mut cfg = NodeConfig::default();
    cfg.store = StoreConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..StoreConfig::default()
    };
    let s = StreamId::new("g").unwrap();

    let before = {
        let store = Arc::new(StreamStore::open(cfg.store.clone()).unwrap());
        let engine: Engine<GraphState> = Engine::new(store.clone(), &cfg);
        engine.execute(&s, &GraphCommand::CreateGraph { name: "kb".into() }).unwrap();
        engine.execute(&s, &node(1)).unwrap();
        engine.execute(&s, &node(2)).unwrap();
        engine.execute(&s, &edge(1, 1, 2)).unwrap();
        let proof = engine.proof(&s).unwrap();
        store.close().unwrap();
        proof
    };

    let store = Arc::new(StreamStore::open(cfg.store.clone()).unwrap());
    let engine: Engine<GraphState> = Engine::new(store, &cfg);
    let after = engine.proof(&s).unwrap();
    assert!(before.matches(&after));
    assert_eq!(after.length, 4);
}

#[test]
fn test_archived_stream_rejects_commands() {
    let engine = graph_engine();
    let s = StreamId::new("g").unwrap();
    engine.execute(&s, &node(1)).unwrap();
    engine.store().archive(&s).unwrap();

    assert!(matches!(
        engine.execute(&s, &node(2)),
        Err(EngineError::Store(StoreError::StreamArchived(_)))
    ));
    assert_eq!(engine.get_materialized_state(&s).unwrap().state.node_count(), 1);
}

#[test]
fn test_queries_on_unknown_stream() {
    let engine = graph_engine();
    let s = StreamId::new("missing").unwrap();
    assert!(matches!(
        engine.get_materialized_state(&s),
        Err(EngineError::Store(StoreError::UnknownStream(_)))
    ));
    assert!(engine.verify_integrity(&s).is_err());
    assert!(engine.get_history(&s, 0, 10).is_err());
    assert!(engine.proof(&s).is_err());
}
