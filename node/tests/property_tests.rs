// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use cim_kernel::aggregate::Aggregate;
use cim_kernel::graph::{GraphCommand, GraphState};
use cim_kernel::types::enums::{EdgeKind, NodeKind};
use cim_kernel::types::id::{EdgeId, NodeId, StreamId};
use cim_node::config::NodeConfig;
use cim_node::engine::Engine;
use cim_node::store::StreamStore;
use proptest::prelude::*;
use std::sync::Arc;

fn command() -> impl Strategy<Value = GraphCommand> {
    prop_oneof![
        3 => (0u64..12).prop_map(|id| GraphCommand::AddNode {
            id: NodeId(id),
            kind: NodeKind::Entity,
            attributes: Default::default(),
        }),
        3 => (0u64..40, 0u64..12, 0u64..12).prop_map(|(id, a, b)| GraphCommand::AddEdge {
            id: EdgeId(id),
            source: NodeId(a),
            target: NodeId(b),
            kind: EdgeKind::Relation,
            attributes: Default::default(),
        }),
        1 => (0u64..12).prop_map(|id| GraphCommand::RemoveNode { id: NodeId(id) }),
        1 => (0u64..40).prop_map(|id| GraphCommand::RemoveEdge { id: EdgeId(id) }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever mix of accepted and rejected commands runs, the chain stays
    /// intact and the state satisfies the graph invariants.
    #[test]
    fn prop_chain_intact_after_any_commands(commands in prop::collection::vec(command(), 1..60)) {
        let engine: Engine<GraphState> = Engine::new(Arc::new(StreamStore::in_memory()), &NodeConfig::default());
        let s = StreamId::new("prop").unwrap();

        let mut accepted = 0u64;
        for cmd in &commands {
            if engine.execute(&s, cmd).unwrap().is_accepted() {
                accepted += 1;
            }
        }

        prop_assert_eq!(engine.store().len(&s), accepted);
        if accepted > 0 {
            prop_assert!(engine.verify_integrity(&s).unwrap().is_intact());
            let p = engine.get_materialized_state(&s).unwrap();
            prop_assert!(p.state.check_invariants().is_ok());
            prop_assert_eq!(p.state.version().0, accepted);
        }
    }

    /// project(N), append more, project(latest) equals a cold replay.
    #[test]
    fn prop_incremental_equals_cold_replay(
        first in prop::collection::vec(command(), 1..30),
        second in prop::collection::vec(command(), 1..30),
    ) {
        let store = Arc::new(StreamStore::in_memory());
        let cfg = NodeConfig::default();
        let warm: Engine<GraphState> = Engine::new(store.clone(), &cfg);
        let s = StreamId::new("prop").unwrap();

        for cmd in &first {
            warm.execute(&s, cmd).unwrap();
        }
        let _ = warm.get_materialized_state(&s);
        for cmd in &second {
            warm.execute(&s, cmd).unwrap();
        }

        if store.len(&s) > 0 {
            let cold: Engine<GraphState> = Engine::new(store.clone(), &cfg);
            let a = warm.get_materialized_state(&s).unwrap();
            let b = cold.get_materialized_state(&s).unwrap();
            prop_assert_eq!(a.head_cid, b.head_cid);
            prop_assert_eq!(a.state.digest(), b.state.digest());
        }
    }
}
