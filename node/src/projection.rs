// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Projection Engine
//!
//! Replays a stream's envelopes through an aggregate's fold, starting from
//! the nearest usable snapshot:
//!
//! ```text
//! capture head → fresh snapshot at head? → done
//!              → historical snapshot still on the chain? → fold the tail
//!              → otherwise fold from sequence 0
//! ```
//!
//! Every snapshot is confirmed against the CID the store holds at its
//! sequence before it is trusted.

use cim_kernel::aggregate::Aggregate;
use cim_kernel::cid::Cid;
use cim_kernel::replay::apply_envelope;
use cim_kernel::types::id::StreamId;
use cim_kernel::types::Sequence;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{Snapshot, SnapshotCache};
use crate::config::SnapshotPolicy;
use crate::errors::{EngineError, EngineResult, StoreError};
use crate::store::StreamStore;

/// Materialized state of a stream up to and including `sequence`.
#[derive(Debug)]
pub struct Projection<A> {
    pub stream_id: StreamId,
    /// Last folded sequence, `None` for a stream with no envelopes.
    pub sequence: Option<Sequence>,
    pub head_cid: Option<Cid>,
    pub state: Arc<A>,
}

impl<A> Clone for Projection<A> {
    fn clone(&self) -> Self {
        Self {
            stream_id: self.stream_id.clone(),
            sequence: self.sequence,
            head_cid: self.head_cid,
            state: self.state.clone(),
        }
    }
}

impl<A: Aggregate> Projection<A> {
    pub fn empty(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            sequence: None,
            head_cid: None,
            state: Arc::new(A::default()),
        }
    }

    /// Number of envelopes folded into the state.
    pub fn length(&self) -> u64 {
        self.sequence.map_or(0, |s| s + 1)
    }

    fn from_snapshot(snapshot: &Snapshot<A>) -> Self {
        Self {
            stream_id: snapshot.stream_id.clone(),
            sequence: Some(snapshot.sequence),
            head_cid: Some(snapshot.cid),
            state: snapshot.state.clone(),
        }
    }
}

pub struct Projector<A: Aggregate> {
    store: Arc<StreamStore>,
    cache: Arc<SnapshotCache<A>>,
    policy: SnapshotPolicy,
}

impl<A: Aggregate> Projector<A> {
    pub fn new(store: Arc<StreamStore>, cache: Arc<SnapshotCache<A>>, policy: SnapshotPolicy) -> Self {
        Self { store, cache, policy }
    }

    pub fn store(&self) -> &Arc<StreamStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<SnapshotCache<A>> {
        &self.cache
    }

    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    /// State after folding envelopes `0..=up_to` (clamped to the head).
    pub fn project(&self, stream_id: &StreamId, up_to: Sequence) -> EngineResult<Projection<A>> {
        self.project_inner(stream_id, Some(up_to), None)
    }

    /// State at the current head.
    pub fn project_latest(&self, stream_id: &StreamId) -> EngineResult<Projection<A>> {
        self.project_inner(stream_id, None, None)
    }

    /// Like [`Self::project_latest`], but an unknown stream projects to the
    /// default state instead of failing.
    pub fn project_or_empty(&self, stream_id: &StreamId) -> EngineResult<Projection<A>> {
        match self.project_latest(stream_id) {
            Err(EngineError::Store(StoreError::UnknownStream(_))) => Ok(Projection::empty(stream_id.clone())),
            other => other,
        }
    }

    /// Projection that checks `token` before every fold step.
    pub fn project_cancellable(
        &self,
        stream_id: &StreamId,
        up_to: Option<Sequence>,
        token: &CancellationToken,
    ) -> EngineResult<Projection<A>> {
        self.project_inner(stream_id, up_to, Some(token))
    }

    fn project_inner(
        &self,
        stream_id: &StreamId,
        up_to: Option<Sequence>,
        token: Option<&CancellationToken>,
    ) -> EngineResult<Projection<A>> {
        let len = self.store.len(stream_id);
        if len == 0 {
            return Err(StoreError::UnknownStream(stream_id.clone()).into());
        }
        let head_sequence = len - 1;
        let target = up_to.map_or(head_sequence, |s| s.min(head_sequence));
        let at_head = target == head_sequence;
        let target_cid = self
            .store
            .envelope_at(stream_id, target)
            .map(|e| e.cid)
            .ok_or_else(|| StoreError::UnknownStream(stream_id.clone()))?;

        if at_head {
            if let Some(snapshot) = self.cache.get(stream_id) {
                if snapshot.sequence == target && snapshot.cid == target_cid {
                    return Ok(Projection::from_snapshot(&snapshot));
                }
                tracing::warn!(
                    "Discarding snapshot of {} at sequence {}: head moved to {}",
                    stream_id,
                    snapshot.sequence,
                    target
                );
            }
        }

        let (mut state, from) = match self.cache.get_historical(stream_id, target) {
            Some(snapshot)
                if self.store.envelope_at(stream_id, snapshot.sequence).map(|e| e.cid) == Some(snapshot.cid) =>
            {
                (A::clone(&snapshot.state), snapshot.sequence + 1)
            }
            _ => (A::default(), 0),
        };

        let start = Instant::now();
        let mut folded: u64 = 0;
        for envelope in self.store.read(stream_id, from, target)? {
            if token.map_or(false, |t| t.is_cancelled()) {
                tracing::debug!("Projection of {} cancelled at sequence {}", stream_id, envelope.sequence);
                return Err(EngineError::Cancelled);
            }
            apply_envelope(&mut state, &envelope).map_err(|failure| {
                tracing::error!(
                    "Durable envelope {} of {} rejected by {} fold: {}",
                    failure.sequence,
                    stream_id,
                    A::KIND,
                    failure.cause
                );
                EngineError::ProjectionInconsistent {
                    stream_id: stream_id.clone(),
                    sequence: failure.sequence,
                    cause: failure.cause,
                }
            })?;
            folded += 1;
        }

        metrics::counter!("cim_replayed_envelopes_total", folded, "aggregate" => A::KIND);
        metrics::histogram!("cim_projection_duration_seconds", start.elapsed().as_secs_f64(), "aggregate" => A::KIND);

        let state = Arc::new(state);
        if at_head && self.policy.should_publish(folded) {
            self.cache
                .put(Snapshot::new(stream_id.clone(), target, target_cid, state.clone()));
        }

        Ok(Projection {
            stream_id: stream_id.clone(),
            sequence: Some(target),
            head_cid: Some(target_cid),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cim_kernel::event::EventPayload;
    use cim_kernel::graph::{GraphEvent, GraphState};
    use cim_kernel::types::enums::NodeKind;
    use cim_kernel::types::id::NodeId;

    fn setup(cadence: u64) -> (Arc<StreamStore>, Projector<GraphState>) {
        let store = Arc::new(StreamStore::in_memory());
        let projector = Projector::new(
            store.clone(),
            Arc::new(SnapshotCache::new()),
            SnapshotPolicy {
                cadence,
                refresh_on_commit: true,
            },
        );
        (store, projector)
    }

    fn add_node(store: &StreamStore, id: &StreamId, n: u64) {
        let event = GraphEvent::NodeAdded {
            id: NodeId(n),
            kind: NodeKind::Entity,
            attributes: Default::default(),
        };
        store.append(id, EventPayload::encode(&event).unwrap()).unwrap();
    }

    #[test]
    fn test_latest_publishes_snapshot() {
        let (store, projector) = setup(1);
        let id = StreamId::new("g").unwrap();
        add_node(&store, &id, 1);
        add_node(&store, &id, 2);

        let p = projector.project_latest(&id).unwrap();
        assert_eq!(p.sequence, Some(1));
        assert_eq!(p.state.node_count(), 2);

        let again = projector.project_latest(&id).unwrap();
        assert!(Arc::ptr_eq(&p.state, &again.state));
    }

    #[test]
    fn test_point_in_time_does_not_publish() {
        let (store, projector) = setup(1);
        let id = StreamId::new("g").unwrap();
        for n in 0..4 {
            add_node(&store, &id, n);
        }
        let p = projector.project(&id, 1).unwrap();
        assert_eq!(p.state.node_count(), 2);
        assert_eq!(p.length(), 2);
        assert_eq!(projector.cache().stats().entries, 0);
    }

    #[test]
    fn test_cadence_zero_disables_cache() {
        let (store, projector) = setup(0);
        let id = StreamId::new("g").unwrap();
        add_node(&store, &id, 1);
        projector.project_latest(&id).unwrap();
        assert_eq!(projector.cache().stats().entries, 0);
    }

    #[test]
    fn test_unknown_and_empty() {
        let (_store, projector) = setup(1);
        let id = StreamId::new("nothing").unwrap();
        assert!(matches!(
            projector.project_latest(&id),
            Err(EngineError::Store(StoreError::UnknownStream(_)))
        ));
        let empty = projector.project_or_empty(&id).unwrap();
        assert_eq!(empty.sequence, None);
        assert_eq!(empty.length(), 0);
    }

    #[test]
    fn test_cancelled_token_stops_fold() {
        let (store, projector) = setup(1);
        let id = StreamId::new("g").unwrap();
        add_node(&store, &id, 1);
        let token = CancellationToken::new();
        token.cancel();

        let result = projector.project_cancellable(&id, None, &token);
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(projector.cache().stats().entries, 0);
    }
}
