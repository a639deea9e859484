// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use cim_kernel::aggregate::Aggregate;
use cim_kernel::cid::Cid;
use cim_kernel::envelope::Envelope;
use cim_kernel::proof::StreamProof;
use cim_kernel::replay::replay;
use cim_kernel::types::id::StreamId;
use cim_kernel::types::Sequence;
use cim_kernel::verify::VerificationResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::SnapshotCache;
use crate::config::NodeConfig;
use crate::errors::{EngineError, EngineResult, StoreError};
use crate::events::{generate_proof, CommandOutcome, EventCommitter};
use crate::notify::ChangePublisher;
use crate::projection::{Projection, Projector};
use crate::store::{EnvelopeRange, StreamStore};

/// Command and query facade for one aggregate type.
///
/// Several engines (one per aggregate type) can share a single store.
pub struct Engine<A: Aggregate> {
    store: Arc<StreamStore>,
    projector: Arc<Projector<A>>,
    committer: EventCommitter<A>,
    publishers: Vec<Arc<dyn ChangePublisher<A>>>,
}

impl<A: Aggregate> Engine<A> {
    pub fn new(store: Arc<StreamStore>, cfg: &NodeConfig) -> Self {
        let cache = Arc::new(SnapshotCache::new());
        let projector = Arc::new(Projector::new(store.clone(), cache, cfg.snapshot));
        let committer = EventCommitter::new(projector.clone(), cfg.store.max_append_retries);
        Self {
            store,
            projector,
            committer,
            publishers: Vec::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ChangePublisher<A>>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn store(&self) -> &Arc<StreamStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<SnapshotCache<A>> {
        self.projector.cache()
    }

    // --- Commands ---

    /// Validates `command` against the current state and appends the events
    /// it produces. Rejections append nothing.
    pub fn execute(&self, stream_id: &StreamId, command: &A::Command) -> EngineResult<CommandOutcome<A>> {
        let outcome = self.committer.execute(stream_id, command)?;
        self.publish(&outcome);
        Ok(outcome)
    }

    /// Appends a single pre-decided event after shadow-applying it.
    pub fn append_event(&self, stream_id: &StreamId, event: A::Event) -> EngineResult<CommandOutcome<A>> {
        self.append_events(stream_id, vec![event])
    }

    /// Appends several pre-decided events as one atomic batch.
    pub fn append_events(&self, stream_id: &StreamId, events: Vec<A::Event>) -> EngineResult<CommandOutcome<A>> {
        if events.is_empty() {
            return Err(StoreError::EmptyBatch.into());
        }
        let outcome = self.committer.commit_events(stream_id, events)?;
        self.publish(&outcome);
        Ok(outcome)
    }

    fn publish(&self, outcome: &CommandOutcome<A>) {
        let CommandOutcome::Accepted(change) = outcome else {
            return;
        };
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(change) {
                tracing::warn!("Failed to publish change of {}: {}", change.stream_id, e);
            }
        }
    }

    // --- Queries ---

    /// State at the current head.
    pub fn get_materialized_state(&self, stream_id: &StreamId) -> EngineResult<Projection<A>> {
        self.projector.project_latest(stream_id)
    }

    /// State after envelopes `0..=up_to`, clamped to the head.
    pub fn state_at(&self, stream_id: &StreamId, up_to: Sequence) -> EngineResult<Projection<A>> {
        self.projector.project(stream_id, up_to)
    }

    /// State right after the envelope with CID `cid`.
    pub fn state_at_cid(&self, cid: &Cid) -> EngineResult<Projection<A>> {
        let (stream_id, sequence) = self.store.locate(cid).ok_or(StoreError::UnknownCid(*cid))?;
        self.projector.project(&stream_id, sequence)
    }

    pub fn project_cancellable(
        &self,
        stream_id: &StreamId,
        up_to: Option<Sequence>,
        token: &CancellationToken,
    ) -> EngineResult<Projection<A>> {
        self.projector.project_cancellable(stream_id, up_to, token)
    }

    pub fn verify_integrity(&self, stream_id: &StreamId) -> EngineResult<VerificationResult> {
        Ok(self.store.verify(stream_id)?)
    }

    /// Like [`Self::verify_integrity`], but a break is an error. Returns the
    /// verified length.
    pub fn ensure_intact(&self, stream_id: &StreamId) -> EngineResult<u64> {
        match self.store.verify(stream_id)? {
            VerificationResult::Intact { length, .. } => Ok(length),
            VerificationResult::Broken(chain_break) => Err(StoreError::ChainMismatch {
                stream_id: stream_id.clone(),
                chain_break,
            }
            .into()),
        }
    }

    /// Envelopes `from..=to`, clamped to the head.
    pub fn get_history(&self, stream_id: &StreamId, from: Sequence, to: Sequence) -> EngineResult<EnvelopeRange> {
        Ok(self.store.read(stream_id, from, to)?)
    }

    /// The envelope with CID `cid` and up to `max_depth` predecessors, oldest first.
    pub fn get_ancestry(&self, cid: &Cid, max_depth: u64) -> EngineResult<EnvelopeRange> {
        Ok(self.store.read_ancestry(cid, max_depth)?)
    }

    /// History with every payload decoded as this aggregate's event type.
    pub fn get_events(
        &self,
        stream_id: &StreamId,
        from: Sequence,
        to: Sequence,
    ) -> EngineResult<Vec<(Arc<Envelope>, A::Event)>> {
        self.get_history(stream_id, from, to)?
            .map(|envelope| -> EngineResult<(Arc<Envelope>, A::Event)> {
                let event = envelope.decode::<A::Event>().map_err(|cause| EngineError::ProjectionInconsistent {
                    stream_id: stream_id.clone(),
                    sequence: envelope.sequence,
                    cause,
                })?;
                Ok((envelope, event))
            })
            .collect()
    }

    pub fn proof(&self, stream_id: &StreamId) -> EngineResult<StreamProof> {
        let projection = self.get_materialized_state(stream_id)?;
        Ok(generate_proof(&projection))
    }

    /// Replays the stream from sequence 0, bypassing the cache, and compares
    /// the result with the cached projection. A mismatch evicts the snapshot.
    pub fn audit(&self, stream_id: &StreamId) -> EngineResult<bool> {
        let cached = self.get_materialized_state(stream_id)?;
        let up_to = cached.sequence.unwrap_or(0);
        let full: A = replay(self.store.read(stream_id, 0, up_to)?).map_err(|failure| {
            EngineError::ProjectionInconsistent {
                stream_id: stream_id.clone(),
                sequence: failure.sequence,
                cause: failure.cause,
            }
        })?;

        let consistent = full.digest() == cached.state.digest();
        if !consistent {
            tracing::error!("Snapshot of {} diverged from full replay at sequence {}", stream_id, up_to);
            self.cache().evict(stream_id);
        }
        Ok(consistent)
    }
}
