// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Commit - The Safety Wall
//!
//! The only path by which commands become durable envelopes:
//!
//! ```text
//! project head → decide events → shadow apply → encode → CAS append
//!       ↑                                                     │
//!       └──────────── lost the head race (bounded) ───────────┘
//! ```
//!
//! # Invariants
//! - A rejected command appends nothing.
//! - Every appended event has already been folded once, on a shadow copy.
//! - All events of one command land in one atomic batch.

use cim_kernel::aggregate::Aggregate;
use cim_kernel::error::{KernelError, KernelResult};
use cim_kernel::event::EventPayload;
use cim_kernel::types::id::StreamId;
use std::sync::Arc;

use crate::cache::Snapshot;
use crate::errors::{EngineResult, StoreError};
use crate::notify::StateChange;
use crate::projection::Projector;

/// Result of submitting a command.
#[derive(Debug)]
pub enum CommandOutcome<A: Aggregate> {
    Accepted(StateChange<A>),
    /// A business rule refused the command; nothing was appended.
    Rejected(KernelError),
}

impl<A: Aggregate> CommandOutcome<A> {
    pub fn accepted(self) -> Option<StateChange<A>> {
        match self {
            CommandOutcome::Accepted(change) => Some(change),
            CommandOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&KernelError> {
        match self {
            CommandOutcome::Accepted(_) => None,
            CommandOutcome::Rejected(e) => Some(e),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted(_))
    }
}

pub struct EventCommitter<A: Aggregate> {
    projector: Arc<Projector<A>>,
    max_retries: u32,
}

impl<A: Aggregate> EventCommitter<A> {
    pub fn new(projector: Arc<Projector<A>>, max_retries: u32) -> Self {
        Self { projector, max_retries }
    }

    /// Runs `command` against the current state of `stream_id`.
    pub fn execute(&self, stream_id: &StreamId, command: &A::Command) -> EngineResult<CommandOutcome<A>> {
        self.commit_with(stream_id, |state| state.handle(command))
    }

    /// Appends already-decided events, still validating them against the
    /// current state first.
    pub fn commit_events(&self, stream_id: &StreamId, events: Vec<A::Event>) -> EngineResult<CommandOutcome<A>> {
        self.commit_with(stream_id, |_| Ok(events.clone()))
    }

    /// Commit loop shared by commands and raw events.
    ///
    /// `decide` is re-run against the fresh state after every lost race.
    pub fn commit_with<F>(&self, stream_id: &StreamId, decide: F) -> EngineResult<CommandOutcome<A>>
    where
        F: Fn(&A) -> KernelResult<Vec<A::Event>>,
    {
        let store = self.projector.store();
        let mut attempt = 0;

        loop {
            let current = self.projector.project_or_empty(stream_id)?;

            let events = match decide(&current.state) {
                Ok(events) if events.is_empty() => {
                    return Ok(CommandOutcome::Rejected(KernelError::InvalidOperation(
                        "command produced no events",
                    )))
                }
                Ok(events) => events,
                Err(e) => return Ok(self.reject(stream_id, e)),
            };

            // Shadow apply: the live projection is shared, so fold a copy.
            let mut shadow = A::clone(&current.state);
            if let Some(e) = events.iter().find_map(|event| shadow.apply(event).err()) {
                return Ok(self.reject(stream_id, e));
            }

            let payloads = events
                .iter()
                .map(EventPayload::encode)
                .collect::<KernelResult<Vec<_>>>()
                .map_err(StoreError::Encoding)?;

            match store.append_expected(stream_id, current.head_cid.as_ref(), payloads) {
                Ok(envelopes) => {
                    let head = match envelopes.last() {
                        Some(head) => head.clone(),
                        None => return Err(StoreError::EmptyBatch.into()),
                    };
                    let state = Arc::new(shadow);
                    let cache = self.projector.cache();
                    cache.invalidate(stream_id);
                    if self.projector.policy().enabled() && self.projector.policy().refresh_on_commit {
                        cache.put(Snapshot::new(stream_id.clone(), head.sequence, head.cid, state.clone()));
                    }
                    tracing::debug!(
                        "Committed {} event(s) to {} {} at sequence {}",
                        events.len(),
                        A::KIND,
                        stream_id,
                        head.sequence
                    );
                    return Ok(CommandOutcome::Accepted(StateChange {
                        stream_id: stream_id.clone(),
                        sequence: head.sequence,
                        head_cid: head.cid,
                        envelopes,
                        events,
                        state,
                    }));
                }
                Err(StoreError::ConcurrentAppendConflict { .. }) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!("Commit to {} lost head race, retry {}", stream_id, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn reject(&self, stream_id: &StreamId, e: KernelError) -> CommandOutcome<A> {
        tracing::warn!("Rejected {} command on {}: {}", A::KIND, stream_id, e);
        metrics::increment_counter!("cim_commands_rejected_total", "aggregate" => A::KIND);
        CommandOutcome::Rejected(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SnapshotCache;
    use crate::config::SnapshotPolicy;
    use crate::store::StreamStore;
    use cim_kernel::graph::{GraphCommand, GraphState};
    use cim_kernel::types::enums::{EdgeKind, NodeKind};
    use cim_kernel::types::id::{EdgeId, NodeId};

    fn committer() -> EventCommitter<GraphState> {
        let store = Arc::new(StreamStore::in_memory());
        let projector = Projector::new(store, Arc::new(SnapshotCache::new()), SnapshotPolicy::default());
        EventCommitter::new(Arc::new(projector), 4)
    }

    #[test]
    fn test_accepted_command_appends() {
        let c = committer();
        let id = StreamId::new("g").unwrap();
        let outcome = c
            .execute(
                &id,
                &GraphCommand::AddNode {
                    id: NodeId(1),
                    kind: NodeKind::Entity,
                    attributes: Default::default(),
                },
            )
            .unwrap();
        let change = outcome.accepted().unwrap();
        assert_eq!(change.sequence, 0);
        assert_eq!(change.state.node_count(), 1);
        assert_eq!(c.projector.store().len(&id), 1);
    }

    #[test]
    fn test_rejected_command_appends_nothing() {
        let c = committer();
        let id = StreamId::new("g").unwrap();
        let outcome = c
            .execute(
                &id,
                &GraphCommand::AddEdge {
                    id: EdgeId(1),
                    source: NodeId(1),
                    target: NodeId(2),
                    kind: EdgeKind::Relation,
                    attributes: Default::default(),
                },
            )
            .unwrap();
        assert!(matches!(outcome.rejection(), Some(KernelError::DanglingEdge { .. })));
        assert_eq!(c.projector.store().len(&id), 0);
    }
}
