// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! State-change notifications.
//!
//! Every accepted command returns a [`StateChange`]. Publishing it is a
//! separate, explicit step through a [`ChangePublisher`].

use cim_kernel::aggregate::Aggregate;
use cim_kernel::cid::Cid;
use cim_kernel::envelope::Envelope;
use cim_kernel::types::id::StreamId;
use cim_kernel::types::Sequence;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Outcome of an accepted command or append.
#[derive(Debug)]
pub struct StateChange<A: Aggregate> {
    pub stream_id: StreamId,
    /// Sequence of the last appended envelope.
    pub sequence: Sequence,
    pub head_cid: Cid,
    pub envelopes: Vec<Arc<Envelope>>,
    pub events: Vec<A::Event>,
    /// State after folding the appended events.
    pub state: Arc<A>,
}

impl<A: Aggregate> Clone for StateChange<A> {
    fn clone(&self) -> Self {
        Self {
            stream_id: self.stream_id.clone(),
            sequence: self.sequence,
            head_cid: self.head_cid,
            envelopes: self.envelopes.clone(),
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl<A: Aggregate> StateChange<A> {
    /// Compact, serializable summary of the change.
    pub fn notice(&self) -> ChangeNotice {
        ChangeNotice {
            aggregate: A::KIND.to_string(),
            stream_id: self.stream_id.clone(),
            sequence: self.sequence,
            head_cid: self.head_cid,
            event_types: self.envelopes.iter().map(|e| e.event_type().to_string()).collect(),
            state_digest: Cid(self.state.digest()).to_hex(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub aggregate: String,
    pub stream_id: StreamId,
    pub sequence: Sequence,
    pub head_cid: Cid,
    pub event_types: Vec<String>,
    pub state_digest: String,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publisher closed")]
    Closed,
    #[error("publish failed: {0}")]
    Other(String),
}

pub trait ChangePublisher<A: Aggregate>: Send + Sync {
    /// Delivers `change`, returning how many subscribers received it.
    fn publish(&self, change: &StateChange<A>) -> Result<usize, PublishError>;
}

/// Fan-out over a `tokio::sync::broadcast` channel.
pub struct BroadcastPublisher<A: Aggregate> {
    sender: broadcast::Sender<StateChange<A>>,
}

impl<A: Aggregate> BroadcastPublisher<A> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange<A>> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<A: Aggregate> ChangePublisher<A> for BroadcastPublisher<A> {
    fn publish(&self, change: &StateChange<A>) -> Result<usize, PublishError> {
        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }
        // A receiver can drop between the count and the send.
        Ok(self.sender.send(change.clone()).unwrap_or(0))
    }
}

/// Writes a one-line summary of every change to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl<A: Aggregate> ChangePublisher<A> for LogPublisher {
    fn publish(&self, change: &StateChange<A>) -> Result<usize, PublishError> {
        let notice = change.notice();
        tracing::info!(
            "{} {} advanced to sequence {} ({})",
            notice.aggregate,
            notice.stream_id,
            notice.sequence,
            notice.event_types.join(", ")
        );
        Ok(1)
    }
}
