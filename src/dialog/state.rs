// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Dialog aggregate state.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::dialog::events::{DialogCommand, DialogEvent};
use crate::dialog::metrics::{DialogMetrics, EmaPolicy, MetricsPolicy};
use crate::digest::dialog_state_hash;
use crate::error::{KernelError, Result};
use crate::types::enums::SpeakerRole;
use crate::types::id::{TurnId, Version};
use crate::types::scalar::FxpScalar;
use crate::types::TimestampMs;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: SpeakerRole,
    pub content: String,
    pub at_ms: TimestampMs,
    pub sentiment: Option<FxpScalar>,
    pub tokens: u32,
}

/// Ordered transcript plus incrementally maintained metrics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DialogState<P: MetricsPolicy = EmaPolicy> {
    pub(crate) version: Version,
    pub(crate) started: bool,
    pub(crate) title: String,
    pub(crate) model: Option<String>,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) closed: bool,
    pub(crate) turns: Vec<Turn>,
    pub(crate) metrics: DialogMetrics,
    #[serde(skip)]
    pub(crate) policy: P,
}

impl<P: MetricsPolicy> DialogState<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: P) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn metrics(&self) -> &DialogMetrics {
        &self.metrics
    }

    fn next_turn_id(&self) -> Result<TurnId> {
        u32::try_from(self.turns.len())
            .map(TurnId)
            .map_err(|_| KernelError::CapacityExceeded)
    }

    fn fold(&mut self, event: &DialogEvent) -> Result<()> {
        match event {
            DialogEvent::DialogStarted { title, model } => {
                if self.started || self.version.0 != 0 {
                    return Err(KernelError::InvalidOperation("dialog already started"));
                }
                self.started = true;
                self.title = title.clone();
                self.model = model.clone();
            }
            DialogEvent::TurnAdded { turn, role, content, at_ms, sentiment, tokens } => {
                if self.closed {
                    return Err(KernelError::DialogClosed);
                }
                if *turn != self.next_turn_id()? {
                    return Err(KernelError::TurnOutOfOrder(*turn));
                }
                let turn = Turn {
                    id: *turn,
                    role: *role,
                    content: content.clone(),
                    at_ms: *at_ms,
                    sentiment: *sentiment,
                    tokens: *tokens,
                };
                self.policy.observe(&mut self.metrics, self.turns.last(), &turn);
                self.turns.push(turn);
            }
            DialogEvent::DialogTagged { tag } => {
                self.tags.insert(tag.clone());
            }
            DialogEvent::DialogClosed => {
                if self.closed {
                    return Err(KernelError::InvalidOperation("dialog already closed"));
                }
                self.closed = true;
            }
        }
        Ok(())
    }
}

impl<P: MetricsPolicy> Aggregate for DialogState<P> {
    type Event = DialogEvent;
    type Command = DialogCommand;

    const KIND: &'static str = "dialog";

    fn apply(&mut self, event: &DialogEvent) -> Result<()> {
        self.fold(event)?;
        self.version = self.version.next();
        Ok(())
    }

    fn handle(&self, command: &DialogCommand) -> Result<Vec<DialogEvent>> {
        let event = match command {
            DialogCommand::StartDialog { title, model } => {
                if self.started {
                    return Err(KernelError::InvalidOperation("dialog already started"));
                }
                DialogEvent::DialogStarted {
                    title: title.clone(),
                    model: model.clone(),
                }
            }
            DialogCommand::AddTurn { role, content, at_ms, sentiment, tokens } => {
                if self.closed {
                    return Err(KernelError::DialogClosed);
                }
                if content.is_empty() {
                    return Err(KernelError::InvalidOperation("turn content must not be empty"));
                }
                if let Some(s) = sentiment {
                    if s.0 < -FxpScalar::ONE.0 || s.0 > FxpScalar::ONE.0 {
                        return Err(KernelError::InvalidOperation("sentiment outside [-1, 1]"));
                    }
                }
                let turn = self.next_turn_id()?;
                if let Some(last) = self.turns.last() {
                    if *at_ms < last.at_ms {
                        return Err(KernelError::TurnOutOfOrder(turn));
                    }
                }
                DialogEvent::TurnAdded {
                    turn,
                    role: *role,
                    content: content.clone(),
                    at_ms: *at_ms,
                    sentiment: *sentiment,
                    tokens: *tokens,
                }
            }
            DialogCommand::TagDialog { tag } => {
                if tag.is_empty() {
                    return Err(KernelError::InvalidOperation("tag must not be empty"));
                }
                DialogEvent::DialogTagged { tag: tag.clone() }
            }
            DialogCommand::CloseDialog => {
                if self.closed {
                    return Err(KernelError::InvalidOperation("dialog already closed"));
                }
                DialogEvent::DialogClosed
            }
        };
        Ok(vec![event])
    }

    fn version(&self) -> Version {
        self.version
    }

    fn digest(&self) -> [u8; 32] {
        dialog_state_hash(self)
    }
}
