// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Dialog events and commands.

use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;
use crate::types::enums::SpeakerRole;
use crate::types::id::TurnId;
use crate::types::scalar::FxpScalar;
use crate::types::TimestampMs;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DialogEvent {
    DialogStarted {
        title: String,
        model: Option<String>,
    },
    TurnAdded {
        turn: TurnId,
        role: SpeakerRole,
        content: String,
        at_ms: TimestampMs,
        /// Score in [-1, 1] supplied by an external scorer.
        sentiment: Option<FxpScalar>,
        tokens: u32,
    },
    DialogTagged {
        tag: String,
    },
    DialogClosed,
}

impl DomainEvent for DialogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DialogEvent::DialogStarted { .. } => "DialogStarted",
            DialogEvent::TurnAdded { .. } => "TurnAdded",
            DialogEvent::DialogTagged { .. } => "DialogTagged",
            DialogEvent::DialogClosed => "DialogClosed",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DialogCommand {
    StartDialog {
        title: String,
        model: Option<String>,
    },
    AddTurn {
        role: SpeakerRole,
        content: String,
        at_ms: TimestampMs,
        sentiment: Option<FxpScalar>,
        tokens: u32,
    },
    TagDialog {
        tag: String,
    },
    CloseDialog,
}
