// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Aggregate Enums.

use serde::{Serialize, Deserialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    Entity = 0,
    Concept = 1,
    Agent = 2,
    Document = 3,
    Task = 4,
    Event = 5,
}

impl NodeKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(NodeKind::Entity),
            1 => Some(NodeKind::Concept),
            2 => Some(NodeKind::Agent),
            3 => Some(NodeKind::Document),
            4 => Some(NodeKind::Task),
            5 => Some(NodeKind::Event),
            _ => None,
        }
    }
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Entity
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EdgeKind {
    Relation = 0,
    DependsOn = 1,
    Contains = 2,
    Sequence = 3,
    References = 4,
}

impl EdgeKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(EdgeKind::Relation),
            1 => Some(EdgeKind::DependsOn),
            2 => Some(EdgeKind::Contains),
            3 => Some(EdgeKind::Sequence),
            4 => Some(EdgeKind::References),
            _ => None,
        }
    }
}

impl Default for EdgeKind {
    fn default() -> Self {
        EdgeKind::Relation
    }
}

/// Speaker of a dialog turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SpeakerRole {
    User = 0,
    Assistant = 1,
    System = 2,
    Tool = 3,
}

impl SpeakerRole {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SpeakerRole::User),
            1 => Some(SpeakerRole::Assistant),
            2 => Some(SpeakerRole::System),
            3 => Some(SpeakerRole::Tool),
            _ => None,
        }
    }
}
