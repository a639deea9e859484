// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Graph events and commands.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;
use crate::types::attrs::Attributes;
use crate::types::enums::{EdgeKind, NodeKind};
use crate::types::id::{EdgeId, NodeId};

/// Facts recorded in a graph stream.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum GraphEvent {
    GraphCreated { name: String },
    GraphRenamed { name: String },
    GraphTagged { tag: String },
    GraphUntagged { tag: String },
    NodeAdded { id: NodeId, kind: NodeKind, attributes: Attributes },
    NodeUpdated { id: NodeId, set: Attributes, unset: Vec<String> },
    /// Also removes every edge that references the node.
    NodeRemoved { id: NodeId },
    EdgeAdded { id: EdgeId, source: NodeId, target: NodeId, kind: EdgeKind, attributes: Attributes },
    EdgeRemoved { id: EdgeId },
}

impl DomainEvent for GraphEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GraphEvent::GraphCreated { .. } => "GraphCreated",
            GraphEvent::GraphRenamed { .. } => "GraphRenamed",
            GraphEvent::GraphTagged { .. } => "GraphTagged",
            GraphEvent::GraphUntagged { .. } => "GraphUntagged",
            GraphEvent::NodeAdded { .. } => "NodeAdded",
            GraphEvent::NodeUpdated { .. } => "NodeUpdated",
            GraphEvent::NodeRemoved { .. } => "NodeRemoved",
            GraphEvent::EdgeAdded { .. } => "EdgeAdded",
            GraphEvent::EdgeRemoved { .. } => "EdgeRemoved",
        }
    }
}

/// Requests against a graph aggregate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum GraphCommand {
    CreateGraph { name: String },
    RenameGraph { name: String },
    TagGraph { tag: String },
    UntagGraph { tag: String },
    AddNode { id: NodeId, kind: NodeKind, attributes: Attributes },
    UpdateNode { id: NodeId, set: Attributes, unset: Vec<String> },
    RemoveNode { id: NodeId },
    AddEdge { id: EdgeId, source: NodeId, target: NodeId, kind: EdgeKind, attributes: Attributes },
    RemoveEdge { id: EdgeId },
}
