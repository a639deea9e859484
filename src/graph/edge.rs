// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Graph Edge definition.

use serde::{Deserialize, Serialize};

use crate::types::attrs::Attributes;
use crate::types::enums::EdgeKind;
use crate::types::id::{EdgeId, NodeId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub from: NodeId,
    pub to: NodeId,
    pub attributes: Attributes,
    /// Next edge in the source node's outgoing list.
    pub next_out: Option<EdgeId>,
}

impl GraphEdge {
    pub fn new(id: EdgeId, kind: EdgeKind, from: NodeId, to: NodeId, attributes: Attributes) -> Self {
        Self {
            id,
            kind,
            from,
            to,
            attributes,
            next_out: None,
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }
}
