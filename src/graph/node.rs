// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Graph Node definition.

use serde::{Deserialize, Serialize};

use crate::types::attrs::Attributes;
use crate::types::enums::NodeKind;
use crate::types::id::{EdgeId, NodeId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub attributes: Attributes,
    /// Head of this node's outgoing edge list.
    pub first_out_edge: Option<EdgeId>,
}

impl GraphNode {
    pub fn new(id: NodeId, kind: NodeKind, attributes: Attributes) -> Self {
        Self {
            id,
            kind,
            attributes,
            first_out_edge: None,
        }
    }
}
