// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Graph Node and Edge Pools.
//!
//! Flat arenas keyed by stable identity. Cross references between nodes and
//! edges are identity lookups, never pointers.

use alloc::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::graph::edge::GraphEdge;
use crate::graph::node::GraphNode;
use crate::types::id::{EdgeId, NodeId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool<const CAP: usize> {
    pub(crate) nodes: BTreeMap<NodeId, GraphNode>,
}

impl<const CAP: usize> Default for NodePool<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> NodePool<CAP> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, node: GraphNode) -> Result<NodeId> {
        if self.nodes.contains_key(&node.id) {
            return Err(KernelError::DuplicateNodeIdentity(node.id));
        }
        if self.is_full() {
            return Err(KernelError::CapacityExceeded);
        }
        let id = node.id;
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(&id)
    }

    pub fn delete(&mut self, id: NodeId) -> Result<GraphNode> {
        self.nodes.remove(&id).ok_or(KernelError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= CAP
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePool<const CAP: usize> {
    pub(crate) edges: BTreeMap<EdgeId, GraphEdge>,
}

impl<const CAP: usize> Default for EdgePool<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> EdgePool<CAP> {
    pub fn new() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, edge: GraphEdge) -> Result<EdgeId> {
        if self.edges.contains_key(&edge.id) {
            return Err(KernelError::DuplicateEdgeIdentity(edge.id));
        }
        if self.is_full() {
            return Err(KernelError::CapacityExceeded);
        }
        let id = edge.id;
        self.edges.insert(id, edge);
        Ok(id)
    }

    pub fn get(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edges.get(&id)
    }

    pub fn get_mut(&mut self, id: EdgeId) -> Option<&mut GraphEdge> {
        self.edges.get_mut(&id)
    }

    pub fn delete(&mut self, id: EdgeId) -> Result<GraphEdge> {
        self.edges.remove(&id).ok_or(KernelError::EdgeNotFound(id))
    }

    pub fn contains(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= CAP
    }
}
