// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Graph aggregate state.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::config::{MAX_GRAPH_EDGES, MAX_GRAPH_NODES};
use crate::digest::graph_state_hash;
use crate::error::{KernelError, Result};
use crate::graph::adjacency::{add_edge, remove_edge, remove_node_cascade, OutEdgeIterator};
use crate::graph::edge::GraphEdge;
use crate::graph::events::{GraphCommand, GraphEvent};
use crate::graph::node::GraphNode;
use crate::graph::pool::{EdgePool, NodePool};
use crate::types::id::{EdgeId, NodeId, Version};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMeta {
    pub created: bool,
    pub name: String,
    pub tags: BTreeSet<String>,
}

/// Directed graph with stable node and edge identities and no dangling edges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphState {
    pub(crate) version: Version,
    pub(crate) meta: GraphMeta,
    pub(crate) nodes: NodePool<MAX_GRAPH_NODES>,
    pub(crate) edges: EdgePool<MAX_GRAPH_EDGES>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Read APIs ---

    pub fn meta(&self) -> &GraphMeta {
        &self.meta
    }

    pub fn get_node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn outgoing_edges(&self, node_id: NodeId) -> Option<OutEdgeIterator<'_, MAX_GRAPH_EDGES>> {
        self.nodes
            .get(node_id)
            .map(|node| OutEdgeIterator::new(&self.edges, node.first_out_edge))
    }

    pub fn incoming_edges(&self, node_id: NodeId) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.to == node_id)
    }

    // --- Write Logic ---

    fn fold(&mut self, event: &GraphEvent) -> Result<()> {
        match event {
            GraphEvent::GraphCreated { name } => {
                if self.meta.created || self.version.0 != 0 {
                    return Err(KernelError::InvalidOperation("graph already created"));
                }
                self.meta.created = true;
                self.meta.name = name.clone();
            }
            GraphEvent::GraphRenamed { name } => {
                self.meta.name = name.clone();
            }
            GraphEvent::GraphTagged { tag } => {
                self.meta.tags.insert(tag.clone());
            }
            GraphEvent::GraphUntagged { tag } => {
                if !self.meta.tags.remove(tag) {
                    return Err(KernelError::InvalidOperation("tag not present"));
                }
            }
            GraphEvent::NodeAdded { id, kind, attributes } => {
                self.nodes.insert(GraphNode::new(*id, *kind, attributes.clone()))?;
            }
            GraphEvent::NodeUpdated { id, set, unset } => {
                let node = self.nodes.get_mut(*id).ok_or(KernelError::NodeNotFound(*id))?;
                for key in unset {
                    node.attributes.remove(key);
                }
                for (key, value) in set {
                    node.attributes.insert(key.clone(), value.clone());
                }
            }
            GraphEvent::NodeRemoved { id } => {
                remove_node_cascade(&mut self.nodes, &mut self.edges, *id)?;
            }
            GraphEvent::EdgeAdded { id, source, target, kind, attributes } => {
                let edge = GraphEdge::new(*id, *kind, *source, *target, attributes.clone());
                add_edge(&mut self.nodes, &mut self.edges, edge)?;
            }
            GraphEvent::EdgeRemoved { id } => {
                remove_edge(&mut self.nodes, &mut self.edges, *id)?;
            }
        }
        Ok(())
    }

    // --- Invariant Checker ---

    /// Checks the internal consistency of the graph.
    pub fn check_invariants(&self) -> Result<()> {
        for (id, node) in self.nodes.nodes.iter() {
            if node.id != *id {
                return Err(KernelError::InvalidOperation("node keyed under foreign id"));
            }
            if let Some(eid) = node.first_out_edge {
                let edge = self.edges.get(eid).ok_or(KernelError::EdgeNotFound(eid))?;
                if edge.from != node.id {
                    return Err(KernelError::InvalidOperation("adjacency head from another node"));
                }
            }
        }

        let mut linked = 0usize;
        for node in self.nodes.iter() {
            for edge in OutEdgeIterator::new(&self.edges, node.first_out_edge) {
                if edge.from != node.id {
                    return Err(KernelError::InvalidOperation("adjacency list crosses nodes"));
                }
                linked += 1;
            }
        }

        for (id, edge) in self.edges.edges.iter() {
            if edge.id != *id {
                return Err(KernelError::InvalidOperation("edge keyed under foreign id"));
            }
            for endpoint in [edge.from, edge.to] {
                if !self.nodes.contains(endpoint) {
                    return Err(KernelError::DanglingEdge { edge: edge.id, missing: endpoint });
                }
            }
        }

        if linked != self.edges.len() {
            return Err(KernelError::InvalidOperation("edge missing from adjacency list"));
        }
        Ok(())
    }
}

impl Aggregate for GraphState {
    type Event = GraphEvent;
    type Command = GraphCommand;

    const KIND: &'static str = "graph";

    fn apply(&mut self, event: &GraphEvent) -> Result<()> {
        self.fold(event)?;
        self.version = self.version.next();
        Ok(())
    }

    fn handle(&self, command: &GraphCommand) -> Result<Vec<GraphEvent>> {
        let event = match command {
            GraphCommand::CreateGraph { name } => {
                if self.meta.created {
                    return Err(KernelError::InvalidOperation("graph already created"));
                }
                GraphEvent::GraphCreated { name: name.clone() }
            }
            GraphCommand::RenameGraph { name } => {
                if name.is_empty() {
                    return Err(KernelError::InvalidOperation("graph name must not be empty"));
                }
                GraphEvent::GraphRenamed { name: name.clone() }
            }
            GraphCommand::TagGraph { tag } => {
                if tag.is_empty() {
                    return Err(KernelError::InvalidOperation("tag must not be empty"));
                }
                GraphEvent::GraphTagged { tag: tag.clone() }
            }
            GraphCommand::UntagGraph { tag } => GraphEvent::GraphUntagged { tag: tag.clone() },
            GraphCommand::AddNode { id, kind, attributes } => GraphEvent::NodeAdded {
                id: *id,
                kind: *kind,
                attributes: attributes.clone(),
            },
            GraphCommand::UpdateNode { id, set, unset } => {
                if set.is_empty() && unset.is_empty() {
                    return Err(KernelError::InvalidOperation("node update changes nothing"));
                }
                GraphEvent::NodeUpdated {
                    id: *id,
                    set: set.clone(),
                    unset: unset.clone(),
                }
            }
            GraphCommand::RemoveNode { id } => GraphEvent::NodeRemoved { id: *id },
            GraphCommand::AddEdge { id, source, target, kind, attributes } => {
                if source == target {
                    return Err(KernelError::SelfLoop(*source));
                }
                GraphEvent::EdgeAdded {
                    id: *id,
                    source: *source,
                    target: *target,
                    kind: *kind,
                    attributes: attributes.clone(),
                }
            }
            GraphCommand::RemoveEdge { id } => GraphEvent::EdgeRemoved { id: *id },
        };
        Ok(vec![event])
    }

    fn version(&self) -> Version {
        self.version
    }

    fn digest(&self) -> [u8; 32] {
        graph_state_hash(self)
    }
}
