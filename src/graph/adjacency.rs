// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Adjacency helpers.
//!
//! Each node keeps the head of a singly linked list of its outgoing edges;
//! each edge points at the next one from the same source.

use alloc::vec::Vec;

use crate::error::{KernelError, Result};
use crate::graph::edge::GraphEdge;
use crate::graph::pool::{EdgePool, NodePool};
use crate::types::id::{EdgeId, NodeId};

/// Adds an edge to the graph, updating the adjacency list.
///
/// Every check runs before anything is written.
pub fn add_edge<const MAX_NODES: usize, const MAX_EDGES: usize>(
    nodes: &mut NodePool<MAX_NODES>,
    edges: &mut EdgePool<MAX_EDGES>,
    mut edge: GraphEdge,
) -> Result<EdgeId> {
    for endpoint in [edge.from, edge.to] {
        if !nodes.contains(endpoint) {
            return Err(KernelError::DanglingEdge {
                edge: edge.id,
                missing: endpoint,
            });
        }
    }
    if edges.contains(edge.id) {
        return Err(KernelError::DuplicateEdgeIdentity(edge.id));
    }
    if edges.is_full() {
        return Err(KernelError::CapacityExceeded);
    }

    let from = edge.from;
    let head = nodes.get(from).and_then(|n| n.first_out_edge);
    edge.next_out = head;
    let edge_id = edges.insert(edge)?;

    if let Some(node) = nodes.get_mut(from) {
        node.first_out_edge = Some(edge_id);
    }
    Ok(edge_id)
}

/// Removes an edge, unlinking it from its source's outgoing list.
pub fn remove_edge<const MAX_NODES: usize, const MAX_EDGES: usize>(
    nodes: &mut NodePool<MAX_NODES>,
    edges: &mut EdgePool<MAX_EDGES>,
    edge_id: EdgeId,
) -> Result<GraphEdge> {
    let edge = edges.get(edge_id).ok_or(KernelError::EdgeNotFound(edge_id))?;
    let from = edge.from;
    let next_id = edge.next_out;

    let mut prev_id: Option<EdgeId> = None;
    let mut curr_id = nodes.get(from).and_then(|n| n.first_out_edge);
    while let Some(c) = curr_id {
        if c == edge_id {
            match prev_id {
                Some(p) => {
                    if let Some(prev) = edges.get_mut(p) {
                        prev.next_out = next_id;
                    }
                }
                None => {
                    if let Some(node) = nodes.get_mut(from) {
                        node.first_out_edge = next_id;
                    }
                }
            }
            break;
        }
        prev_id = Some(c);
        curr_id = edges.get(c).and_then(|e| e.next_out);
    }

    edges.delete(edge_id)
}

/// Removes a node and every edge that references it.
pub fn remove_node_cascade<const MAX_NODES: usize, const MAX_EDGES: usize>(
    nodes: &mut NodePool<MAX_NODES>,
    edges: &mut EdgePool<MAX_EDGES>,
    node_id: NodeId,
) -> Result<Vec<EdgeId>> {
    if !nodes.contains(node_id) {
        return Err(KernelError::NodeNotFound(node_id));
    }

    let touching: Vec<EdgeId> = edges
        .iter()
        .filter(|e| e.touches(node_id))
        .map(|e| e.id)
        .collect();
    for edge_id in touching.iter() {
        remove_edge(nodes, edges, *edge_id)?;
    }

    nodes.delete(node_id)?;
    Ok(touching)
}

/// Iterator for outgoing edges of a node.
pub struct OutEdgeIterator<'a, const MAX_EDGES: usize> {
    edges: &'a EdgePool<MAX_EDGES>,
    current: Option<EdgeId>,
}

impl<'a, const MAX_EDGES: usize> OutEdgeIterator<'a, MAX_EDGES> {
    pub fn new(edges: &'a EdgePool<MAX_EDGES>, start: Option<EdgeId>) -> Self {
        Self {
            edges,
            current: start,
        }
    }
}

impl<'a, const MAX_EDGES: usize> Iterator for OutEdgeIterator<'a, MAX_EDGES> {
    type Item = &'a GraphEdge;

    fn next(&mut self) -> Option<Self::Item> {
        let curr_id = self.current?;
        let edge = self.edges.get(curr_id)?;
        self.current = edge.next_out;
        Some(edge)
    }
}
