// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Graph aggregate: nodes and edges with stable identities.

pub mod node;
pub mod edge;
pub mod pool;
pub mod adjacency;
pub mod events;
pub mod state;

pub use events::{GraphCommand, GraphEvent};
pub use state::{GraphMeta, GraphState};
