// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use crate::types::id::{EdgeId, NodeId, TurnId};

/// Why a payload could not be canonically encoded or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFault {
    EmptyEventType,
    EventTypeTooLong,
    PayloadTooLarge,
    NonFiniteNumber,
    Serialize,
    Deserialize,
    TrailingBytes,
    UnknownEventType,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// Payload cannot be canonically encoded (or decoded).
    #[error("encoding error: {0:?}")]
    Encoding(EncodingFault),
    /// Stream identifier is empty, too long or contains control characters.
    #[error("invalid stream identifier")]
    InvalidStreamId,
    /// A node with this identity already exists.
    #[error("duplicate node identity {0:?}")]
    DuplicateNodeIdentity(NodeId),
    /// An edge references an endpoint that does not exist.
    #[error("edge {edge:?} references missing node {missing:?}")]
    DanglingEdge { edge: EdgeId, missing: NodeId },
    #[error("duplicate edge identity {0:?}")]
    DuplicateEdgeIdentity(EdgeId),
    #[error("node {0:?} not found")]
    NodeNotFound(NodeId),
    #[error("edge {0:?} not found")]
    EdgeNotFound(EdgeId),
    #[error("self loop on node {0:?}")]
    SelfLoop(NodeId),
    /// Storage is full.
    #[error("capacity exceeded")]
    CapacityExceeded,
    #[error("dialog is closed")]
    DialogClosed,
    #[error("turn {0:?} is out of order")]
    TurnOutOfOrder(TurnId),
    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

impl From<EncodingFault> for KernelError {
    fn from(fault: EncodingFault) -> Self {
        KernelError::Encoding(fault)
    }
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
pub type Result<T> = KernelResult<T>;
