// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cim_kernel::cid::Cid;
use cim_kernel::error::KernelError;
use cim_kernel::types::id::StreamId;
use cim_kernel::types::Sequence;
use cim_kernel::verify::ChainBreak;
use serde_json::json;
use thiserror::Error;

use crate::events::event_log::EventLogError;
use crate::events::event_replay::ReplayError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown stream {0}")]
    UnknownStream(StreamId),

    #[error("no envelope with CID {0}")]
    UnknownCid(Cid),

    #[error("concurrent append conflict on {stream_id}: expected head {expected:?}, found {actual:?}")]
    ConcurrentAppendConflict {
        stream_id: StreamId,
        expected: Option<Cid>,
        actual: Option<Cid>,
    },

    #[error("stream {0} is archived")]
    StreamArchived(StreamId),

    #[error("encoding error: {0}")]
    Encoding(KernelError),

    #[error("chain mismatch in {stream_id} at sequence {}", chain_break.sequence)]
    ChainMismatch {
        stream_id: StreamId,
        chain_break: ChainBreak,
    },

    #[error("append batch is empty")]
    EmptyBatch,

    #[error("store is closed")]
    Closed,

    #[error("event log error: {0}")]
    Log(#[from] EventLogError),

    #[error("recovery failed: {0}")]
    Recovery(ReplayError),
}

impl From<ReplayError> for StoreError {
    fn from(e: ReplayError) -> Self {
        match e {
            ReplayError::ChainMismatch { stream_id, chain_break } => {
                StoreError::ChainMismatch { stream_id, chain_break }
            }
            other => StoreError::Recovery(other),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A durable envelope violates the aggregate's fold rules.
    #[error("projection of {stream_id} inconsistent at sequence {sequence}: {cause}")]
    ProjectionInconsistent {
        stream_id: StreamId,
        sequence: Sequence,
        cause: KernelError,
    },

    #[error("projection cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Store(store_err) => match store_err {
                StoreError::UnknownStream(_) | StoreError::UnknownCid(_) => StatusCode::NOT_FOUND,
                StoreError::ConcurrentAppendConflict { .. } => StatusCode::CONFLICT,
                StoreError::StreamArchived(_) => StatusCode::GONE,
                StoreError::Encoding(_) | StoreError::EmptyBatch => StatusCode::BAD_REQUEST,
                StoreError::ChainMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                StoreError::Closed => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Log(_) | StoreError::Recovery(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            EngineError::ProjectionInconsistent { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<KernelError> for EngineError {
    fn from(e: KernelError) -> Self {
        EngineError::InvalidInput(e.to_string())
    }
}
