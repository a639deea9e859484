// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::extract::{Path, Query, Request as AxumRequest, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cim_kernel::aggregate::Aggregate;
use cim_kernel::cid::Cid;
use cim_kernel::dialog::DialogState;
use cim_kernel::graph::GraphState;
use cim_kernel::proof::StreamProof;
use cim_kernel::types::id::StreamId;
use cim_kernel::verify::VerificationResult;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::*;
use crate::engine::Engine;
use crate::errors::{EngineError, EngineResult, StoreError};
use crate::store::{ExportedEnvelope, StreamExport, StreamStore};

/// Everything the handlers share. Both engines sit on the same store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<StreamStore>,
    pub graph: Arc<Engine<GraphState>>,
    pub dialog: Arc<Engine<DialogState>>,
}

async fn auth_guard(
    State(token): State<Arc<Option<String>>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(token_str) = &*token {
        let provided = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.strip_prefix("Bearer "));

        if provided == Some(token_str.as_str()) {
            return Ok(next.run(req).await);
        }
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(state: AppState, auth_token: Option<String>) -> Router {
    let mut app = Router::new()
        .route("/v1/graph/:id/commands", post(graph_command))
        .route("/v1/graph/:id/state", get(graph_state))
        .route("/v1/graph/:id/proof", get(proof::<GraphState>))
        .route("/v1/dialog/:id/commands", post(dialog_command))
        .route("/v1/dialog/:id/state", get(dialog_state))
        .route("/v1/dialog/:id/proof", get(proof::<DialogState>))
        .route("/v1/streams/:id/verify", get(verify_stream))
        .route("/v1/streams/:id/history", get(stream_history))
        .route("/v1/streams/:id/export", get(stream_export))
        .route("/v1/envelopes/:cid", get(envelope_by_cid))
        .route("/v1/envelopes/:cid/ancestry", get(envelope_ancestry))
        .route("/v1/envelopes/:cid/graph", get(graph_state_at_cid))
        .route("/v1/envelopes/:cid/dialog", get(dialog_state_at_cid))
        .route("/v1/health", get(health))
        .with_state(state);

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        let auth_state = Arc::new(Some(token));
        app = app.layer(from_fn_with_state(auth_state, auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    // Scrapers do not carry the bearer token.
    app.route("/metrics", get(metrics_handler)).layer(TraceLayer::new_for_http())
}

fn stream_id(raw: &str) -> EngineResult<StreamId> {
    StreamId::new(raw).map_err(|e| EngineError::InvalidInput(e.to_string()))
}

fn cid(raw: &str) -> EngineResult<Cid> {
    raw.parse::<Cid>()
        .map_err(|_| EngineError::InvalidInput(format!("invalid CID {:?}", raw)))
}

fn command_status<A: Aggregate>(outcome: &crate::events::CommandOutcome<A>) -> StatusCode {
    if outcome.is_accepted() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

async fn graph_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GraphCommandRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let stream_id = stream_id(&id)?;
    let command = req.into_command().map_err(EngineError::InvalidInput)?;
    let outcome = state.graph.execute(&stream_id, &command)?;
    Ok((command_status(&outcome), Json(CommandResponse::from_outcome(&outcome))))
}

async fn dialog_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DialogCommandRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let stream_id = stream_id(&id)?;
    let command = req.into_command().map_err(EngineError::InvalidInput)?;
    let outcome = state.dialog.execute(&stream_id, &command)?;
    Ok((command_status(&outcome), Json(CommandResponse::from_outcome(&outcome))))
}

async fn graph_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GraphView>, EngineError> {
    let projection = state.graph.get_materialized_state(&stream_id(&id)?)?;
    Ok(Json(GraphView::from(&projection)))
}

async fn dialog_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DialogView>, EngineError> {
    let projection = state.dialog.get_materialized_state(&stream_id(&id)?)?;
    Ok(Json(DialogView::from(&projection)))
}

trait EngineFor<A: Aggregate> {
    fn engine(&self) -> &Engine<A>;
}

impl EngineFor<GraphState> for AppState {
    fn engine(&self) -> &Engine<GraphState> {
        &self.graph
    }
}

impl EngineFor<DialogState> for AppState {
    fn engine(&self) -> &Engine<DialogState> {
        &self.dialog
    }
}

async fn proof<A: Aggregate>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreamProof>, EngineError>
where
    AppState: EngineFor<A>,
{
    let proof = EngineFor::<A>::engine(&state).proof(&stream_id(&id)?)?;
    Ok(Json(proof))
}

async fn verify_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VerificationResult>, EngineError> {
    Ok(Json(state.store.verify(&stream_id(&id)?)?))
}

async fn stream_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<ExportedEnvelope>>, EngineError> {
    let range = state.store.read(&stream_id(&id)?, q.from.unwrap_or(0), q.to.unwrap_or(u64::MAX))?;
    let entries = range
        .map(|e| ExportedEnvelope::from(e.as_ref()))
        .collect();
    Ok(Json(entries))
}

async fn stream_export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreamExport>, EngineError> {
    Ok(Json(state.store.export(&stream_id(&id)?)?))
}

async fn envelope_by_cid(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<EnvelopeView>, EngineError> {
    let cid = cid(&raw)?;
    let envelope = state
        .store
        .envelope_by_cid(&cid)
        .ok_or(StoreError::UnknownCid(cid))?;
    Ok(Json(EnvelopeView {
        stream_id: envelope.stream_id.clone(),
        envelope: ExportedEnvelope::from(envelope.as_ref()),
    }))
}

async fn envelope_ancestry(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(q): Query<AncestryQuery>,
) -> Result<Json<StreamExport>, EngineError> {
    let depth = q.depth.unwrap_or(DEFAULT_ANCESTRY_DEPTH);
    Ok(Json(state.store.export_from(&cid(&raw)?, depth)?))
}

async fn graph_state_at_cid(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<GraphView>, EngineError> {
    let projection = state.graph.state_at_cid(&cid(&raw)?)?;
    Ok(Json(GraphView::from(&projection)))
}

async fn dialog_state_at_cid(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<DialogView>, EngineError> {
    let projection = state.dialog.state_at_cid(&cid(&raw)?)?;
    Ok(Json(DialogView::from(&projection)))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.store.stats();
    Json(HealthResponse {
        status: if state.store.is_closed() { "closed" } else { "ok" },
        streams: stats.streams,
        envelopes: stats.envelopes,
        sealed: stats.sealed,
    })
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
