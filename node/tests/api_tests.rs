// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cim_node::config::NodeConfig;
use cim_node::engine::Engine;
use cim_node::server::{build_router, AppState};
use cim_node::store::StreamStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

fn app(auth_token: Option<String>) -> Router {
    let cfg = NodeConfig::default();
    let store = Arc::new(StreamStore::in_memory());
    let state = AppState {
        store: store.clone(),
        graph: Arc::new(Engine::new(store.clone(), &cfg)),
        dialog: Arc::new(Engine::new(store, &cfg)),
    };
    build_router(state, auth_token)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_graph_commands_and_state() {
    let app = app(None);

    let (status, body) = call(&app, "POST", "/v1/graph/kb/commands", Some(json!({"type": "create_graph", "name": "kb"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], json!(true));
    assert_eq!(body["sequence"], json!(0));

    call(&app, "POST", "/v1/graph/kb/commands", Some(json!({"type": "add_node", "id": 1, "kind": 1, "attributes": {"label": "rust", "weight": 0.5}}))).await;
    call(&app, "POST", "/v1/graph/kb/commands", Some(json!({"type": "add_node", "id": 2}))).await;
    let (status, _) = call(&app, "POST", "/v1/graph/kb/commands", Some(json!({"type": "add_edge", "id": 7, "source": 1, "target": 2}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = call(&app, "GET", "/v1/graph/kb/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["name"], json!("kb"));
    assert_eq!(view["version"], json!(4));
    assert_eq!(view["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(view["nodes"][0]["attributes"]["weight"], json!(0.5));
    assert_eq!(view["edges"][0]["source"], json!(1));
    assert_eq!(view["head_cid"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_rejected_command_is_unprocessable() {
    let app = app(None);
    let (status, body) = call(&app, "POST", "/v1/graph/g/commands", Some(json!({"type": "add_edge", "id": 1, "source": 1, "target": 2}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["accepted"], json!(false));
    assert!(body["reason"].as_str().unwrap().contains("missing node"));

    // Nothing was appended, so the stream is still unknown.
    let (status, _) = call(&app, "GET", "/v1/graph/g/state", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_input_is_bad_request() {
    let app = app(None);
    let (status, _) = call(&app, "POST", "/v1/graph/g/commands", Some(json!({"type": "add_node", "id": 1, "kind": 42}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", "/v1/dialog/d/commands", Some(json!({"type": "add_turn", "role": 0, "content": "hi", "at_ms": 1, "sentiment": 1.0e9}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dialog_flow_verify_and_history() {
    let app = app(None);
    call(&app, "POST", "/v1/dialog/chat/commands", Some(json!({"type": "start_dialog", "title": "help"}))).await;
    for (role, at, s) in [(0, 100, 0.2), (1, 250, 0.6), (0, 400, 1.0)] {
        let (status, _) = call(
            &app,
            "POST",
            "/v1/dialog/chat/commands",
            Some(json!({"type": "add_turn", "role": role, "content": "msg", "at_ms": at, "sentiment": s, "tokens": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, view) = call(&app, "GET", "/v1/dialog/chat/state", None).await;
    assert_eq!(view["turns"].as_array().unwrap().len(), 3);
    assert_eq!(view["metrics"]["tokens_total"], json!(9));
    assert_eq!(view["metrics"]["average_response_ms"], json!(150));
    let trend = view["metrics"]["sentiment_trend"].as_f64().unwrap();
    assert!((trend - 0.7).abs() < 1e-3);

    let (status, verify) = call(&app, "GET", "/v1/streams/chat/verify", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verify["Intact"]["length"], json!(4));

    let (_, history) = call(&app, "GET", "/v1/streams/chat/history?from=1&to=2", None).await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["event_type"], json!("TurnAdded"));
    assert_eq!(entries[1]["previous_cid"], entries[0]["cid"]);

    let (status, proof) = call(&app, "GET", "/v1/dialog/chat/proof", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proof["aggregate"], json!("dialog"));
    assert_eq!(proof["length"], json!(4));
}

#[tokio::test]
async fn test_envelopes_addressed_by_cid() {
    let app = app(None);
    let mut cids = Vec::new();
    for body in [
        json!({"type": "create_graph", "name": "kb"}),
        json!({"type": "add_node", "id": 1}),
        json!({"type": "add_node", "id": 2}),
        json!({"type": "add_edge", "id": 3, "source": 1, "target": 2}),
    ] {
        let (_, resp) = call(&app, "POST", "/v1/graph/kb/commands", Some(body)).await;
        cids.push(resp["head_cid"].as_str().unwrap().to_string());
    }

    let (status, envelope) = call(&app, "GET", &format!("/v1/envelopes/{}", cids[1]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["stream_id"], json!("kb"));
    assert_eq!(envelope["sequence"], json!(1));
    assert_eq!(envelope["event_type"], json!("NodeAdded"));

    let (status, view) = call(&app, "GET", &format!("/v1/envelopes/{}/graph", cids[2]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["nodes"].as_array().unwrap().len(), 2);
    assert!(view["edges"].as_array().unwrap().is_empty());

    let (status, export) = call(&app, "GET", &format!("/v1/envelopes/{}/ancestry?depth=1", cids[3]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["root_cid"], json!(cids[3]));
    assert_eq!(export["length"], json!(4));
    let listed = export["envelopes"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["cid"], json!(cids[2]));

    let unknown = "ab".repeat(32);
    let (status, _) = call(&app, "GET", &format!("/v1/envelopes/{}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "GET", "/v1/envelopes/not-a-cid/graph", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_guard() {
    let app = app(Some("secret".to_string()));

    let (status, _) = call(&app, "GET", "/v1/health", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/v1/health")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Metrics stay scrapeable without the token.
    let (status, _) = call(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
}
