// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use cim_kernel::dialog::DialogState;
use cim_kernel::graph::GraphState;
use cim_node::config::NodeConfig;
use cim_node::engine::Engine;
use cim_node::notify::{BroadcastPublisher, LogPublisher};
use cim_node::server::{build_router, AppState};
use cim_node::store::StreamStore;
use cim_node::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    init_telemetry();

    let cfg = NodeConfig::from_env();
    tracing::info!("Initializing CIM Node with config: {:?}", cfg);

    let store = match StreamStore::open(cfg.store.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open stream store: {}", e);
            std::process::exit(1);
        }
    };
    let stats = store.stats();
    tracing::info!(
        "Recovered {} stream(s), {} envelope(s), {} sealed",
        stats.streams,
        stats.envelopes,
        stats.sealed
    );

    let graph_changes = Arc::new(BroadcastPublisher::<GraphState>::new(cfg.notify_capacity));
    let dialog_changes = Arc::new(BroadcastPublisher::<DialogState>::new(cfg.notify_capacity));

    let graph: Engine<GraphState> = Engine::new(store.clone(), &cfg)
        .with_publisher(graph_changes)
        .with_publisher(Arc::new(LogPublisher));
    let dialog: Engine<DialogState> = Engine::new(store.clone(), &cfg)
        .with_publisher(dialog_changes)
        .with_publisher(Arc::new(LogPublisher));

    let state = AppState {
        store: store.clone(),
        graph: Arc::new(graph),
        dialog: Arc::new(dialog),
    };
    let app = build_router(state, cfg.auth_token.clone());

    let addr = cfg.bind_addr;
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on {}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutdown requested");
    };
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!("Server error: {}", e);
    }

    if let Err(e) = store.close() {
        tracing::error!("Failed to close stream store: {}", e);
        std::process::exit(1);
    }
}
