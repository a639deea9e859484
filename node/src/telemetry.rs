// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Initialize Tracing (Logs)
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cim_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    // 2. Initialize Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Failed to install Prometheus recorder: {}", e),
    }

    metrics::describe_counter!("cim_envelopes_appended_total", "Envelopes durably appended");
    metrics::describe_counter!("cim_append_conflicts_total", "Appends that lost the head race");
    metrics::describe_histogram!("cim_append_duration_seconds", "Time to persist one append batch");
    metrics::describe_counter!("cim_replayed_envelopes_total", "Envelopes folded by projections");
    metrics::describe_counter!("cim_snapshot_hits_total", "Projections served from the snapshot cache");
    metrics::describe_counter!("cim_snapshot_misses_total", "Projections that had to fold envelopes");
    metrics::describe_counter!("cim_chain_breaks_total", "Verifications that found a broken chain");
    metrics::describe_counter!("cim_discarded_logs_total", "Logs removed at recovery for lacking a complete header");
    metrics::describe_counter!("cim_commands_rejected_total", "Commands rejected by business rules");
    metrics::describe_histogram!("cim_projection_duration_seconds", "Time spent folding one projection");
    metrics::describe_histogram!("cim_recovery_duration_seconds", "Time to recover all streams on open");

    metrics::gauge!("cim_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
