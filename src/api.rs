// src/api.rs
// Small operational HTTP surface: health check plus Prometheus exposition.

use axum::{routing::get, Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::json;

/// Install the Prometheus recorder. Call once at startup.
pub fn init_prometheus() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus: install recorder")
}

pub fn router(prometheus: PrometheusHandle) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/metrics",
            get(move || {
                let handle = prometheus.clone();
                async move { handle.render() }
            }),
        )
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "message": "OK" }))
}

/// Bind and serve the operational router until the process exits.
pub async fn serve(addr: String, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "health/metrics server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
