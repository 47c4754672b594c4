use axum::{extract::State, Json};
use cluster_core::WorkerHandle;
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let mut body = json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "cluster",
        "version": env!("CARGO_PKG_VERSION"),
    });

    if let Some(supervisor) = &state.supervisor {
        body["supervisor"] = json!({
            "address": supervisor.address(),
            "uptime": supervisor.uptime().as_secs(),
            "worker_count": supervisor.worker_count().await,
        });
    }
    if let Some(worker) = &state.worker {
        body["worker"] = json!({
            "address": worker.address(),
            "state": worker.state().await,
        });
    }

    Json(body)
}
