use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};
use cluster_supervisor::Supervisor;
use serde_json::json;

use crate::{error::ApiResult, response::success};

pub async fn get_status(State(supervisor): State<Arc<Supervisor>>) -> ApiResult<impl IntoResponse> {
    Ok(success(supervisor.get_status().await))
}

pub async fn get_cluster_info(
    State(supervisor): State<Arc<Supervisor>>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(json!({
        "supervisor_address": supervisor.address(),
        "local_deployment": supervisor.is_local_deployment().await,
        "worker_count": supervisor.worker_count().await,
        "selection_strategy": supervisor.strategy_name(),
    })))
}

pub async fn get_cluster_device_count(
    State(supervisor): State<Arc<Supervisor>>,
) -> ApiResult<impl IntoResponse> {
    let count = supervisor.device_count().await?;
    Ok(success(json!({ "count": count })))
}
