use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use cluster_core::WorkerHandle;
use cluster_worker::WorkerNode;
use serde_json::json;

use crate::{
    error::ApiResult,
    response::{created, ok_message, success},
};

pub async fn get_model_count(State(worker): State<Arc<WorkerNode>>) -> ApiResult<impl IntoResponse> {
    let count = worker.running_model_count().await?;
    Ok(success(json!({ "count": count })))
}

pub async fn list_models(State(worker): State<Arc<WorkerNode>>) -> ApiResult<impl IntoResponse> {
    Ok(success(worker.running_models().await))
}

pub async fn launch_model(
    State(worker): State<Arc<WorkerNode>>,
    Path(uid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    worker.launch_model(&uid).await?;
    Ok(created(json!({ "uid": uid }), "模型已启动".to_string()))
}

pub async fn terminate_model(
    State(worker): State<Arc<WorkerNode>>,
    Path(uid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    worker.terminate_model(&uid).await?;
    Ok(ok_message(format!("模型 {uid} 已停止")))
}

pub async fn get_device_count(State(worker): State<Arc<WorkerNode>>) -> ApiResult<impl IntoResponse> {
    let count = worker.device_count().await?;
    Ok(success(json!({ "count": count })))
}
