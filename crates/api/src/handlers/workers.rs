use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use cluster_core::{config::validate_address, ClusterError, NodeStatus};
use cluster_supervisor::Supervisor;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    response::{created, ok_message, success},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWorkerRequest {
    pub address: String,
}

/// 注册Worker
pub async fn register_worker(
    State(supervisor): State<Arc<Supervisor>>,
    payload: Result<Json<RegisterWorkerRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    validate_address(&request.address).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    supervisor.register(&request.address).await?;
    Ok(created(
        json!({ "address": request.address }),
        "Worker注册成功".to_string(),
    ))
}

/// 注销Worker，不存在时同样返回成功
pub async fn deregister_worker(
    State(supervisor): State<Arc<Supervisor>>,
    Path(address): Path<String>,
) -> ApiResult<impl IntoResponse> {
    supervisor.deregister(&address).await?;
    Ok(ok_message(format!("Worker {address} 已注销")))
}

/// 接收Worker心跳上报的资源状态
pub async fn report_worker_status(
    State(supervisor): State<Arc<Supervisor>>,
    Path(address): Path<String>,
    payload: Result<Json<NodeStatus>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(status) = payload.map_err(|e| ClusterError::invalid_status(e.body_text()))?;
    supervisor.report_status(&address, status).await?;
    Ok(ok_message("状态已更新".to_string()))
}

/// 获取Worker列表
pub async fn list_workers(
    State(supervisor): State<Arc<Supervisor>>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(supervisor.worker_summaries().await))
}

/// 选出负载最低的Worker
pub async fn select_worker(
    State(supervisor): State<Arc<Supervisor>>,
) -> ApiResult<impl IntoResponse> {
    let address = supervisor.select_worker().await?;
    Ok(success(json!({ "address": address })))
}
