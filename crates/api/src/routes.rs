use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use cluster_core::config::ApiConfig;
use cluster_supervisor::Supervisor;
use cluster_worker::WorkerNode;

use crate::handlers::{
    cluster::{get_cluster_device_count, get_cluster_info, get_status},
    health::health_check,
    models::{get_device_count, get_model_count, launch_model, list_models, terminate_model},
    workers::{deregister_worker, list_workers, register_worker, report_worker_status, select_worker},
};
use crate::middleware::{cors_layer, trace_layer};

/// API应用状态，本地模式下两者同时存在
#[derive(Clone, Default)]
pub struct AppState {
    pub supervisor: Option<Arc<Supervisor>>,
    pub worker: Option<Arc<WorkerNode>>,
}

/// Supervisor路由
pub fn supervisor_routes(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/api/v1/workers", get(list_workers).post(register_worker))
        .route("/api/v1/workers/select", post(select_worker))
        .route("/api/v1/workers/{address}", delete(deregister_worker))
        .route("/api/v1/workers/{address}/status", post(report_worker_status))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/cluster", get(get_cluster_info))
        .route("/api/v1/cluster/devices", get(get_cluster_device_count))
        .with_state(supervisor)
}

/// Worker路由
pub fn worker_routes(worker: Arc<WorkerNode>) -> Router {
    Router::new()
        .route("/api/v1/models", get(list_models))
        .route("/api/v1/models/count", get(get_model_count))
        .route("/api/v1/models/{uid}", post(launch_model).delete(terminate_model))
        .route("/api/v1/devices", get(get_device_count))
        .with_state(worker)
}

/// 创建API路由
pub fn create_routes(state: AppState, config: &ApiConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .with_state(state.clone());

    if let Some(supervisor) = state.supervisor {
        router = router.merge(supervisor_routes(supervisor));
    }
    if let Some(worker) = state.worker {
        router = router.merge(worker_routes(worker));
    }

    let router = router.layer(trace_layer());
    if config.cors_enabled {
        router.layer(cors_layer(config))
    } else {
        router
    }
}
