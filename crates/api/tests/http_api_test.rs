use std::sync::Arc;
use std::time::Duration;

use cluster_api::{create_routes, supervisor_routes, worker_routes, AppState};
use cluster_core::{
    config::ApiConfig, ClusterError, NodeStatus, ResourceStatus, SupervisorService,
};
use cluster_supervisor::{HttpWorkerConnector, LocalWorkerConnector, Supervisor};
use cluster_worker::{
    HttpSupervisorClient, StaticResourceProbe, WorkerNode, WorkerNodeConfig, WorkerState,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

struct TestSupervisor {
    address: String,
    supervisor: Arc<Supervisor>,
    http: reqwest::Client,
}

impl TestSupervisor {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let address = listener.local_addr().unwrap().to_string();

        let connector = HttpWorkerConnector::new(Duration::from_secs(2)).unwrap();
        let supervisor = Arc::new(Supervisor::new(
            address.clone(),
            Arc::new(connector),
            Duration::from_secs(2),
        ));

        let app = supervisor_routes(Arc::clone(&supervisor));
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to start test server");
        });

        Self {
            address,
            supervisor,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    fn client(&self) -> HttpSupervisorClient {
        HttpSupervisorClient::new(&self.address, Duration::from_secs(2)).unwrap()
    }
}

async fn spawn_worker(supervisor_address: &str) -> Arc<WorkerNode> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let config = WorkerNodeConfig::builder(address)
        .heartbeat_interval(Duration::from_millis(50))
        .report_timeout(Duration::from_secs(1))
        .build();
    let client = HttpSupervisorClient::new(supervisor_address, Duration::from_secs(1)).unwrap();
    let probe = StaticResourceProbe::default().cpu(ResourceStatus::new(0.5, 8.0, 1000, 2000));
    let worker = Arc::new(WorkerNode::new(config, Arc::new(client), Arc::new(probe)));

    let app = worker_routes(Arc::clone(&worker));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    worker
}

fn cpu_status(available: f64) -> NodeStatus {
    let mut status = NodeStatus::new();
    status.insert(
        "cpu".to_string(),
        ResourceStatus::new(available, 8.0, 1000, 2000),
    );
    status
}

#[tokio::test]
async fn test_register_duplicate_and_deregister() {
    let server = TestSupervisor::spawn().await;

    let response = server
        .http
        .post(server.url("/api/v1/workers"))
        .json(&json!({ "address": "10.0.0.1:9998" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let response = server
        .http
        .post(server.url("/api/v1/workers"))
        .json(&json!({ "address": "10.0.0.1:9998" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "DUPLICATE_WORKER");

    let response = server
        .http
        .delete(server.url("/api/v1/workers/10.0.0.1:9998"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // 重复注销仍然成功
    let response = server
        .http
        .delete(server.url("/api/v1/workers/10.0.0.1:9998"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(server.supervisor.worker_count().await, 0);
}

#[tokio::test]
async fn test_register_rejects_malformed_address() {
    let server = TestSupervisor::spawn().await;

    let response = server
        .http
        .post(server.url("/api/v1/workers"))
        .json(&json!({ "address": "no-port" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = server
        .http
        .post(server.url("/api/v1/workers"))
        .json(&json!({ "host": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_report_status_error_codes() {
    let server = TestSupervisor::spawn().await;

    let response = server
        .http
        .post(server.url("/api/v1/workers/ghost:1/status"))
        .json(&cpu_status(0.5))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNKNOWN_WORKER");

    server.supervisor.register("10.0.0.1:1").await.unwrap();
    let response = server
        .http
        .post(server.url("/api/v1/workers/10.0.0.1:1/status"))
        .json(&cpu_status(2.0))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_STATUS");

    let response = server
        .http
        .post(server.url("/api/v1/workers/10.0.0.1:1/status"))
        .json(&json!({ "cpu": { "available": "lots" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_http_client_maps_status_codes() {
    let server = TestSupervisor::spawn().await;
    let client = server.client();

    client.register("10.0.0.1:1").await.unwrap();
    let err = client.register("10.0.0.1:1").await.unwrap_err();
    assert!(matches!(err, ClusterError::DuplicateWorker { .. }));

    let err = client
        .report_status("10.0.0.9:1", cpu_status(0.5))
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::UnknownWorker { .. }));

    let err = client
        .report_status("10.0.0.1:1", cpu_status(-0.1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::InvalidStatus(_)));

    client.report_status("10.0.0.1:1", cpu_status(0.75)).await.unwrap();
    client.deregister("10.0.0.1:1").await.unwrap();
    client.deregister("10.0.0.1:1").await.unwrap();
}

#[tokio::test]
async fn test_select_with_empty_registry() {
    let server = TestSupervisor::spawn().await;

    let response = server
        .http
        .post(server.url("/api/v1/workers/select"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NO_AVAILABLE_WORKER");
}

#[tokio::test]
async fn test_worker_round_trip_over_http() {
    let server = TestSupervisor::spawn().await;
    let worker_a = spawn_worker(&server.address).await;
    let worker_b = spawn_worker(&server.address).await;
    worker_a.start().await.unwrap();
    worker_b.start().await.unwrap();

    let address_a = cluster_core::WorkerHandle::address(worker_a.as_ref()).to_string();
    let address_b = cluster_core::WorkerHandle::address(worker_b.as_ref()).to_string();

    // 等待两次心跳都到达
    let mut reported = false;
    for _ in 0..100 {
        let status = server.supervisor.get_status().await;
        if status.workers.values().all(|s| !s.is_empty()) && status.workers.len() == 2 {
            reported = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reported);

    let body: Value = server
        .http
        .get(server.url("/api/v1/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["workers"][&address_a]["cpu"]["available"], 0.5);
    assert!(body["data"]["uptime"].is_u64());

    worker_a.launch_model("model-1").await.unwrap();
    let body: Value = server
        .http
        .post(server.url("/api/v1/workers/select"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["address"], address_b.as_str());

    let body: Value = server
        .http
        .get(server.url("/api/v1/workers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"][0]["address"], address_a.as_str());
    assert_eq!(body["data"][0]["running_model_count"], 1);

    let body: Value = server
        .http
        .get(server.url("/api/v1/cluster"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["local_deployment"], false);
    assert_eq!(body["data"]["worker_count"], 2);

    worker_a.shutdown().await.unwrap();
    worker_b.shutdown().await.unwrap();
    assert_eq!(worker_a.state().await, WorkerState::Terminated);
    assert_eq!(server.supervisor.worker_count().await, 0);
}

#[tokio::test]
async fn test_worker_model_routes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let worker = Arc::new(WorkerNode::new(
        WorkerNodeConfig::builder(address.clone()).build(),
        Arc::new(Supervisor::new(
            "127.0.0.1:9997",
            Arc::new(LocalWorkerConnector::new()),
            Duration::from_secs(1),
        )),
        Arc::new(StaticResourceProbe::default()),
    ));
    let app = worker_routes(Arc::clone(&worker));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let http = reqwest::Client::new();
    let base = format!("http://{address}");

    let response = http
        .post(format!("{base}/api/v1/models/qwen-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let response = http
        .post(format!("{base}/api/v1/models/qwen-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let body: Value = http
        .get(format!("{base}/api/v1/models/count"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["count"], 1);

    let response = http
        .delete(format!("{base}/api/v1/models/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MODEL_NOT_FOUND");
}

#[tokio::test]
async fn test_local_routes_share_one_address() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let connector = Arc::new(LocalWorkerConnector::new());
    let supervisor = Arc::new(Supervisor::new(
        address.clone(),
        connector.clone(),
        Duration::from_secs(1),
    ));
    let worker = Arc::new(WorkerNode::new(
        WorkerNodeConfig::builder(address.clone()).build(),
        supervisor.clone(),
        Arc::new(StaticResourceProbe::default().cpu(ResourceStatus::new(1.0, 2.0, 1, 2))),
    ));
    connector.attach(worker.clone()).await;
    worker.start().await.unwrap();

    let state = AppState {
        supervisor: Some(Arc::clone(&supervisor)),
        worker: Some(Arc::clone(&worker)),
    };
    let app = create_routes(state, &ApiConfig::default());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let http = reqwest::Client::new();
    let base = format!("http://{address}");

    let body: Value = http
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["supervisor"]["worker_count"], 1);
    assert_eq!(body["worker"]["state"], "ACTIVE");

    let body: Value = http
        .get(format!("{base}/api/v1/cluster"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["local_deployment"], true);

    let body: Value = http
        .post(format!("{base}/api/v1/workers/select"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["address"], address.as_str());

    let response = http
        .get(format!("{base}/api/v1/cluster/devices"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    worker.shutdown().await.unwrap();
}
