use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cluster_core::{
    ClusterError, ClusterResult, NodeStatus, ResourceStatus, SupervisorService, WorkerHandle,
};
use cluster_supervisor::{LocalWorkerConnector, Supervisor};
use cluster_worker::{
    ResourceProbe, StaticResourceProbe, WorkerNode, WorkerNodeConfig, WorkerState,
};

const WORKER_ADDRESS: &str = "127.0.0.1:9998";

fn fast_config(address: &str) -> WorkerNodeConfig {
    WorkerNodeConfig::builder(address)
        .heartbeat_interval(Duration::from_millis(20))
        .report_timeout(Duration::from_millis(200))
        .build()
}

fn static_probe() -> Arc<dyn ResourceProbe> {
    Arc::new(StaticResourceProbe::default().cpu(ResourceStatus::new(0.5, 8.0, 1000, 2000)))
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// 记录调用顺序，可配置上报失败次数
#[derive(Default)]
struct RecordingSupervisor {
    events: Mutex<Vec<String>>,
    failing_reports: AtomicU32,
    hang_reports: bool,
    slow_deregister: Option<Duration>,
}

impl RecordingSupervisor {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

#[async_trait]
impl SupervisorService for RecordingSupervisor {
    async fn register(&self, _address: &str) -> ClusterResult<()> {
        self.events.lock().unwrap().push("register".to_string());
        Ok(())
    }

    async fn deregister(&self, _address: &str) -> ClusterResult<()> {
        if let Some(delay) = self.slow_deregister {
            tokio::time::sleep(delay).await;
        }
        self.events.lock().unwrap().push("deregister".to_string());
        Ok(())
    }

    async fn report_status(&self, _address: &str, _status: NodeStatus) -> ClusterResult<()> {
        if self.hang_reports {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let remaining = self.failing_reports.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_reports.store(remaining - 1, Ordering::SeqCst);
            self.events.lock().unwrap().push("report_failed".to_string());
            return Err(ClusterError::Network("supervisor unavailable".to_string()));
        }
        self.events.lock().unwrap().push("report".to_string());
        Ok(())
    }
}

struct FlakyProbe {
    calls: AtomicU32,
    fail_first: u32,
}

impl ResourceProbe for FlakyProbe {
    fn probe(&self) -> ClusterResult<NodeStatus> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(ClusterError::Internal("probe failed".to_string()));
        }
        let mut status = NodeStatus::new();
        status.insert("cpu".to_string(), ResourceStatus::new(0.9, 4.0, 10, 20));
        Ok(status)
    }
}

#[tokio::test]
async fn test_worker_registers_and_reports_to_supervisor() {
    let supervisor = Arc::new(Supervisor::new(
        "127.0.0.1:9997",
        Arc::new(LocalWorkerConnector::new()),
        Duration::from_secs(1),
    ));
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), static_probe());

    node.start().await.unwrap();
    assert_eq!(node.state().await, WorkerState::Active);
    assert!(supervisor.is_registered(WORKER_ADDRESS).await);

    wait_until(|| {
        let supervisor = Arc::clone(&supervisor);
        async move { !supervisor.get_status().await.workers[WORKER_ADDRESS].is_empty() }
    })
    .await;

    let status = supervisor.get_status().await;
    assert_eq!(status.workers[WORKER_ADDRESS]["cpu"].available, 0.5);

    node.shutdown().await.unwrap();
    assert_eq!(node.state().await, WorkerState::Terminated);
    assert!(!supervisor.is_registered(WORKER_ADDRESS).await);
}

#[tokio::test]
async fn test_duplicate_registration_aborts_startup() {
    let supervisor = Arc::new(Supervisor::new(
        "127.0.0.1:9997",
        Arc::new(LocalWorkerConnector::new()),
        Duration::from_secs(1),
    ));
    supervisor.register(WORKER_ADDRESS).await.unwrap();

    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), static_probe());
    let err = node.start().await.unwrap_err();

    assert!(matches!(err, ClusterError::DuplicateWorker { .. }));
    assert_eq!(node.state().await, WorkerState::Failed);
    assert_eq!(supervisor.worker_count().await, 1);

    node.shutdown().await.unwrap();
    assert_eq!(node.state().await, WorkerState::Terminated);
}

#[tokio::test]
async fn test_invalid_lifecycle_transitions() {
    let supervisor = Arc::new(RecordingSupervisor::default());
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), static_probe());

    node.start().await.unwrap();
    let err = node.start().await.unwrap_err();
    assert!(matches!(err, ClusterError::InvalidState(_)));

    node.shutdown().await.unwrap();
    node.shutdown().await.unwrap();
    assert_eq!(supervisor.count("deregister"), 1);

    let err = node.start().await.unwrap_err();
    assert!(matches!(err, ClusterError::InvalidState(_)));
}

#[tokio::test]
async fn test_heartbeat_survives_report_errors() {
    let supervisor = Arc::new(RecordingSupervisor {
        failing_reports: AtomicU32::new(2),
        ..Default::default()
    });
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), static_probe());

    node.start().await.unwrap();
    wait_until(|| {
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.count("report") >= 2 }
    })
    .await;
    node.shutdown().await.unwrap();

    assert_eq!(supervisor.count("report_failed"), 2);
}

#[tokio::test]
async fn test_heartbeat_survives_probe_errors() {
    let supervisor = Arc::new(RecordingSupervisor::default());
    let probe = Arc::new(FlakyProbe {
        calls: AtomicU32::new(0),
        fail_first: 3,
    });
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), probe.clone());

    node.start().await.unwrap();
    wait_until(|| {
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.count("report") >= 1 }
    })
    .await;
    node.shutdown().await.unwrap();

    assert!(probe.calls.load(Ordering::SeqCst) >= 4);
}

#[tokio::test]
async fn test_shutdown_stops_heartbeat_before_deregister() {
    let supervisor = Arc::new(RecordingSupervisor::default());
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), static_probe());

    node.start().await.unwrap();
    wait_until(|| {
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.count("report") >= 2 }
    })
    .await;
    node.shutdown().await.unwrap();

    let events = supervisor.events();
    assert_eq!(events.first().map(String::as_str), Some("register"));
    assert_eq!(events.last().map(String::as_str), Some("deregister"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(supervisor.events(), events);
}

#[tokio::test]
async fn test_shutdown_not_blocked_by_hanging_report() {
    let supervisor = Arc::new(RecordingSupervisor {
        hang_reports: true,
        ..Default::default()
    });
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), static_probe());

    node.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), node.shutdown())
        .await
        .expect("shutdown should not hang")
        .unwrap();
    assert_eq!(supervisor.count("deregister"), 1);
}

#[tokio::test]
async fn test_report_now_times_out() {
    let supervisor = Arc::new(RecordingSupervisor {
        hang_reports: true,
        ..Default::default()
    });
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor, static_probe());

    let err = node.report_now().await.unwrap_err();
    assert!(matches!(err, ClusterError::Timeout(_)));
}

#[tokio::test]
async fn test_model_bookkeeping_drives_selection() {
    let connector = Arc::new(LocalWorkerConnector::new());
    let supervisor = Arc::new(Supervisor::new(
        "127.0.0.1:9997",
        connector.clone(),
        Duration::from_secs(1),
    ));

    let node_a = Arc::new(WorkerNode::new(
        fast_config("127.0.0.1:9001"),
        supervisor.clone(),
        static_probe(),
    ));
    let node_b = Arc::new(WorkerNode::new(
        fast_config("127.0.0.1:9002"),
        supervisor.clone(),
        static_probe(),
    ));
    for node in [&node_a, &node_b] {
        node.start().await.unwrap();
        connector.attach(node.clone()).await;
    }

    assert_eq!(supervisor.select_worker().await.unwrap(), "127.0.0.1:9001");

    node_a.launch_model("model-1").await.unwrap();
    assert_eq!(node_a.running_model_count().await.unwrap(), 1);
    assert_eq!(supervisor.select_worker().await.unwrap(), "127.0.0.1:9002");

    assert!(matches!(
        node_a.launch_model("model-1").await,
        Err(ClusterError::ModelAlreadyRunning { .. })
    ));
    node_a.terminate_model("model-1").await.unwrap();
    assert!(matches!(
        node_a.terminate_model("model-1").await,
        Err(ClusterError::ModelNotFound { .. })
    ));
    assert!(node_a.running_models().await.is_empty());

    for node in [&node_a, &node_b] {
        node.shutdown().await.unwrap();
    }
    assert_eq!(supervisor.worker_count().await, 0);
}

#[tokio::test]
async fn test_state_readable_while_shutting_down() {
    let supervisor = Arc::new(RecordingSupervisor {
        slow_deregister: Some(Duration::from_millis(150)),
        ..Default::default()
    });
    let node = Arc::new(WorkerNode::new(
        fast_config(WORKER_ADDRESS),
        supervisor.clone(),
        static_probe(),
    ));
    node.start().await.unwrap();

    let stopping = {
        let node = Arc::clone(&node);
        tokio::spawn(async move { node.shutdown().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = tokio::time::timeout(Duration::from_millis(20), node.state())
        .await
        .expect("state should not wait for deregister");
    assert_eq!(state, WorkerState::ShuttingDown);

    stopping.await.unwrap().unwrap();
    assert_eq!(node.state().await, WorkerState::Terminated);
    assert_eq!(supervisor.count("deregister"), 1);
}

#[tokio::test]
async fn test_worker_rejoins_after_eviction() {
    let supervisor = Arc::new(Supervisor::new(
        "127.0.0.1:9997",
        Arc::new(LocalWorkerConnector::new()),
        Duration::from_secs(1),
    ));
    let node = WorkerNode::new(fast_config(WORKER_ADDRESS), supervisor.clone(), static_probe());
    node.start().await.unwrap();

    supervisor.deregister(WORKER_ADDRESS).await.unwrap();
    assert!(!supervisor.is_registered(WORKER_ADDRESS).await);

    wait_until(|| {
        let supervisor = Arc::clone(&supervisor);
        async move {
            supervisor
                .get_status()
                .await
                .workers
                .get(WORKER_ADDRESS)
                .is_some_and(|status| !status.is_empty())
        }
    })
    .await;

    assert_eq!(node.state().await, WorkerState::Active);
    node.shutdown().await.unwrap();
    assert!(!supervisor.is_registered(WORKER_ADDRESS).await);
}
