use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cluster_core::{ClusterError, ClusterResult, SupervisorService};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::HeartbeatManager;

/// Worker生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Created,
    Registering,
    Active,
    ShuttingDown,
    Terminated,
    Failed,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Created, Registering)
                | (Created, Terminated)
                | (Registering, Active)
                | (Registering, Failed)
                | (Active, ShuttingDown)
                | (ShuttingDown, Terminated)
                | (Failed, Terminated)
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Created => "CREATED",
            WorkerState::Registering => "REGISTERING",
            WorkerState::Active => "ACTIVE",
            WorkerState::ShuttingDown => "SHUTTING_DOWN",
            WorkerState::Terminated => "TERMINATED",
            WorkerState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

struct LifecycleInner {
    state: WorkerState,
    shutdown_tx: Option<broadcast::Sender<()>>,
    heartbeat_task: Option<JoinHandle<()>>,
}

impl LifecycleInner {
    fn transition(&mut self, next: WorkerState) -> ClusterResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ClusterError::invalid_state(format!(
                "Worker状态不能从 {} 变为 {}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// 负责注册、心跳任务和注销的顺序
pub struct WorkerLifecycle {
    address: String,
    supervisor: Arc<dyn SupervisorService>,
    heartbeat_manager: Arc<HeartbeatManager>,
    report_timeout: Duration,
    inner: Mutex<LifecycleInner>,
}

impl WorkerLifecycle {
    pub fn new(
        address: String,
        supervisor: Arc<dyn SupervisorService>,
        heartbeat_manager: Arc<HeartbeatManager>,
        report_timeout: Duration,
    ) -> Self {
        Self {
            address,
            supervisor,
            heartbeat_manager,
            report_timeout,
            inner: Mutex::new(LifecycleInner {
                state: WorkerState::Created,
                shutdown_tx: None,
                heartbeat_task: None,
            }),
        }
    }

    pub async fn state(&self) -> WorkerState {
        self.inner.lock().await.state
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == WorkerState::Active
    }

    /// 注册期间不持有锁，`state()` 可随时读取
    pub async fn start(&self) -> ClusterResult<()> {
        self.inner.lock().await.transition(WorkerState::Registering)?;

        info!("Starting worker: {}", self.address);
        let registered = tokio::time::timeout(
            self.report_timeout,
            self.supervisor.register(&self.address),
        )
        .await
        .map_err(|_| ClusterError::Timeout(format!("注册超过 {:?}", self.report_timeout)))
        .and_then(|result| result);

        let mut inner = self.inner.lock().await;
        if let Err(e) = registered {
            error!("Worker {} 注册失败: {}", self.address, e);
            inner.transition(WorkerState::Failed)?;
            return Err(e);
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        inner.heartbeat_task = Some(self.heartbeat_manager.start_heartbeat_task(shutdown_rx));
        inner.shutdown_tx = Some(shutdown_tx);
        inner.transition(WorkerState::Active)?;

        info!("Worker {} started successfully", self.address);
        Ok(())
    }

    /// 先停止心跳再注销，重复调用为空操作
    ///
    /// 等待心跳任务和注销时不持有锁。
    pub async fn stop(&self) -> ClusterResult<()> {
        let heartbeat_task = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                WorkerState::Active => {}
                WorkerState::Created | WorkerState::Failed => {
                    inner.transition(WorkerState::Terminated)?;
                    return Ok(());
                }
                _ => return Ok(()),
            }

            inner.transition(WorkerState::ShuttingDown)?;
            if let Some(tx) = inner.shutdown_tx.take() {
                let _ = tx.send(());
            }
            inner.heartbeat_task.take()
        };
        info!("停止Worker: {}", self.address);

        if let Some(handle) = heartbeat_task {
            if let Err(e) = handle.await {
                warn!("心跳任务退出异常: {}", e);
            }
        }

        match tokio::time::timeout(
            self.report_timeout,
            self.supervisor.deregister(&self.address),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("从Supervisor注销失败: {}", e),
            Err(_) => warn!("从Supervisor注销超时({:?})", self.report_timeout),
        }

        self.inner.lock().await.transition(WorkerState::Terminated)?;
        info!("Worker {} 已停止", self.address);
        Ok(())
    }
}
