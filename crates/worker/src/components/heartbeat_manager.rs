use std::sync::Arc;
use std::time::Duration;

use cluster_core::{ClusterError, ClusterResult, NodeStatus, SupervisorService};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::resource_probe::ResourceProbe;

/// 周期性采集资源并上报给Supervisor
pub struct HeartbeatManager {
    address: String,
    supervisor: Arc<dyn SupervisorService>,
    probe: Arc<dyn ResourceProbe>,
    heartbeat_interval: Duration,
    report_timeout: Duration,
}

impl HeartbeatManager {
    pub fn new(
        address: String,
        supervisor: Arc<dyn SupervisorService>,
        probe: Arc<dyn ResourceProbe>,
        heartbeat_interval: Duration,
        report_timeout: Duration,
    ) -> Self {
        Self {
            address,
            supervisor,
            probe,
            heartbeat_interval,
            report_timeout,
        }
    }

    pub async fn sample(&self) -> ClusterResult<NodeStatus> {
        let probe = Arc::clone(&self.probe);
        tokio::task::spawn_blocking(move || probe.probe())
            .await
            .map_err(|e| ClusterError::Internal(format!("资源采集任务异常: {e}")))?
    }

    pub async fn report_once(&self) -> ClusterResult<()> {
        let status = self.sample().await?;
        tokio::time::timeout(
            self.report_timeout,
            self.supervisor.report_status(&self.address, status),
        )
        .await
        .map_err(|_| {
            ClusterError::Timeout(format!("上报状态超过 {:?}", self.report_timeout))
        })??;

        debug!("Worker {} 状态上报成功", self.address);
        Ok(())
    }

    /// Supervisor丢失本节点记录后重新注册，已存在视为成功
    pub async fn rejoin(&self) -> ClusterResult<()> {
        let result = tokio::time::timeout(
            self.report_timeout,
            self.supervisor.register(&self.address),
        )
        .await
        .map_err(|_| ClusterError::Timeout(format!("重新注册超过 {:?}", self.report_timeout)))?;

        match result {
            Ok(()) | Err(ClusterError::DuplicateWorker { .. }) => {
                info!("Worker {} 已重新注册到Supervisor", self.address);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// 启动心跳任务，收到停止信号后退出
    pub fn start_heartbeat_task(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(manager.heartbeat_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Worker {} 心跳任务启动，间隔 {:?}",
                manager.address, manager.heartbeat_interval
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.recv() => {
                        info!("Heartbeat task shutting down");
                        break;
                    }
                }

                tokio::select! {
                    result = manager.report_once() => {
                        match result {
                            Ok(()) => {}
                            Err(ClusterError::UnknownWorker { .. }) => {
                                warn!("Supervisor不再持有Worker {} 的记录，重新注册", manager.address);
                                if let Err(e) = manager.rejoin().await {
                                    metrics::counter!("cluster_heartbeat_failures_total").increment(1);
                                    warn!("Worker {} 重新注册失败: {}", manager.address, e);
                                }
                            }
                            Err(e) => {
                                metrics::counter!("cluster_heartbeat_failures_total").increment(1);
                                warn!("Worker {} 状态上报失败: {}", manager.address, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Heartbeat task shutting down during report");
                        break;
                    }
                }
            }
        })
    }
}
