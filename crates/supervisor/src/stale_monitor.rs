use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use cluster_core::{config::SupervisorConfig, ClusterResult};

use crate::supervisor::Supervisor;

/// 失联Worker检测配置
#[derive(Debug, Clone)]
pub struct StaleWorkerMonitorConfig {
    /// 超过该时长未上报视为失联
    pub stale_threshold: Duration,
    pub check_interval: Duration,
    /// 是否注销失联Worker
    pub evict_stale_workers: bool,
}

impl Default for StaleWorkerMonitorConfig {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(30),
            check_interval: Duration::from_secs(10),
            evict_stale_workers: false,
        }
    }
}

impl From<&SupervisorConfig> for StaleWorkerMonitorConfig {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            stale_threshold: config.stale_threshold(),
            check_interval: config.stale_check_interval(),
            evict_stale_workers: config.evict_stale_workers,
        }
    }
}

pub struct StaleWorkerMonitor {
    supervisor: Arc<Supervisor>,
    config: StaleWorkerMonitorConfig,
}

impl StaleWorkerMonitor {
    pub fn new(supervisor: Arc<Supervisor>, config: Option<StaleWorkerMonitorConfig>) -> Self {
        Self {
            supervisor,
            config: config.unwrap_or_default(),
        }
    }

    /// 执行一次检测，返回失联的Worker地址；开启注销时只返回实际注销的地址
    pub async fn check_once(&self) -> ClusterResult<Vec<String>> {
        let stale = self
            .supervisor
            .stale_workers(self.config.stale_threshold)
            .await;

        if stale.is_empty() {
            debug!("未发现失联Worker");
            return Ok(stale);
        }

        for address in &stale {
            warn!(
                "Worker {} 超过 {:?} 未上报状态",
                address, self.config.stale_threshold
            );
        }

        if !self.config.evict_stale_workers {
            return Ok(stale);
        }

        let mut evicted = Vec::with_capacity(stale.len());
        for address in stale {
            if self
                .supervisor
                .evict_if_stale(&address, self.config.stale_threshold)
                .await
            {
                evicted.push(address);
            } else {
                debug!("Worker {} 已恢复上报，不再注销", address);
            }
        }
        Ok(evicted)
    }

    pub fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "启动失联Worker检测，阈值 {:?}，间隔 {:?}",
                self.config.stale_threshold, self.config.check_interval
            );
            let mut interval = tokio::time::interval(self.config.check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.check_once().await {
                            error!("失联Worker检测出错: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("收到停止信号，退出失联Worker检测");
                        break;
                    }
                }
            }
        })
    }
}
