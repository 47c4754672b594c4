use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use cluster_core::{
    config::SupervisorConfig, devices, models::validate_node_status, ClusterError, ClusterResult,
    ClusterStatus, NodeStatus, SupervisorService, WorkerConnector, WorkerLoad, WorkerSummary,
};

use crate::registry::{WorkerRecord, WorkerRegistry};
use crate::strategies::{LeastRunningModelsStrategy, WorkerSelectionStrategy};

/// 集群协调者，持有全部Worker记录
pub struct Supervisor {
    address: String,
    start_time: Instant,
    registry: RwLock<WorkerRegistry>,
    connector: Arc<dyn WorkerConnector>,
    strategy: Arc<dyn WorkerSelectionStrategy>,
    selection_timeout: Duration,
}

impl Supervisor {
    pub fn new(
        address: impl Into<String>,
        connector: Arc<dyn WorkerConnector>,
        selection_timeout: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            start_time: Instant::now(),
            registry: RwLock::new(WorkerRegistry::new()),
            connector,
            strategy: Arc::new(LeastRunningModelsStrategy::new()),
            selection_timeout,
        }
    }

    pub fn from_config(config: &SupervisorConfig, connector: Arc<dyn WorkerConnector>) -> Self {
        Self::new(
            config.address.clone(),
            connector,
            config.selection_timeout(),
        )
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn WorkerSelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    #[instrument(skip(self), fields(supervisor = %self.address))]
    pub async fn register(&self, address: &str) -> ClusterResult<()> {
        let started = Instant::now();
        let worker_count = {
            let mut registry = self.registry.write().await;
            registry.insert(address, WorkerRecord::new(address))?;
            registry.len()
        };

        metrics::gauge!("cluster_workers_registered").set(worker_count as f64);
        info!("Worker {} 注册成功，当前Worker数: {}", address, worker_count);
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Leave register");
        Ok(())
    }

    #[instrument(skip(self), fields(supervisor = %self.address))]
    pub async fn deregister(&self, address: &str) -> ClusterResult<()> {
        let started = Instant::now();
        let (removed, worker_count) = {
            let mut registry = self.registry.write().await;
            let removed = registry.remove(address);
            (removed, registry.len())
        };

        match removed {
            Some(_) => {
                metrics::gauge!("cluster_workers_registered").set(worker_count as f64);
                info!("Worker {} 已注销，当前Worker数: {}", address, worker_count);
            }
            None => warn!("注销的Worker不存在: {}", address),
        }
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Leave deregister");
        Ok(())
    }

    #[instrument(skip(self, status), fields(supervisor = %self.address))]
    pub async fn report_status(&self, address: &str, status: NodeStatus) -> ClusterResult<()> {
        let started = Instant::now();
        validate_node_status(&status)?;

        let first_report = {
            let mut registry = self.registry.write().await;
            match registry.update(address, status.clone(), Instant::now()) {
                Ok(first) => first,
                Err(e) => {
                    warn!("收到未注册Worker的状态上报: {}", address);
                    return Err(e);
                }
            }
        };

        metrics::counter!("cluster_heartbeats_total").increment(1);
        if first_report {
            debug!("Worker {} 首次上报资源: {:?}", address, status);
        }
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Leave report_status");
        Ok(())
    }

    /// 读锁下复制快照，未上报的Worker对应空状态
    pub async fn get_status(&self) -> ClusterStatus {
        let registry = self.registry.read().await;
        let workers = registry
            .iter()
            .map(|record| {
                (
                    record.address.clone(),
                    record.last_status.clone().unwrap_or_default(),
                )
            })
            .collect();

        ClusterStatus {
            uptime: self.uptime().as_secs(),
            workers,
        }
    }

    pub async fn worker_summaries(&self) -> Vec<WorkerSummary> {
        let now = Instant::now();
        let registry = self.registry.read().await;
        registry.iter().map(|record| record.to_summary(now)).collect()
    }

    pub async fn worker_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn is_registered(&self, address: &str) -> bool {
        self.registry.read().await.contains(address)
    }

    pub async fn is_local_deployment(&self) -> bool {
        let registry = self.registry.read().await;
        registry.len() == 1 && registry.contains(&self.address)
    }

    pub async fn stale_workers(&self, threshold: Duration) -> Vec<String> {
        self.registry
            .read()
            .await
            .stale_addresses(Instant::now(), threshold)
    }

    /// 写锁下重新确认失联后注销，期间恢复上报的Worker保留
    #[instrument(skip(self), fields(supervisor = %self.address))]
    pub async fn evict_if_stale(&self, address: &str, threshold: Duration) -> bool {
        let worker_count = {
            let mut registry = self.registry.write().await;
            let stale = registry
                .get(address)
                .is_some_and(|record| record.is_stale(Instant::now(), threshold));
            if !stale {
                return false;
            }
            registry.remove(address);
            registry.len()
        };

        metrics::gauge!("cluster_workers_registered").set(worker_count as f64);
        info!("已注销失联Worker {}，当前Worker数: {}", address, worker_count);
        true
    }

    /// 选出运行模型最少的Worker
    ///
    /// 在锁外并发查询每个Worker，超时或出错的Worker不参与本轮选择。
    #[instrument(skip(self), fields(supervisor = %self.address))]
    pub async fn select_worker(&self) -> ClusterResult<String> {
        let started = Instant::now();
        let addresses = self.registry.read().await.snapshot_addresses();
        if addresses.is_empty() {
            warn!("没有已注册的Worker");
            return Err(ClusterError::NoAvailableWorker);
        }

        let loads = self.collect_loads(addresses).await;
        let loads = self.refresh_model_counts(loads).await;

        let selected = self
            .strategy
            .select(&loads)
            .ok_or(ClusterError::NoAvailableWorker)?;

        metrics::counter!("cluster_worker_selections_total").increment(1);
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Leave select_worker, 选中: {}", selected
        );
        Ok(selected)
    }

    /// 本地部署时返回本机设备数，否则询问选中的Worker
    pub async fn device_count(&self) -> ClusterResult<u32> {
        if self.is_local_deployment().await {
            return Ok(devices::visible_device_count());
        }

        let address = self.select_worker().await?;
        let handle = self.connector.connect(&address).await?;
        tokio::time::timeout(self.selection_timeout, handle.device_count())
            .await
            .map_err(|_| ClusterError::Timeout(format!("查询Worker {address} 设备数超时")))?
    }

    async fn collect_loads(&self, addresses: Vec<String>) -> Vec<WorkerLoad> {
        let queries = addresses.into_iter().map(|address| {
            let connector = Arc::clone(&self.connector);
            let timeout = self.selection_timeout;
            async move {
                let query = async {
                    let handle = connector.connect(&address).await?;
                    handle.running_model_count().await
                };
                match tokio::time::timeout(timeout, query).await {
                    Ok(Ok(count)) => Some(WorkerLoad::new(address, count)),
                    Ok(Err(e)) => {
                        warn!("查询Worker {} 运行模型数失败，本轮跳过: {}", address, e);
                        None
                    }
                    Err(_) => {
                        warn!(
                            "查询Worker {} 运行模型数超时({:?})，本轮跳过",
                            address, timeout
                        );
                        None
                    }
                }
            }
        });

        join_all(queries).await.into_iter().flatten().collect()
    }

    /// 回写缓存的模型数，只保留仍然注册的Worker
    async fn refresh_model_counts(&self, loads: Vec<WorkerLoad>) -> Vec<WorkerLoad> {
        if loads.is_empty() {
            return loads;
        }
        let mut registry = self.registry.write().await;
        loads
            .into_iter()
            .filter(|load| {
                let registered =
                    registry.set_running_model_count(&load.address, load.running_model_count);
                if !registered {
                    debug!("Worker {} 在选择期间已注销，不参与选择", load.address);
                }
                registered
            })
            .collect()
    }
}

#[async_trait]
impl SupervisorService for Supervisor {
    async fn register(&self, address: &str) -> ClusterResult<()> {
        Supervisor::register(self, address).await
    }

    async fn deregister(&self, address: &str) -> ClusterResult<()> {
        Supervisor::deregister(self, address).await
    }

    async fn report_status(&self, address: &str, status: NodeStatus) -> ClusterResult<()> {
        Supervisor::report_status(self, address, status).await
    }
}
