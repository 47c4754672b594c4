use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cluster_core::{
    config::WorkerConfig, devices, ClusterResult, SupervisorService, WorkerHandle,
};

use crate::components::{
    HeartbeatManager, HttpSupervisorClient, ModelTracker, RunningModel, WorkerLifecycle,
    WorkerState,
};
use crate::resource_probe::{ResourceProbe, SystemResourceProbe};

/// Configuration for WorkerNode
#[derive(Debug, Clone)]
pub struct WorkerNodeConfig {
    pub address: String,
    pub heartbeat_interval: Duration,
    pub report_timeout: Duration,
}

impl WorkerNodeConfig {
    pub fn builder(address: impl Into<String>) -> WorkerNodeConfigBuilder {
        WorkerNodeConfigBuilder::new(address)
    }
}

impl From<&WorkerConfig> for WorkerNodeConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            address: config.address.clone(),
            heartbeat_interval: config.heartbeat_interval(),
            report_timeout: config.report_timeout(),
        }
    }
}

/// Builder for WorkerNodeConfig
pub struct WorkerNodeConfigBuilder {
    config: WorkerNodeConfig,
}

impl WorkerNodeConfigBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            config: WorkerNodeConfig {
                address: address.into(),
                heartbeat_interval: Duration::from_secs(5),
                report_timeout: Duration::from_secs(5),
            },
        }
    }

    pub fn heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.config.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn report_timeout(mut self, report_timeout: Duration) -> Self {
        self.config.report_timeout = report_timeout;
        self
    }

    pub fn build(self) -> WorkerNodeConfig {
        self.config
    }
}

/// 集群中的一个Worker节点
pub struct WorkerNode {
    address: String,
    models: ModelTracker,
    heartbeat_manager: Arc<HeartbeatManager>,
    lifecycle: WorkerLifecycle,
}

impl WorkerNode {
    pub fn new(
        config: WorkerNodeConfig,
        supervisor: Arc<dyn SupervisorService>,
        probe: Arc<dyn ResourceProbe>,
    ) -> Self {
        let heartbeat_manager = Arc::new(HeartbeatManager::new(
            config.address.clone(),
            Arc::clone(&supervisor),
            probe,
            config.heartbeat_interval,
            config.report_timeout,
        ));

        let lifecycle = WorkerLifecycle::new(
            config.address.clone(),
            supervisor,
            Arc::clone(&heartbeat_manager),
            config.report_timeout,
        );

        Self {
            address: config.address,
            models: ModelTracker::new(),
            heartbeat_manager,
            lifecycle,
        }
    }

    /// 通过HTTP连接远端Supervisor，使用系统资源采集
    pub fn with_http_supervisor(config: &WorkerConfig) -> ClusterResult<Self> {
        let client = HttpSupervisorClient::new(&config.supervisor_address, config.report_timeout())?;
        Ok(Self::new(
            WorkerNodeConfig::from(config),
            Arc::new(client),
            Arc::new(SystemResourceProbe::new()),
        ))
    }

    pub async fn start(&self) -> ClusterResult<()> {
        self.lifecycle.start().await
    }

    pub async fn shutdown(&self) -> ClusterResult<()> {
        self.lifecycle.stop().await
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.is_running().await
    }

    /// 立即采集并上报一次资源状态
    pub async fn report_now(&self) -> ClusterResult<()> {
        self.heartbeat_manager.report_once().await
    }

    pub async fn launch_model(&self, uid: &str) -> ClusterResult<()> {
        self.models.launch(uid).await
    }

    pub async fn terminate_model(&self, uid: &str) -> ClusterResult<()> {
        self.models.terminate(uid).await
    }

    pub async fn running_models(&self) -> Vec<RunningModel> {
        self.models.running_models().await
    }
}

#[async_trait]
impl WorkerHandle for WorkerNode {
    fn address(&self) -> &str {
        &self.address
    }

    async fn running_model_count(&self) -> ClusterResult<u32> {
        Ok(self.models.count().await)
    }

    async fn device_count(&self) -> ClusterResult<u32> {
        Ok(devices::visible_device_count())
    }
}
