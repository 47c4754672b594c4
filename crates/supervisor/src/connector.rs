use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use cluster_core::{ClusterError, ClusterResult, WorkerConnector, WorkerHandle};

/// 进程内连接器，用于本地部署和测试
#[derive(Default)]
pub struct LocalWorkerConnector {
    handles: RwLock<HashMap<String, Arc<dyn WorkerHandle>>>,
}

impl LocalWorkerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, handle: Arc<dyn WorkerHandle>) {
        let address = handle.address().to_string();
        debug!("挂载本地Worker: {}", address);
        self.handles.write().await.insert(address, handle);
    }

    pub async fn detach(&self, address: &str) -> Option<Arc<dyn WorkerHandle>> {
        self.handles.write().await.remove(address)
    }
}

#[async_trait]
impl WorkerConnector for LocalWorkerConnector {
    async fn connect(&self, address: &str) -> ClusterResult<Arc<dyn WorkerHandle>> {
        self.handles
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| ClusterError::Network(format!("本地没有地址为 {address} 的Worker")))
    }
}
