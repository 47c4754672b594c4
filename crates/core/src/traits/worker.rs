use std::sync::Arc;

use async_trait::async_trait;

use crate::ClusterResult;

/// Supervisor 调用 Worker 的接口
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    /// Worker 地址
    fn address(&self) -> &str;

    /// 当前运行中的模型实例数量
    async fn running_model_count(&self) -> ClusterResult<u32>;

    /// Worker 所在节点可见的加速卡数量
    async fn device_count(&self) -> ClusterResult<u32>;
}

/// 根据地址获取 Worker 引用
#[async_trait]
pub trait WorkerConnector: Send + Sync {
    async fn connect(&self, address: &str) -> ClusterResult<Arc<dyn WorkerHandle>>;
}
