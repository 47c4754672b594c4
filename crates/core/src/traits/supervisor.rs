use async_trait::async_trait;

use crate::{models::NodeStatus, ClusterResult};

/// Worker 调用 Supervisor 的接口
///
/// 同一进程内由 `Supervisor` 直接实现，跨进程时由 HTTP 客户端实现。
#[async_trait]
pub trait SupervisorService: Send + Sync {
    /// 注册Worker，地址已存在时返回 `DuplicateWorker`
    async fn register(&self, address: &str) -> ClusterResult<()>;

    /// 注销Worker，地址不存在时视为空操作
    async fn deregister(&self, address: &str) -> ClusterResult<()>;

    /// 上报资源状态，未注册的地址返回 `UnknownWorker`
    async fn report_status(&self, address: &str, status: NodeStatus) -> ClusterResult<()>;
}
