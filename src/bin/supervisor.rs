use anyhow::Result;
use cluster::app::AppMode;
use cluster::common::{evict_stale_workers_arg, run_cli};

#[tokio::main]
async fn main() -> Result<()> {
    run_cli(
        "cluster-supervisor",
        "模型服务集群 - Supervisor",
        Some("启动Supervisor，维护Worker成员表并为新模型选择Worker"),
        vec![evict_stale_workers_arg()],
        AppMode::Supervisor,
        "Supervisor",
    )
    .await
}
