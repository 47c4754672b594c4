use anyhow::Result;
use cluster::app::AppMode;
use cluster::common::{run_cli, supervisor_address_arg};

#[tokio::main]
async fn main() -> Result<()> {
    run_cli(
        "cluster-worker",
        "模型服务集群 - Worker节点",
        Some("启动Worker节点，向Supervisor注册并周期性上报资源状态"),
        vec![supervisor_address_arg()],
        AppMode::Worker,
        "Worker",
    )
    .await
}
