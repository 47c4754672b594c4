use anyhow::Result;
use clap::{Arg, Command};
use cluster::common::{
    common_args, evict_stale_workers_arg, parse_app_mode, start_application,
    supervisor_address_arg, StartupConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("cluster")
        .version(env!("CARGO_PKG_VERSION"))
        .about("模型服务集群 - Supervisor / Worker")
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["supervisor", "worker", "local"])
                .default_value("local"),
        )
        .args(common_args())
        .arg(supervisor_address_arg())
        .arg(evict_stale_workers_arg())
        .get_matches();

    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("local");
    let app_mode = parse_app_mode(mode_str)?;

    start_application(StartupConfig::from_matches(&matches), app_mode, "Cluster").await
}
