use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use cluster_core::{config::validate_address, AppConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{AppMode, Application};
use crate::shutdown::ShutdownManager;

/// 应用关闭的最长等待时间
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 通用的应用启动配置，命令行参数优先于配置文件
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub address: Option<String>,
    pub supervisor_address: Option<String>,
    pub evict_stale_workers: bool,
}

impl StartupConfig {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let string_arg = |id: &str| {
            matches
                .try_get_one::<String>(id)
                .ok()
                .flatten()
                .cloned()
        };

        Self {
            config_path: string_arg("config"),
            log_level: string_arg("log-level"),
            log_format: string_arg("log-format"),
            address: string_arg("address"),
            supervisor_address: string_arg("supervisor-address"),
            evict_stale_workers: matches
                .try_get_one::<bool>("evict-stale-workers")
                .ok()
                .flatten()
                .copied()
                .unwrap_or(false),
        }
    }
}

/// 所有入口共用的命令行参数
pub fn common_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("配置文件路径，缺省时依次尝试 config/cluster.toml 和 cluster.toml"),
        Arg::new("address")
            .short('a')
            .long("address")
            .value_name("HOST:PORT")
            .help("本节点监听地址"),
        Arg::new("log-level")
            .short('l')
            .long("log-level")
            .value_name("LEVEL")
            .help("日志级别")
            .value_parser(["trace", "debug", "info", "warn", "error"]),
        Arg::new("log-format")
            .long("log-format")
            .value_name("FORMAT")
            .help("日志格式")
            .value_parser(["json", "pretty"]),
    ]
}

pub fn supervisor_address_arg() -> Arg {
    Arg::new("supervisor-address")
        .short('s')
        .long("supervisor-address")
        .value_name("HOST:PORT")
        .help("Supervisor地址 (worker模式)")
}

pub fn evict_stale_workers_arg() -> Arg {
    Arg::new("evict-stale-workers")
        .long("evict-stale-workers")
        .action(ArgAction::SetTrue)
        .help("注销长时间未上报状态的Worker")
}

/// 初始化日志系统
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 加载配置并应用命令行覆盖
pub fn load_config(startup_config: &StartupConfig, app_mode: AppMode) -> Result<AppConfig> {
    let mut config = AppConfig::load(startup_config.config_path.as_deref()).with_context(|| {
        match &startup_config.config_path {
            Some(path) => format!("加载配置文件失败: {path}"),
            None => "加载默认配置失败".to_string(),
        }
    })?;

    if let Some(address) = &startup_config.address {
        validate_address(address).context("--address 参数无效")?;
        match app_mode {
            AppMode::Supervisor | AppMode::Local => config.supervisor.address = address.clone(),
            AppMode::Worker => config.worker.address = address.clone(),
        }
    }
    if let Some(supervisor_address) = &startup_config.supervisor_address {
        validate_address(supervisor_address).context("--supervisor-address 参数无效")?;
        config.worker.supervisor_address = supervisor_address.clone();
    }
    if startup_config.evict_stale_workers {
        config.supervisor.evict_stale_workers = true;
    }
    if let Some(log_level) = &startup_config.log_level {
        config.observability.log_level = log_level.clone();
    }
    if let Some(log_format) = &startup_config.log_format {
        config.observability.log_format = log_format.clone();
    }

    config.validate()?;
    Ok(config)
}

/// 启动应用程序的通用函数
pub async fn start_application(
    startup_config: StartupConfig,
    app_mode: AppMode,
    service_name: &str,
) -> Result<()> {
    let config = load_config(&startup_config, app_mode)?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    info!("启动 {} 服务", service_name);
    if let Some(ref path) = startup_config.config_path {
        info!("配置文件: {}", path);
    }
    info!("运行模式: {:?}", app_mode);

    validate_mode_enabled(app_mode, &config)?;

    let app = Arc::new(Application::new(config, app_mode)?);
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 应用自行退出（例如注册失败）时不再等待信号
    tokio::select! {
        result = &mut app_handle => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("{} 服务运行失败: {:#}", service_name, e);
                    Err(e)
                }
                Err(e) => Err(anyhow::anyhow!("{service_name} 服务异常退出: {e}")),
            };
        }
        _ = wait_for_shutdown_signal() => {}
    }

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
        Ok(Ok(Ok(()))) => info!("{} 服务已优雅关闭", service_name),
        Ok(Ok(Err(e))) => error!("{} 服务关闭时发生错误: {:#}", service_name, e),
        Ok(Err(e)) => error!("{} 服务异常退出: {}", service_name, e),
        Err(_) => warn!("{} 服务关闭超时，强制退出", service_name),
    }

    info!("{} 服务已退出", service_name);
    Ok(())
}

/// 验证指定的模式是否在配置中被启用
fn validate_mode_enabled(app_mode: AppMode, config: &AppConfig) -> Result<()> {
    let supervisor_needed = matches!(app_mode, AppMode::Supervisor | AppMode::Local);
    let worker_needed = matches!(app_mode, AppMode::Worker | AppMode::Local);

    if supervisor_needed && !config.supervisor.enabled {
        return Err(anyhow::anyhow!("Supervisor被禁用，请检查配置"));
    }
    if worker_needed && !config.worker.enabled {
        return Err(anyhow::anyhow!("Worker被禁用，请检查配置"));
    }
    Ok(())
}

/// 等待关闭信号
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::process::exit(1);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

/// 解析应用运行模式
pub fn parse_app_mode(mode_str: &str) -> Result<AppMode> {
    match mode_str {
        "supervisor" => Ok(AppMode::Supervisor),
        "worker" => Ok(AppMode::Worker),
        "local" => Ok(AppMode::Local),
        _ => Err(anyhow::anyhow!("不支持的运行模式: {mode_str}")),
    }
}

/// 单一模式入口的通用命令行处理
pub async fn run_cli(
    name: &'static str,
    about: &'static str,
    long_about: Option<&'static str>,
    custom_args: Vec<Arg>,
    app_mode: AppMode,
    service_name: &str,
) -> Result<()> {
    let mut command = Command::new(name)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .args(common_args())
        .args(custom_args);
    if let Some(long_about) = long_about {
        command = command.long_about(long_about);
    }

    let matches = command.get_matches();
    start_application(StartupConfig::from_matches(&matches), app_mode, service_name).await
}
