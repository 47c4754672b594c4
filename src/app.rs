use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use cluster_api::{create_routes, AppState};
use cluster_core::{AppConfig, WorkerHandle};
use cluster_supervisor::{
    HttpWorkerConnector, LocalWorkerConnector, StaleWorkerMonitor, StaleWorkerMonitorConfig,
    Supervisor,
};
use cluster_worker::{SystemResourceProbe, WorkerNode, WorkerNodeConfig};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行Supervisor
    Supervisor,
    /// 仅运行Worker，连接远端Supervisor
    Worker,
    /// 同一进程内运行Supervisor和一个Worker
    Local,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
}

impl Application {
    pub fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        config.validate().context("配置校验失败")?;
        info!("初始化应用程序，模式: {:?}", mode);
        Ok(Self { config, mode })
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        match self.mode {
            AppMode::Supervisor => self.run_supervisor(shutdown_rx).await?,
            AppMode::Worker => self.run_worker(shutdown_rx).await?,
            AppMode::Local => self.run_local(shutdown_rx).await?,
        }

        info!("应用程序已停止");
        Ok(())
    }

    async fn run_supervisor(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.supervisor.address;
        let listener = bind(bind_address).await?;

        let connector = HttpWorkerConnector::new(self.config.supervisor.selection_timeout())
            .context("创建Worker连接器失败")?;
        let mut supervisor_config = self.config.supervisor.clone();
        supervisor_config.address = advertised_address(bind_address);
        let supervisor = Arc::new(Supervisor::from_config(
            &supervisor_config,
            Arc::new(connector),
        ));

        let monitor = StaleWorkerMonitor::new(
            Arc::clone(&supervisor),
            Some(StaleWorkerMonitorConfig::from(&self.config.supervisor)),
        )
        .start(shutdown_rx.resubscribe());

        let state = AppState {
            supervisor: Some(Arc::clone(&supervisor)),
            worker: None,
        };
        let server = serve(
            listener,
            create_routes(state, &self.config.api),
            shutdown_rx.resubscribe(),
        );
        info!("Supervisor启动在 http://{}", supervisor.address());

        let _ = shutdown_rx.recv().await;
        info!("Supervisor收到关闭信号");

        await_task("失联Worker检测", monitor).await;
        await_task("API服务器", server).await;
        Ok(())
    }

    async fn run_worker(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.worker.address;
        let listener = bind(bind_address).await?;

        let mut worker_config = self.config.worker.clone();
        worker_config.address = advertised_address(bind_address);
        let worker = Arc::new(
            WorkerNode::with_http_supervisor(&worker_config).context("创建Worker节点失败")?,
        );

        // 先开始监听，Supervisor选择时才能查询到本节点
        let state = AppState {
            supervisor: None,
            worker: Some(Arc::clone(&worker)),
        };
        let server = serve(
            listener,
            create_routes(state, &self.config.api),
            shutdown_rx.resubscribe(),
        );

        if let Err(e) = worker.start().await {
            server.abort();
            return Err(e).with_context(|| {
                format!("向Supervisor {} 注册失败", worker_config.supervisor_address)
            });
        }
        info!(
            "Worker {} 已加入Supervisor {}",
            worker.address(),
            worker_config.supervisor_address
        );

        let _ = shutdown_rx.recv().await;
        info!("Worker收到关闭信号");

        if let Err(e) = worker.shutdown().await {
            error!("Worker关闭失败: {}", e);
        }
        await_task("API服务器", server).await;
        Ok(())
    }

    async fn run_local(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.supervisor.address;
        let listener = bind(bind_address).await?;
        let address = advertised_address(bind_address);

        let connector = Arc::new(LocalWorkerConnector::new());
        let mut supervisor_config = self.config.supervisor.clone();
        supervisor_config.address = address.clone();
        let supervisor = Arc::new(Supervisor::from_config(
            &supervisor_config,
            Arc::clone(&connector) as _,
        ));

        // 本地部署时Worker与Supervisor共用地址
        let node_config = WorkerNodeConfig::builder(address.clone())
            .heartbeat_interval(self.config.worker.heartbeat_interval())
            .report_timeout(self.config.worker.report_timeout())
            .build();
        let worker = Arc::new(WorkerNode::new(
            node_config,
            Arc::clone(&supervisor) as _,
            Arc::new(SystemResourceProbe::new()),
        ));
        connector.attach(Arc::clone(&worker) as _).await;

        let monitor = StaleWorkerMonitor::new(
            Arc::clone(&supervisor),
            Some(StaleWorkerMonitorConfig::from(&self.config.supervisor)),
        )
        .start(shutdown_rx.resubscribe());

        let state = AppState {
            supervisor: Some(Arc::clone(&supervisor)),
            worker: Some(Arc::clone(&worker)),
        };
        let server = serve(
            listener,
            create_routes(state, &self.config.api),
            shutdown_rx.resubscribe(),
        );

        if let Err(e) = worker.start().await {
            monitor.abort();
            server.abort();
            return Err(e).context("本地Worker注册失败");
        }
        info!("本地集群启动在 http://{}", address);

        let _ = shutdown_rx.recv().await;
        info!("本地集群收到关闭信号");

        if let Err(e) = worker.shutdown().await {
            error!("Worker关闭失败: {}", e);
        }
        connector.detach(&address).await;
        await_task("失联Worker检测", monitor).await;
        await_task("API服务器", server).await;
        Ok(())
    }
}

async fn bind(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .with_context(|| format!("绑定地址失败: {address}"))
}

fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
        if let Err(e) = result {
            error!("API服务器运行失败: {}", e);
        }
    })
}

async fn await_task(name: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!("{} 任务异常退出: {}", name, e);
    }
}

/// 监听地址为通配地址时，用主机名作为对外地址
pub fn advertised_address(bind_address: &str) -> String {
    let Some((host, port)) = bind_address.rsplit_once(':') else {
        return bind_address.to_string();
    };
    if host != "0.0.0.0" && host != "[::]" && !host.is_empty() {
        return bind_address.to_string();
    }

    match hostname::get().map(|name| name.into_string()) {
        Ok(Ok(name)) => format!("{name}:{port}"),
        _ => {
            warn!("无法获取主机名，使用监听地址 {} 作为对外地址", bind_address);
            bind_address.to_string()
        }
    }
}
