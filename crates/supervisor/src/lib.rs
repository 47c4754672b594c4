//! Supervisor: Worker注册、心跳状态汇总与Worker选择

pub mod connector;
pub mod registry;
pub mod stale_monitor;
pub mod strategies;
pub mod supervisor;
pub mod worker_client;

pub use connector::LocalWorkerConnector;
pub use registry::{WorkerRecord, WorkerRegistry};
pub use stale_monitor::{StaleWorkerMonitor, StaleWorkerMonitorConfig};
pub use strategies::{LeastRunningModelsStrategy, WorkerSelectionStrategy};
pub use supervisor::Supervisor;
pub use worker_client::{HttpWorkerClient, HttpWorkerConnector};
