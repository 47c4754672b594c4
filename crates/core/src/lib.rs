pub mod config;
pub mod devices;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use models::{ClusterStatus, NodeStatus, ResourceStatus, WorkerLoad, WorkerSummary};
pub use traits::{SupervisorService, WorkerConnector, WorkerHandle};
