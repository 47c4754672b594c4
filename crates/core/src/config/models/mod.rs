pub mod api_observability;
pub mod app_config;
pub mod supervisor_worker;

pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::{AppConfig, ENV_PREFIX};
pub use supervisor_worker::{validate_address, SupervisorConfig, WorkerConfig};
