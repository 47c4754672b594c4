pub mod models;

pub use models::{
    validate_address, ApiConfig, AppConfig, ObservabilityConfig, SupervisorConfig, WorkerConfig,
    ENV_PREFIX,
};
