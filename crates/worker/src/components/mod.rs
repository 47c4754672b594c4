pub mod heartbeat_manager;
pub mod model_tracker;
pub mod supervisor_client;
pub mod worker_lifecycle;

pub use heartbeat_manager::HeartbeatManager;
pub use model_tracker::{ModelTracker, RunningModel};
pub use supervisor_client::HttpSupervisorClient;
pub use worker_lifecycle::{WorkerLifecycle, WorkerState};
