pub mod components;
pub mod resource_probe;
pub mod service;

pub use components::{HttpSupervisorClient, RunningModel, WorkerState};
pub use resource_probe::{ResourceProbe, StaticResourceProbe, SystemResourceProbe};
pub use service::{WorkerNode, WorkerNodeConfig, WorkerNodeConfigBuilder};
