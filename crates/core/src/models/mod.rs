pub mod cluster;
pub mod resource;

pub use cluster::{ClusterStatus, WorkerLoad, WorkerSummary};
pub use resource::{validate_node_status, NodeStatus, ResourceStatus, CPU_DIMENSION};
