pub mod supervisor;
pub mod worker;

pub use supervisor::SupervisorService;
pub use worker::{WorkerConnector, WorkerHandle};
