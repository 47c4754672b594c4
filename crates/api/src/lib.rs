//! 集群HTTP接口
//!
//! Supervisor和Worker各自的axum路由，本地模式下合并在同一个地址上。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::{create_routes, supervisor_routes, worker_routes, AppState};
