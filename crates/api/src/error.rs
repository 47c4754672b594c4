use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cluster_core::ClusterError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("集群错误: {0}")]
    Cluster(#[from] ClusterError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP状态码与错误码
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Cluster(err) => match err {
                ClusterError::DuplicateWorker { .. } => (StatusCode::CONFLICT, "DUPLICATE_WORKER"),
                ClusterError::UnknownWorker { .. } => (StatusCode::NOT_FOUND, "UNKNOWN_WORKER"),
                ClusterError::NoAvailableWorker => {
                    (StatusCode::SERVICE_UNAVAILABLE, "NO_AVAILABLE_WORKER")
                }
                ClusterError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "INVALID_STATUS"),
                ClusterError::ModelAlreadyRunning { .. } => {
                    (StatusCode::CONFLICT, "MODEL_ALREADY_RUNNING")
                }
                ClusterError::ModelNotFound { .. } => (StatusCode::NOT_FOUND, "MODEL_NOT_FOUND"),
                ClusterError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
                ClusterError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
                ClusterError::Network(_) => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR"),
                ClusterError::Configuration(_)
                | ClusterError::Serialization(_)
                | ClusterError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::Cluster(err) => err.to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("请求处理失败: {} ({})", message, code);
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
                "status": status.as_u16(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_error_status_mapping() {
        let cases = [
            (ClusterError::duplicate_worker("a:1"), StatusCode::CONFLICT),
            (ClusterError::unknown_worker("a:1"), StatusCode::NOT_FOUND),
            (ClusterError::NoAvailableWorker, StatusCode::SERVICE_UNAVAILABLE),
            (ClusterError::invalid_status("bad"), StatusCode::BAD_REQUEST),
            (
                ClusterError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_error_codes() {
        let error = ApiError::from(ClusterError::NoAvailableWorker);
        assert_eq!(error.status_and_code().1, "NO_AVAILABLE_WORKER");

        let error = ApiError::BadRequest("missing address".to_string());
        assert_eq!(error.status_and_code(), (StatusCode::BAD_REQUEST, "BAD_REQUEST"));
    }
}
