use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 成功响应的统一外层结构，错误响应见 `ApiError`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    fn new(data: Option<T>, message: Option<String>) -> Self {
        Self {
            success: true,
            data,
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn success(data: T) -> Self {
        Self::new(Some(data), None)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// 只有提示信息，`data` 为 null
    pub fn message_only(message: impl Into<String>) -> Self {
        Self::new(None, Some(message.into()))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub fn success<T: Serialize>(data: T) -> impl IntoResponse {
    ApiResponse::success(data)
}

pub fn created<T: Serialize>(data: T, message: String) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        ApiResponse::success(data).with_message(message),
    )
}

pub fn ok_message(message: String) -> impl IntoResponse {
    ApiResponse::message_only(message)
}
