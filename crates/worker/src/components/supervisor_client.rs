use std::time::Duration;

use async_trait::async_trait;
use cluster_core::{ClusterError, ClusterResult, NodeStatus, SupervisorService};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Worker侧通过HTTP访问Supervisor
pub struct HttpSupervisorClient {
    supervisor_url: String,
    http_client: reqwest::Client,
}

impl HttpSupervisorClient {
    pub fn new(supervisor_address: &str, request_timeout: Duration) -> ClusterResult<Self> {
        let supervisor_url = if supervisor_address.starts_with("http://")
            || supervisor_address.starts_with("https://")
        {
            supervisor_address.trim_end_matches('/').to_string()
        } else {
            format!("http://{supervisor_address}")
        };
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClusterError::Internal(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            supervisor_url,
            http_client,
        })
    }

    pub fn supervisor_url(&self) -> &str {
        &self.supervisor_url
    }

    async fn check_response(
        &self,
        address: &str,
        response: reqwest::Response,
    ) -> ClusterResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| format!("HTTP {status}"));

        Err(match status {
            StatusCode::CONFLICT => ClusterError::duplicate_worker(address),
            StatusCode::NOT_FOUND => ClusterError::unknown_worker(address),
            StatusCode::BAD_REQUEST => ClusterError::invalid_status(message),
            _ => ClusterError::Network(format!("Supervisor返回 HTTP {status}: {message}")),
        })
    }
}

fn map_request_error(e: reqwest::Error) -> ClusterError {
    if e.is_timeout() {
        ClusterError::Timeout(format!("请求Supervisor超时: {e}"))
    } else {
        ClusterError::Network(format!("Supervisor connection error: {e}"))
    }
}

#[async_trait]
impl SupervisorService for HttpSupervisorClient {
    async fn register(&self, address: &str) -> ClusterResult<()> {
        let url = format!("{}/api/v1/workers", self.supervisor_url);
        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "address": address }))
            .send()
            .await
            .map_err(map_request_error)?;

        self.check_response(address, response).await?;
        info!("Successfully registered worker {} with supervisor", address);
        Ok(())
    }

    async fn deregister(&self, address: &str) -> ClusterResult<()> {
        let url = format!("{}/api/v1/workers/{}", self.supervisor_url, address);
        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(map_request_error)?;

        match self.check_response(address, response).await {
            Ok(()) => {
                info!("Successfully deregistered worker {} from supervisor", address);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to deregister worker {}: {}", address, e);
                Err(e)
            }
        }
    }

    async fn report_status(&self, address: &str, status: NodeStatus) -> ClusterResult<()> {
        let url = format!("{}/api/v1/workers/{}/status", self.supervisor_url, address);
        let response = self
            .http_client
            .post(&url)
            .json(&status)
            .send()
            .await
            .map_err(map_request_error)?;

        self.check_response(address, response).await?;
        debug!("Status reported for worker {}", address);
        Ok(())
    }
}
