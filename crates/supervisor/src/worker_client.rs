use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use cluster_core::{ClusterError, ClusterResult, WorkerConnector, WorkerHandle};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u32,
}

/// 通过HTTP访问远端Worker
pub struct HttpWorkerClient {
    address: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new(address: impl Into<String>, http_client: reqwest::Client) -> Self {
        let address = address.into();
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.clone()
        } else {
            format!("http://{address}")
        };
        Self {
            address,
            base_url,
            http_client,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClusterResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_request_error(&self.address, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterError::Network(format!(
                "Worker {} 返回 HTTP {status}",
                self.address
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ClusterError::Serialization(format!("解析Worker响应失败: {e}")))?;

        match envelope {
            Envelope {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            Envelope { message, .. } => Err(ClusterError::Internal(format!(
                "Worker {} 返回失败: {}",
                self.address,
                message.unwrap_or_default()
            ))),
        }
    }
}

fn map_request_error(address: &str, e: reqwest::Error) -> ClusterError {
    if e.is_timeout() {
        ClusterError::Timeout(format!("请求Worker {address} 超时"))
    } else {
        ClusterError::Network(format!("连接Worker {address} 失败: {e}"))
    }
}

#[async_trait]
impl WorkerHandle for HttpWorkerClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn running_model_count(&self) -> ClusterResult<u32> {
        let body: CountBody = self.get_json("/api/v1/models/count").await?;
        Ok(body.count)
    }

    async fn device_count(&self) -> ClusterResult<u32> {
        let body: CountBody = self.get_json("/api/v1/devices").await?;
        Ok(body.count)
    }
}

/// 为每个地址构造共享连接池的HTTP客户端
pub struct HttpWorkerConnector {
    http_client: reqwest::Client,
}

impl HttpWorkerConnector {
    pub fn new(request_timeout: Duration) -> ClusterResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClusterError::Internal(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl WorkerConnector for HttpWorkerConnector {
    async fn connect(&self, address: &str) -> ClusterResult<Arc<dyn WorkerHandle>> {
        Ok(Arc::new(HttpWorkerClient::new(
            address,
            self.http_client.clone(),
        )))
    }
}
