use thiserror::Error;

/// 集群错误类型定义
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Worker已注册: {address}")]
    DuplicateWorker { address: String },

    #[error("Worker未注册: {address}")]
    UnknownWorker { address: String },

    #[error("没有可用的Worker")]
    NoAvailableWorker,

    #[error("无效的资源状态: {0}")]
    InvalidStatus(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("状态错误: {0}")]
    InvalidState(String),

    #[error("模型已在运行: {uid}")]
    ModelAlreadyRunning { uid: String },

    #[error("模型未找到: {uid}")]
    ModelNotFound { uid: String },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    pub fn duplicate_worker<S: Into<String>>(address: S) -> Self {
        Self::DuplicateWorker {
            address: address.into(),
        }
    }
    pub fn unknown_worker<S: Into<String>>(address: S) -> Self {
        Self::UnknownWorker {
            address: address.into(),
        }
    }
    pub fn invalid_status<S: Into<String>>(msg: S) -> Self {
        Self::InvalidStatus(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    /// 心跳与选择扇出中可在下一轮恢复的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::Network(_) | ClusterError::Timeout(_))
    }

    /// 对调用方当前生命周期致命的错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClusterError::DuplicateWorker { .. }
                | ClusterError::Configuration(_)
                | ClusterError::Internal(_)
        )
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        ClusterError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ClusterError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ClusterError::Timeout(err.to_string())
    }
}

impl From<anyhow::Error> for ClusterError {
    fn from(err: anyhow::Error) -> Self {
        ClusterError::Internal(err.to_string())
    }
}
