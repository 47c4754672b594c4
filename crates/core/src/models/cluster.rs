use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::NodeStatus;

/// Supervisor 对外返回的集群状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Supervisor 运行时长（整秒）
    pub uptime: u64,
    /// Worker地址 -> 最近一次上报的资源状态，按注册顺序排列
    pub workers: IndexMap<String, NodeStatus>,
}

/// 单个Worker的详细视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub address: String,
    pub status: Option<NodeStatus>,
    pub running_model_count: u32,
    pub registered_at: DateTime<Utc>,
    pub last_report_at: Option<DateTime<Utc>>,
    /// 距离上一次心跳的秒数，从未上报时为空
    pub seconds_since_report: Option<u64>,
}

/// 选择轮次中一个Worker的负载观测值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLoad {
    pub address: String,
    pub running_model_count: u32,
}

impl WorkerLoad {
    pub fn new<S: Into<String>>(address: S, running_model_count: u32) -> Self {
        Self {
            address: address.into(),
            running_model_count,
        }
    }
}
