use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ClusterError, ClusterResult};

/// 节点上单个资源维度（如 "cpu"、"gpu-0"）的快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// 当前空闲容量占比，取值 [0.0, 1.0]
    pub available: f64,
    /// 总容量单位（如核心数）
    pub total: f64,
    /// 可用内存字节数
    pub memory_available: u64,
    /// 总内存字节数
    pub memory_total: u64,
}

/// 一个Worker上报的全部资源维度
pub type NodeStatus = BTreeMap<String, ResourceStatus>;

pub const CPU_DIMENSION: &str = "cpu";

impl ResourceStatus {
    pub fn new(available: f64, total: f64, memory_available: u64, memory_total: u64) -> Self {
        Self {
            available,
            total,
            memory_available,
            memory_total,
        }
    }

    pub fn validate(&self) -> ClusterResult<()> {
        if !(0.0..=1.0).contains(&self.available) {
            return Err(ClusterError::invalid_status(format!(
                "available必须在[0.0, 1.0]之间: {}",
                self.available
            )));
        }
        if !self.total.is_finite() || self.total < 0.0 {
            return Err(ClusterError::invalid_status(format!(
                "total必须为非负数: {}",
                self.total
            )));
        }
        if self.memory_available > self.memory_total {
            return Err(ClusterError::invalid_status(format!(
                "memory_available({}) 不能大于 memory_total({})",
                self.memory_available, self.memory_total
            )));
        }
        Ok(())
    }

    /// GPU 维度名称，按设备序号编号
    pub fn gpu_dimension(index: usize) -> String {
        format!("gpu-{index}")
    }
}

/// 校验整份节点状态，空维度名同样视为无效
pub fn validate_node_status(status: &NodeStatus) -> ClusterResult<()> {
    for (dimension, resource) in status {
        if dimension.is_empty() {
            return Err(ClusterError::invalid_status("资源维度名称不能为空"));
        }
        resource.validate().map_err(|e| match e {
            ClusterError::InvalidStatus(msg) => {
                ClusterError::InvalidStatus(format!("{dimension}: {msg}"))
            }
            other => other,
        })?;
    }
    Ok(())
}
