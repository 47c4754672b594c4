use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cluster_core::{models::CPU_DIMENSION, ClusterError, ClusterResult, NodeStatus, ResourceStatus};

/// 采集本机资源状态，在阻塞线程池中调用
pub trait ResourceProbe: Send + Sync {
    fn probe(&self) -> ClusterResult<NodeStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

/// 解析 /proc/stat 第一行的累计CPU时间
fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|line| line.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect();
    if values.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        idle,
        total: values.iter().sum(),
    })
}

/// 解析 /proc/meminfo，返回 (总内存, 可用内存) 字节数
fn parse_meminfo(meminfo: &str) -> Option<(u64, u64)> {
    let read_kb = |key: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|line| line.starts_with(key))?
            .split_whitespace()
            .nth(1)?
            .parse::<u64>()
            .ok()
    };
    let total = read_kb("MemTotal:")? * 1024;
    let available = read_kb("MemAvailable:")? * 1024;
    Some((total, available.min(total)))
}

fn idle_ratio(previous: Option<CpuTimes>, current: CpuTimes) -> f64 {
    let (idle, total) = match previous {
        Some(prev) if current.total > prev.total => (
            current.idle.saturating_sub(prev.idle),
            current.total - prev.total,
        ),
        _ => (current.idle, current.total),
    };
    if total == 0 {
        return 1.0;
    }
    (idle as f64 / total as f64).clamp(0.0, 1.0)
}

/// 基于 /proc 的系统资源采集，读取失败时返回错误而不是伪造数据
pub struct SystemResourceProbe {
    stat_path: PathBuf,
    meminfo_path: PathBuf,
    last_cpu_times: Mutex<Option<CpuTimes>>,
}

impl SystemResourceProbe {
    pub fn new() -> Self {
        Self::with_paths("/proc/stat", "/proc/meminfo")
    }

    pub fn with_paths(stat_path: impl Into<PathBuf>, meminfo_path: impl Into<PathBuf>) -> Self {
        Self {
            stat_path: stat_path.into(),
            meminfo_path: meminfo_path.into(),
            last_cpu_times: Mutex::new(None),
        }
    }

    fn cpu_count() -> f64 {
        std::thread::available_parallelism()
            .map(|n| n.get() as f64)
            .unwrap_or(1.0)
    }

    fn read(path: &Path) -> ClusterResult<String> {
        std::fs::read_to_string(path)
            .map_err(|e| ClusterError::Internal(format!("读取 {} 失败: {e}", path.display())))
    }

    fn cpu_available(&self) -> ClusterResult<f64> {
        let stat = Self::read(&self.stat_path)?;
        let current = parse_cpu_times(&stat).ok_or_else(|| {
            ClusterError::Internal(format!("无法解析 {}", self.stat_path.display()))
        })?;

        let mut last = self
            .last_cpu_times
            .lock()
            .map_err(|_| ClusterError::Internal("CPU采样状态锁已损坏".to_string()))?;
        let ratio = idle_ratio(*last, current);
        *last = Some(current);
        Ok(ratio)
    }

    fn memory(&self) -> ClusterResult<(u64, u64)> {
        let meminfo = Self::read(&self.meminfo_path)?;
        parse_meminfo(&meminfo).ok_or_else(|| {
            ClusterError::Internal(format!("无法解析 {}", self.meminfo_path.display()))
        })
    }
}

impl Default for SystemResourceProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemResourceProbe {
    fn probe(&self) -> ClusterResult<NodeStatus> {
        let (memory_total, memory_available) = self.memory()?;
        let cpu = ResourceStatus::new(
            self.cpu_available()?,
            Self::cpu_count(),
            memory_available,
            memory_total,
        );

        let mut status = NodeStatus::new();
        status.insert(CPU_DIMENSION.to_string(), cpu);
        Ok(status)
    }
}

/// 返回固定资源状态，用于测试和固定容量节点
#[derive(Debug, Clone, Default)]
pub struct StaticResourceProbe {
    status: NodeStatus,
}

impl StaticResourceProbe {
    pub fn new(status: NodeStatus) -> Self {
        Self { status }
    }

    pub fn cpu(mut self, resource: ResourceStatus) -> Self {
        self.status.insert(CPU_DIMENSION.to_string(), resource);
        self
    }

    pub fn gpu(mut self, index: usize, resource: ResourceStatus) -> Self {
        self.status
            .insert(ResourceStatus::gpu_dimension(index), resource);
        self
    }
}

impl ResourceProbe for StaticResourceProbe {
    fn probe(&self) -> ClusterResult<NodeStatus> {
        Ok(self.status.clone())
    }
}
