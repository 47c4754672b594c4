use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use cluster_core::{ClusterError, ClusterResult, NodeStatus, WorkerSummary};

/// Supervisor侧保存的单个Worker记录
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub address: String,
    pub last_status: Option<NodeStatus>,
    pub last_report_time: Option<Instant>,
    pub last_report_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub registered_time: Instant,
    /// 最近一次选择时Worker返回的运行模型数
    pub running_model_count: u32,
}

impl WorkerRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            last_status: None,
            last_report_time: None,
            last_report_at: None,
            registered_at: Utc::now(),
            registered_time: Instant::now(),
            running_model_count: 0,
        }
    }

    pub fn has_reported(&self) -> bool {
        self.last_report_time.is_some()
    }

    /// 从未上报的Worker以注册时间计算
    pub fn report_age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_report_time.unwrap_or(self.registered_time))
    }

    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        self.report_age(now) > threshold
    }

    pub fn to_summary(&self, now: Instant) -> WorkerSummary {
        WorkerSummary {
            address: self.address.clone(),
            status: self.last_status.clone(),
            running_model_count: self.running_model_count,
            registered_at: self.registered_at,
            last_report_at: self.last_report_at,
            seconds_since_report: self
                .last_report_time
                .map(|t| now.saturating_duration_since(t).as_secs()),
        }
    }
}

/// 按注册顺序保存的Worker表
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: IndexMap<String, WorkerRecord>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: &str, record: WorkerRecord) -> ClusterResult<()> {
        if self.workers.contains_key(address) {
            return Err(ClusterError::duplicate_worker(address));
        }
        self.workers.insert(address.to_string(), record);
        Ok(())
    }

    /// 删除后其余记录保持原有顺序
    pub fn remove(&mut self, address: &str) -> Option<WorkerRecord> {
        self.workers.shift_remove(address)
    }

    pub fn get(&self, address: &str) -> Option<&WorkerRecord> {
        self.workers.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.workers.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.values()
    }

    pub fn snapshot_addresses(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    /// 写入最新状态，返回是否为该Worker的首次上报
    pub fn update(
        &mut self,
        address: &str,
        status: NodeStatus,
        timestamp: Instant,
    ) -> ClusterResult<bool> {
        let record = self
            .workers
            .get_mut(address)
            .ok_or_else(|| ClusterError::unknown_worker(address))?;

        let first_report = !record.has_reported();
        record.last_status = Some(status);
        record.last_report_time = Some(timestamp);
        record.last_report_at = Some(Utc::now());
        Ok(first_report)
    }

    /// Worker已被移除时返回false
    pub fn set_running_model_count(&mut self, address: &str, count: u32) -> bool {
        match self.workers.get_mut(address) {
            Some(record) => {
                record.running_model_count = count;
                true
            }
            None => false,
        }
    }

    pub fn stale_addresses(&self, now: Instant, threshold: Duration) -> Vec<String> {
        self.workers
            .values()
            .filter(|record| record.is_stale(now, threshold))
            .map(|record| record.address.clone())
            .collect()
    }
}
