use tracing::debug;

use cluster_core::WorkerLoad;

/// Worker选择策略
pub trait WorkerSelectionStrategy: Send + Sync {
    /// 输入按注册顺序排列
    fn select(&self, loads: &[WorkerLoad]) -> Option<String>;

    fn name(&self) -> &str;
}

/// 选择运行模型最少的Worker，数量相同时先注册者优先
pub struct LeastRunningModelsStrategy;

impl LeastRunningModelsStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeastRunningModelsStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerSelectionStrategy for LeastRunningModelsStrategy {
    fn select(&self, loads: &[WorkerLoad]) -> Option<String> {
        let mut selected: Option<&WorkerLoad> = None;
        for load in loads {
            match selected {
                Some(current) if load.running_model_count >= current.running_model_count => {}
                _ => selected = Some(load),
            }
        }

        let selected = selected?;
        debug!(
            "最少模型策略选择Worker: {} (运行模型数: {})",
            selected.address, selected.running_model_count
        );
        Some(selected.address.clone())
    }

    fn name(&self) -> &str {
        "LeastRunningModels"
    }
}
