use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cluster_core::{ClusterError, ClusterResult};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningModel {
    pub uid: String,
    pub launched_at: DateTime<Utc>,
}

/// 记录本Worker上运行中的模型实例
#[derive(Debug, Default)]
pub struct ModelTracker {
    models: RwLock<BTreeMap<String, DateTime<Utc>>>,
}

impl ModelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn launch(&self, uid: &str) -> ClusterResult<()> {
        let mut models = self.models.write().await;
        if models.contains_key(uid) {
            return Err(ClusterError::ModelAlreadyRunning {
                uid: uid.to_string(),
            });
        }
        models.insert(uid.to_string(), Utc::now());
        info!("模型 {} 已启动，当前运行数: {}", uid, models.len());
        Ok(())
    }

    pub async fn terminate(&self, uid: &str) -> ClusterResult<()> {
        let mut models = self.models.write().await;
        if models.remove(uid).is_none() {
            return Err(ClusterError::ModelNotFound {
                uid: uid.to_string(),
            });
        }
        info!("模型 {} 已停止，当前运行数: {}", uid, models.len());
        Ok(())
    }

    pub async fn count(&self) -> u32 {
        self.models.read().await.len() as u32
    }

    pub async fn running_models(&self) -> Vec<RunningModel> {
        self.models
            .read()
            .await
            .iter()
            .map(|(uid, launched_at)| RunningModel {
                uid: uid.clone(),
                launched_at: *launched_at,
            })
            .collect()
    }
}
