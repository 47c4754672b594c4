use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 校验 host:port 形式的地址
pub fn validate_address(address: &str) -> anyhow::Result<()> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(anyhow::anyhow!("地址格式无效，应为 host:port: {}", address));
    };
    if host.is_empty() {
        return Err(anyhow::anyhow!("地址缺少主机名: {}", address));
    }
    port.parse::<u16>()
        .map_err(|_| anyhow::anyhow!("地址端口无效: {}", address))?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub enabled: bool,
    pub address: String,
    pub selection_timeout_ms: u64,
    pub stale_threshold_seconds: u64,
    pub stale_check_interval_seconds: u64,
    pub evict_stale_workers: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "127.0.0.1:9997".to_string(),
            selection_timeout_ms: 3000,
            stale_threshold_seconds: 30,
            stale_check_interval_seconds: 10,
            evict_stale_workers: false,
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_address(&self.address)?;

        if self.selection_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Worker选择超时必须大于0"));
        }

        if self.stale_threshold_seconds == 0 {
            return Err(anyhow::anyhow!("失联阈值必须大于0"));
        }

        if self.stale_check_interval_seconds == 0 {
            return Err(anyhow::anyhow!("失联检测间隔必须大于0"));
        }

        Ok(())
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_millis(self.selection_timeout_ms)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_seconds)
    }

    pub fn stale_check_interval(&self) -> Duration {
        Duration::from_secs(self.stale_check_interval_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub address: String,
    pub supervisor_address: String,
    pub heartbeat_interval_seconds: u64,
    pub report_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "127.0.0.1:9998".to_string(),
            supervisor_address: "127.0.0.1:9997".to_string(),
            heartbeat_interval_seconds: 5,
            report_timeout_seconds: 5,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_address(&self.address)?;
        validate_address(&self.supervisor_address)?;

        if self.heartbeat_interval_seconds == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        if self.report_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("上报超时必须大于0"));
        }

        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_seconds)
    }
}
