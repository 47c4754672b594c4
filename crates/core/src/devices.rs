//! 本机加速卡数量探测

pub const VISIBLE_DEVICES_ENV: &str = "CUDA_VISIBLE_DEVICES";

/// 解析形如 "0,1,3" 的设备列表，忽略空项和非法序号
pub fn parse_visible_devices(value: &str) -> Vec<u32> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<u32>().ok())
        .collect()
}

/// 根据环境变量获取可见设备数量，未设置时为 0
pub fn visible_device_count() -> u32 {
    std::env::var(VISIBLE_DEVICES_ENV)
        .map(|v| parse_visible_devices(&v).len() as u32)
        .unwrap_or(0)
}
