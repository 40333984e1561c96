// ==========================================
// 网箱投喂控制系统 - 投喂配置读取 Trait
// ==========================================
// 职责: 定义编排器/计划用例所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ConfigError;

// ==========================================
// FeedingConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait FeedingConfigReader: Send + Sync {
    /// 获取设备状态轮询间隔
    ///
    /// # 默认值
    /// - 2000 ms
    async fn get_poll_interval(&self) -> Result<Duration, ConfigError>;

    /// 获取缺省管道输送时长（网箱未配置时使用）
    ///
    /// # 默认值
    /// - 5 秒
    async fn get_default_transport_time_s(&self) -> Result<f64, ConfigError>;

    /// 获取模拟器单次访问轮询次数
    ///
    /// # 默认值
    /// - 3
    async fn get_simulator_polls_per_visit(&self) -> Result<u32, ConfigError>;
}
