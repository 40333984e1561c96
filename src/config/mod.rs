// ==========================================
// 网箱投喂控制系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod feeding_config_trait;

use thiserror::Error;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use feeding_config_trait::FeedingConfigReader;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置值无效: key={key}, value={value}")]
    InvalidValue { key: String, value: String },

    #[error("配置锁获取失败: {0}")]
    Lock(String),

    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),
}
