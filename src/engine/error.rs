// ==========================================
// 网箱投喂控制系统 - 引擎层错误类型
// ==========================================

use thiserror::Error;

use crate::config::ConfigError;
use crate::device::DeviceError;
use crate::repository::RepositoryError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("设备错误: {0}")]
    Device(#[from] DeviceError),

    /// 停机命令已下发但失败 (不再补偿重试)
    #[error("停机命令失败: line={line_id}, {source}")]
    StopFailed {
        line_id: String,
        #[source]
        source: DeviceError,
    },

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("网箱未分配槽位: cage={cage_id}")]
    MissingSlot { cage_id: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
