// ==========================================
// 网箱投喂控制系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为可读的错误消息
// 分类: 前置条件错误在下发任何设备命令之前同步返回，不创建会话
// ==========================================

use crate::config::ConfigError;
use crate::device::DeviceError;
use crate::engine::{EngineError, StockShortage};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 前置条件错误
    // ==========================================
    #[error("投喂线已有执行中的会话: line={line_id}, session={session_id}")]
    ActiveSessionExists { line_id: String, session_id: String },

    #[error("网箱不属于该投喂线: cage={cage_id}, line={line_id}")]
    CageNotOnLine { cage_id: String, line_id: String },

    #[error("下料速率超出下料器能力: cage={cage_id}, rate={rate_kg_per_min}kg/min, max={max_rate_kg_per_min}kg/min")]
    RateExceedsCapacity {
        cage_id: String,
        rate_kg_per_min: f64,
        max_rate_kg_per_min: f64,
    },

    #[error(transparent)]
    InsufficientStock(#[from] StockShortage),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 下层错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("设备错误: {0}")]
    Device(#[from] DeviceError),

    #[error("引擎错误: {0}")]
    Engine(#[from] EngineError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("检查约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}: {}", field, message))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

/// API Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
