// ==========================================
// 网箱投喂控制系统 - 核心库
// ==========================================
// 技术栈: Rust + Tokio + SQLite
// 系统定位: 投喂线执行控制 (计划 → 设备命令 → 进度持久化)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 设备层 - 设备端口与模拟器
pub mod device;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 投喂编排
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CageFeedingMode, CageFeedingStatus, FeedingType, SessionStatus};

// 领域实体
pub use domain::{Cage, CageFeeding, Doser, FeedingEvent, FeedingEventKind, FeedingLine, FeedingSession, Silo};

// 设备
pub use device::{DevicePort, DeviceStatus, SimulatedDevice, VisitCommand, VisitStage};

// 引擎
pub use engine::{FeedingOrchestrator, FeedingRunPlan, RunOutcome};

// API
pub use api::{ApiError, FeedingApi, StartFeedingRequest};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "网箱投喂控制系统";
