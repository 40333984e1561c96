// ==========================================
// 网箱投喂控制系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供宿主程序 (CLI / 上位机) 调用
// ==========================================

pub mod error;
pub mod feeding_api;
pub mod validator;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use feeding_api::{
    completion_percentage, CagePlanRequest, FeedingApi, FeedingProgress, ManualDeviceCommand,
    StartFeedingRequest, StartedFeeding,
};
pub use validator::{FeedingPlanValidator, ValidatedCage, ValidatedPlan};
