// ==========================================
// 网箱投喂控制系统 - 引擎层
// ==========================================
// 职责: 投喂编排、轮次调度、库存核算
// 红线: Engine 不拼 SQL，持久化全部经由 Repository
// ==========================================

pub mod error;
pub mod orchestrator;
pub mod repositories;
pub mod schedule;
pub mod stock;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use orchestrator::{
    FeedingOrchestrator, FeedingRunPlan, OrchestratorSettings, RunOutcome, DEFAULT_POLL_INTERVAL,
};
pub use repositories::FeedingRepositories;
pub use schedule::{VisitStep, VisitTiming};
pub use stock::{check_silo_stock, required_stock_kg, StockShortage};
