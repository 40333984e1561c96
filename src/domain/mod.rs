// ==========================================
// 网箱投喂控制系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态迁移规则
// 红线: 不含数据访问逻辑,不含设备通信
// ==========================================

pub mod cage_feeding;
pub mod feeding_event;
pub mod layout;
pub mod session;
pub mod types;

// 重导出核心类型
pub use cage_feeding::CageFeeding;
pub use feeding_event::{kg_to_grams, FeedingEvent, FeedingEventKind};
pub use layout::{Cage, Doser, FeedingLine, Silo};
pub use session::FeedingSession;
pub use types::{CageFeedingMode, CageFeedingStatus, FeedingType, SessionStatus};
