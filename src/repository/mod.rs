// ==========================================
// 网箱投喂控制系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化; 跨表写入统一走 FeedingProgressRepository 事务
// ==========================================

pub mod cage_feeding_repo;
pub mod error;
pub mod feeding_event_repo;
pub mod layout_repo;
pub mod progress_repo;
pub mod row_utils;
pub mod session_repo;
pub mod silo_repo;


// 重导出核心仓储
pub use cage_feeding_repo::CageFeedingRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use feeding_event_repo::FeedingEventRepository;
pub use layout_repo::LayoutRepository;
pub use progress_repo::FeedingProgressRepository;
pub use session_repo::FeedingSessionRepository;
pub use silo_repo::SiloRepository;
