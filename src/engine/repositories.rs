// ==========================================
// 网箱投喂控制系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合编排器与计划用例所需的 Repository，简化依赖注入
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::repository::{
    CageFeedingRepository, FeedingEventRepository, FeedingProgressRepository,
    FeedingSessionRepository, LayoutRepository, SiloRepository,
};

/// 投喂仓储集合
///
/// 所有仓储共享同一个连接，跨表写入统一经由 `progress_repo` 的事务方法
#[derive(Clone)]
pub struct FeedingRepositories {
    pub session_repo: Arc<FeedingSessionRepository>,
    pub cage_feeding_repo: Arc<CageFeedingRepository>,
    pub event_repo: Arc<FeedingEventRepository>,
    pub silo_repo: Arc<SiloRepository>,
    pub layout_repo: Arc<LayoutRepository>,
    pub progress_repo: Arc<FeedingProgressRepository>,
}

impl FeedingRepositories {
    /// 基于共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            session_repo: Arc::new(FeedingSessionRepository::new(conn.clone())),
            cage_feeding_repo: Arc::new(CageFeedingRepository::new(conn.clone())),
            event_repo: Arc::new(FeedingEventRepository::new(conn.clone())),
            silo_repo: Arc::new(SiloRepository::new(conn.clone())),
            layout_repo: Arc::new(LayoutRepository::new(conn.clone())),
            progress_repo: Arc::new(FeedingProgressRepository::new(conn)),
        }
    }
}
