// ==========================================
// 网箱投喂控制系统 - 投喂进度事务仓储
// ==========================================
// 职责: 跨表写入的工作单元，每个方法一个短事务
// 红线: 成功提交，任何错误回滚 (Transaction drop 即回滚)
//       崩溃时保留上一次已提交的进度
// ==========================================

use crate::domain::cage_feeding::CageFeeding;
use crate::domain::feeding_event::FeedingEvent;
use crate::domain::session::FeedingSession;
use crate::repository::cage_feeding_repo::CageFeedingRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::feeding_event_repo::FeedingEventRepository;
use crate::repository::session_repo::FeedingSessionRepository;
use crate::repository::silo_repo::SiloRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

// ==========================================
// FeedingProgressRepository - 投喂进度仓储
// ==========================================
pub struct FeedingProgressRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FeedingProgressRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建会话: 会话 + 全部网箱投喂 + session_started 事件
    pub fn create_session(
        &self,
        session: &FeedingSession,
        feedings: &[CageFeeding],
        started: &FeedingEvent,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        FeedingSessionRepository::insert_with(&tx, session)?;
        for feeding in feedings {
            CageFeedingRepository::insert_with(&tx, feeding)?;
        }
        FeedingEventRepository::append_with(&tx, started)?;

        tx.commit()?;
        Ok(())
    }

    /// 访问开始: 网箱状态 (可能 PENDING → IN_PROGRESS) + 当前网箱标记 + visit_started 事件
    pub fn record_visit_started(
        &self,
        feeding: &CageFeeding,
        event: &FeedingEvent,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        CageFeedingRepository::update_progress_with(&tx, feeding)?;
        FeedingSessionRepository::set_current_cage_feeding_with(
            &tx,
            &feeding.session_id,
            Some(&feeding.cage_feeding_id),
        )?;
        FeedingEventRepository::append_with(&tx, event)?;

        tx.commit()?;
        Ok(())
    }

    /// 访问完成: 网箱进度 + 清空当前网箱标记 + visit_completed 事件 + 料仓扣减
    ///
    /// # 返回
    /// 扣减后的料仓库存
    pub fn record_visit_completed(
        &self,
        feeding: &CageFeeding,
        event: &FeedingEvent,
        dispensed_kg: f64,
    ) -> RepositoryResult<f64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        CageFeedingRepository::update_progress_with(&tx, feeding)?;
        FeedingSessionRepository::set_current_cage_feeding_with(&tx, &feeding.session_id, None)?;
        FeedingEventRepository::append_with(&tx, event)?;
        let stock = SiloRepository::decrement_stock_with(&tx, &feeding.silo_id, dispensed_kg)?;

        tx.commit()?;
        Ok(stock)
    }

    /// 会话终结: 状态 + 终结事件
    ///
    /// 在同一事务内重读会话：若已被其他请求置为终态，则不写入，返回 false
    pub fn terminate_session(
        &self,
        session: &FeedingSession,
        event: &FeedingEvent,
    ) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let stored = FeedingSessionRepository::find_by_id_with(&tx, &session.session_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "FeedingSession".to_string(),
                id: session.session_id.clone(),
            })?;
        if stored.is_terminal() {
            return Ok(false);
        }

        FeedingSessionRepository::update_status_with(&tx, session)?;
        FeedingEventRepository::append_with(&tx, event)?;

        tx.commit()?;
        Ok(true)
    }

    /// 修改网箱下料速率 + feeding_rate_changed 事件
    pub fn change_rate(
        &self,
        cage_feeding_id: &str,
        rate_kg_per_min: f64,
        event: &FeedingEvent,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        CageFeedingRepository::update_rate_with(&tx, cage_feeding_id, rate_kg_per_min)?;
        FeedingEventRepository::append_with(&tx, event)?;

        tx.commit()?;
        Ok(())
    }

    /// 追加单条事件 (暂停/恢复等不改状态的操作)
    pub fn append_event(&self, event: &FeedingEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        FeedingEventRepository::append_with(&conn, event)
    }
}
