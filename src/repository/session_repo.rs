// ==========================================
// 网箱投喂控制系统 - 投喂会话数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: feeding_session 是后台编排任务与控制请求之间共享的唯一事实来源
// ==========================================

use crate::domain::session::FeedingSession;
use crate::domain::types::{FeedingType, SessionStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{format_ts, parse_enum, parse_ts};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT session_id, line_id, feeding_type, operator_id, total_programmed_kg,
           allow_overtime, status, actual_start, ended_at, total_dispensed_kg
    FROM feeding_session
"#;

// ==========================================
// FeedingSessionRepository - 投喂会话仓储
// ==========================================
pub struct FeedingSessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FeedingSessionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 在给定连接/事务上插入会话
    pub(crate) fn insert_with(conn: &Connection, session: &FeedingSession) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO feeding_session (
                session_id, line_id, feeding_type, operator_id, total_programmed_kg,
                allow_overtime, status, actual_start, ended_at, total_dispensed_kg
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                session.session_id,
                session.line_id,
                session.feeding_type.as_str(),
                session.operator_id,
                session.total_programmed_kg,
                session.allow_overtime,
                session.status.as_str(),
                format_ts(&session.actual_start),
                session.ended_at.as_ref().map(format_ts),
                session.total_dispensed_kg,
            ],
        )?;
        Ok(())
    }

    /// 写回会话状态与结束信息
    pub(crate) fn update_status_with(
        conn: &Connection,
        session: &FeedingSession,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE feeding_session
            SET status = ?, ended_at = ?, total_dispensed_kg = ?
            WHERE session_id = ?
            "#,
            params![
                session.status.as_str(),
                session.ended_at.as_ref().map(format_ts),
                session.total_dispensed_kg,
                session.session_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "FeedingSession".to_string(),
                id: session.session_id.clone(),
            });
        }
        Ok(())
    }

    /// 设置/清空正在访问的网箱投喂
    pub(crate) fn set_current_cage_feeding_with(
        conn: &Connection,
        session_id: &str,
        cage_feeding_id: Option<&str>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE feeding_session SET current_cage_feeding_id = ?1 WHERE session_id = ?2",
            params![cage_feeding_id, session_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "FeedingSession".to_string(),
                id: session_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除会话（cage_feeding / feeding_event 级联删除）
    pub fn delete(&self, session_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM feeding_session WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, session_id: &str) -> RepositoryResult<Option<FeedingSession>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, session_id)
    }

    pub(crate) fn find_by_id_with(
        conn: &Connection,
        session_id: &str,
    ) -> RepositoryResult<Option<FeedingSession>> {
        let sql = format!("{} WHERE session_id = ?1", SELECT_COLUMNS);
        let session = conn
            .query_row(&sql, params![session_id], Self::map_row)
            .optional()?;
        Ok(session)
    }

    /// 查询投喂线上的 ACTIVE 会话
    pub fn find_active_by_line(&self, line_id: &str) -> RepositoryResult<Option<FeedingSession>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE line_id = ?1 AND status = ?2 ORDER BY actual_start DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let session = conn
            .query_row(
                &sql,
                params![line_id, SessionStatus::Active.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(session)
    }

    /// 查询投喂线的历史会话（最近在前）
    pub fn list_by_line(&self, line_id: &str) -> RepositoryResult<Vec<FeedingSession>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE line_id = ?1 ORDER BY actual_start DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![line_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<FeedingSession> {
        let ended_at: Option<String> = row.get(8)?;
        Ok(FeedingSession {
            session_id: row.get(0)?,
            line_id: row.get(1)?,
            feeding_type: parse_enum(2, &row.get::<_, String>(2)?, FeedingType::from_str)?,
            operator_id: row.get(3)?,
            total_programmed_kg: row.get(4)?,
            allow_overtime: row.get(5)?,
            status: parse_enum(6, &row.get::<_, String>(6)?, SessionStatus::from_str)?,
            actual_start: parse_ts(7, &row.get::<_, String>(7)?)?,
            ended_at: ended_at.as_deref().map(|s| parse_ts(8, s)).transpose()?,
            total_dispensed_kg: row.get(9)?,
        })
    }
}
