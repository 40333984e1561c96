// ==========================================
// 网箱投喂控制系统 - 投喂事件数据仓储
// ==========================================
// 红线: 只追加，不提供 update / delete
//       (仅随 feeding_session 级联删除)
// ==========================================

use crate::domain::feeding_event::{FeedingEvent, FeedingEventKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{format_ts, parse_ts};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// FeedingEventRepository - 投喂事件仓储
// ==========================================
pub struct FeedingEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FeedingEventRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加事件
    pub fn append(&self, event: &FeedingEvent) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::append_with(&conn, event)?;
        Ok(event.event_id.clone())
    }

    pub(crate) fn append_with(conn: &Connection, event: &FeedingEvent) -> RepositoryResult<()> {
        let payload = serde_json::to_string(&event.kind).map_err(|e| {
            RepositoryError::FieldValueError {
                field: "payload_json".to_string(),
                message: e.to_string(),
            }
        })?;

        conn.execute(
            r#"
            INSERT INTO feeding_event (event_id, session_id, event_type, occurred_at, payload_json)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                event.event_id,
                event.session_id,
                event.event_type(),
                format_ts(&event.occurred_at),
                payload,
            ],
        )?;
        Ok(())
    }

    /// 查询会话的完整事件轨迹（按发生顺序）
    pub fn find_by_session(&self, session_id: &str) -> RepositoryResult<Vec<FeedingEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, session_id, occurred_at, payload_json
            FROM feeding_event
            WHERE session_id = ?1
            ORDER BY occurred_at ASC, rowid ASC
            "#,
        )?;

        let events = stmt
            .query_map(params![session_id], |row| {
                let payload: String = row.get(3)?;
                let kind: FeedingEventKind = serde_json::from_str(&payload).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(FeedingEvent {
                    event_id: row.get(0)?,
                    session_id: row.get(1)?,
                    occurred_at: parse_ts(2, &row.get::<_, String>(2)?)?,
                    kind,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// 按事件类型计数
    pub fn count_by_type(&self, session_id: &str, event_type: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM feeding_event WHERE session_id = ?1 AND event_type = ?2",
            params![session_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
