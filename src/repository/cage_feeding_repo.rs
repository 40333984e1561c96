// ==========================================
// 网箱投喂控制系统 - 网箱投喂数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 排序: 所有列表查询按 execution_order 升序 (物理访问顺序)
// ==========================================

use crate::domain::cage_feeding::CageFeeding;
use crate::domain::types::{CageFeedingMode, CageFeedingStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::parse_enum;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT cage_feeding_id, session_id, cage_id, doser_id, silo_id, execution_order,
           programmed_kg, programmed_visits, rate_kg_per_min, mode,
           dispensed_kg, completed_visits, status
    FROM cage_feeding
"#;

// ==========================================
// CageFeedingRepository - 网箱投喂仓储
// ==========================================
pub struct CageFeedingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CageFeedingRepository {
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

    pub(crate) fn insert_with(conn: &Connection, feeding: &CageFeeding) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO cage_feeding (
                cage_feeding_id, session_id, cage_id, doser_id, silo_id, execution_order,
                programmed_kg, programmed_visits, rate_kg_per_min, mode,
                dispensed_kg, completed_visits, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                feeding.cage_feeding_id,
                feeding.session_id,
                feeding.cage_id,
                feeding.doser_id,
                feeding.silo_id,
                feeding.execution_order,
                feeding.programmed_kg,
                feeding.programmed_visits,
                feeding.rate_kg_per_min,
                feeding.mode.as_str(),
                feeding.dispensed_kg,
                feeding.completed_visits,
                feeding.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// 写回进度字段 (dispensed_kg / completed_visits / status)
    pub(crate) fn update_progress_with(
        conn: &Connection,
        feeding: &CageFeeding,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE cage_feeding
            SET dispensed_kg = ?, completed_visits = ?, status = ?
            WHERE cage_feeding_id = ?
            "#,
            params![
                feeding.dispensed_kg,
                feeding.completed_visits,
                feeding.status.as_str(),
                feeding.cage_feeding_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CageFeeding".to_string(),
                id: feeding.cage_feeding_id.clone(),
            });
        }
        Ok(())
    }

    /// 修改下料速率（运行中也允许，下一次访问生效）
    pub(crate) fn update_rate_with(
        conn: &Connection,
        cage_feeding_id: &str,
        rate_kg_per_min: f64,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE cage_feeding SET rate_kg_per_min = ?1 WHERE cage_feeding_id = ?2",
            params![rate_kg_per_min, cage_feeding_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CageFeeding".to_string(),
                id: cage_feeding_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, cage_feeding_id: &str) -> RepositoryResult<Option<CageFeeding>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE cage_feeding_id = ?1", SELECT_COLUMNS);
        let feeding = conn
            .query_row(&sql, params![cage_feeding_id], Self::map_row)
            .optional()?;
        Ok(feeding)
    }

    /// 查询会话下全部网箱投喂（按执行顺序）
    pub fn find_by_session(&self, session_id: &str) -> RepositoryResult<Vec<CageFeeding>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE session_id = ?1 ORDER BY execution_order ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let feedings = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(feedings)
    }

    /// 查询正在访问的网箱投喂
    ///
    /// 依据 feeding_session.current_cage_feeding_id；两次访问之间为 None
    pub fn find_current_by_session(
        &self,
        session_id: &str,
    ) -> RepositoryResult<Option<CageFeeding>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"{} WHERE cage_feeding_id = (
                SELECT current_cage_feeding_id FROM feeding_session WHERE session_id = ?1
            )"#,
            SELECT_COLUMNS
        );
        let feeding = conn
            .query_row(&sql, params![session_id], Self::map_row)
            .optional()?;
        Ok(feeding)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CageFeeding> {
        Ok(CageFeeding {
            cage_feeding_id: row.get(0)?,
            session_id: row.get(1)?,
            cage_id: row.get(2)?,
            doser_id: row.get(3)?,
            silo_id: row.get(4)?,
            execution_order: row.get(5)?,
            programmed_kg: row.get(6)?,
            programmed_visits: row.get(7)?,
            rate_kg_per_min: row.get(8)?,
            mode: parse_enum(9, &row.get::<_, String>(9)?, CageFeedingMode::from_str)?,
            dispensed_kg: row.get(10)?,
            completed_visits: row.get(11)?,
            status: parse_enum(12, &row.get::<_, String>(12)?, CageFeedingStatus::from_str)?,
        })
    }
}
