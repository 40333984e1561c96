// ==========================================
// 网箱投喂控制系统 - 设备布局数据仓储
// ==========================================
// 说明: 布局 (投喂线/网箱/下料器) 由外部系统维护
//       这里提供计划用例所需的读取，以及初始化/测试用的写入
// ==========================================

use crate::domain::layout::{Cage, Doser, FeedingLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// LayoutRepository - 布局仓储
// ==========================================
pub struct LayoutRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LayoutRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 投喂线
    // ==========================================

    pub fn insert_line(&self, line: &FeedingLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO feeding_line (
                line_id, line_name, blower_power_pct, blow_before_s, blow_after_s,
                selector_positioning_s
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                line.line_id,
                line.line_name,
                line.blower_power_pct,
                line.blow_before_s,
                line.blow_after_s,
                line.selector_positioning_s,
            ],
        )?;
        Ok(())
    }

    pub fn find_line(&self, line_id: &str) -> RepositoryResult<Option<FeedingLine>> {
        let conn = self.get_conn()?;
        let line = conn
            .query_row(
                r#"
                SELECT line_id, line_name, blower_power_pct, blow_before_s, blow_after_s,
                       selector_positioning_s
                FROM feeding_line WHERE line_id = ?1
                "#,
                params![line_id],
                |row| {
                    Ok(FeedingLine {
                        line_id: row.get(0)?,
                        line_name: row.get(1)?,
                        blower_power_pct: row.get(2)?,
                        blow_before_s: row.get(3)?,
                        blow_after_s: row.get(4)?,
                        selector_positioning_s: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(line)
    }

    pub fn list_line_ids(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT line_id FROM feeding_line ORDER BY line_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    // ==========================================
    // 网箱
    // ==========================================

    pub fn insert_cage(&self, cage: &Cage) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO cage (cage_id, cage_name, line_id, slot_number, transport_time_s)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                cage.cage_id,
                cage.cage_name,
                cage.line_id,
                cage.slot_number,
                cage.transport_time_s,
            ],
        )?;
        Ok(())
    }

    pub fn find_cage(&self, cage_id: &str) -> RepositoryResult<Option<Cage>> {
        let conn = self.get_conn()?;
        let cage = conn
            .query_row(
                r#"
                SELECT cage_id, cage_name, line_id, slot_number, transport_time_s
                FROM cage WHERE cage_id = ?1
                "#,
                params![cage_id],
                |row| {
                    Ok(Cage {
                        cage_id: row.get(0)?,
                        cage_name: row.get(1)?,
                        line_id: row.get(2)?,
                        slot_number: row.get(3)?,
                        transport_time_s: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(cage)
    }

    // ==========================================
    // 下料器
    // ==========================================

    pub fn insert_doser(&self, doser: &Doser) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO doser (doser_id, line_id, silo_id, max_rate_kg_per_min)
            VALUES (?, ?, ?, ?)
            "#,
            params![
                doser.doser_id,
                doser.line_id,
                doser.silo_id,
                doser.max_rate_kg_per_min,
            ],
        )?;
        Ok(())
    }

    pub fn find_doser(&self, doser_id: &str) -> RepositoryResult<Option<Doser>> {
        let conn = self.get_conn()?;
        let doser = conn
            .query_row(
                r#"
                SELECT doser_id, line_id, silo_id, max_rate_kg_per_min
                FROM doser WHERE doser_id = ?1
                "#,
                params![doser_id],
                |row| {
                    Ok(Doser {
                        doser_id: row.get(0)?,
                        line_id: row.get(1)?,
                        silo_id: row.get(2)?,
                        max_rate_kg_per_min: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(doser)
    }
}
