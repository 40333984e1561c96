// ==========================================
// 网箱投喂控制系统 - 料仓数据仓储
// ==========================================
// 说明: 库存扣减使用单条 UPDATE (stock_kg = stock_kg - ?)，
//       在所属事务内原子完成，不做读-改-写
// ==========================================

use crate::domain::layout::Silo;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// SiloRepository - 料仓仓储
// ==========================================
pub struct SiloRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SiloRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, silo: &Silo) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO silo (silo_id, silo_name, stock_kg, capacity_kg) VALUES (?, ?, ?, ?)",
            params![silo.silo_id, silo.silo_name, silo.stock_kg, silo.capacity_kg],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, silo_id: &str) -> RepositoryResult<Option<Silo>> {
        let conn = self.get_conn()?;
        let silo = conn
            .query_row(
                "SELECT silo_id, silo_name, stock_kg, capacity_kg FROM silo WHERE silo_id = ?1",
                params![silo_id],
                |row| {
                    Ok(Silo {
                        silo_id: row.get(0)?,
                        silo_name: row.get(1)?,
                        stock_kg: row.get(2)?,
                        capacity_kg: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(silo)
    }

    /// 按实际下料量扣减库存，返回扣减后的库存
    pub(crate) fn decrement_stock_with(
        conn: &Connection,
        silo_id: &str,
        amount_kg: f64,
    ) -> RepositoryResult<f64> {
        let rows = conn.execute(
            "UPDATE silo SET stock_kg = stock_kg - ?1 WHERE silo_id = ?2",
            params![amount_kg, silo_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Silo".to_string(),
                id: silo_id.to_string(),
            });
        }

        let stock: f64 = conn.query_row(
            "SELECT stock_kg FROM silo WHERE silo_id = ?1",
            params![silo_id],
            |row| row.get(0),
        )?;
        Ok(stock)
    }
}
