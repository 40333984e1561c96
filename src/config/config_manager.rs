// ==========================================
// 网箱投喂控制系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope，当前只用 global)
// ==========================================

use crate::config::feeding_config_trait::FeedingConfigReader;
use crate::config::ConfigError;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const POLL_INTERVAL_MS: &str = "feeding/poll_interval_ms";
    pub const DEFAULT_TRANSPORT_TIME_S: &str = "feeding/default_transport_time_s";
    pub const SIMULATOR_POLLS_PER_VISIT: &str = "feeding/simulator_polls_per_visit";
}

// ===== 默认值 =====
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_TRANSPORT_TIME_S: f64 = 5.0;
pub const DEFAULT_SIMULATOR_POLLS_PER_VISIT: u32 = 3;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, ConfigError> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, ConfigError> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ConfigError::Lock(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取并解析配置值，不存在时使用默认值
    fn get_parsed_or_default<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get_config_value(key)? {
            Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
            None => Ok(default),
        }
    }

    /// 写入 global scope 配置（覆写）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> Result<HashMap<String, String>, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }
}

#[async_trait]
impl FeedingConfigReader for ConfigManager {
    async fn get_poll_interval(&self) -> Result<Duration, ConfigError> {
        let ms = self.get_parsed_or_default(config_keys::POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS)?;
        Ok(Duration::from_millis(ms))
    }

    async fn get_default_transport_time_s(&self) -> Result<f64, ConfigError> {
        self.get_parsed_or_default(config_keys::DEFAULT_TRANSPORT_TIME_S, DEFAULT_TRANSPORT_TIME_S)
    }

    async fn get_simulator_polls_per_visit(&self) -> Result<u32, ConfigError> {
        self.get_parsed_or_default(
            config_keys::SIMULATOR_POLLS_PER_VISIT,
            DEFAULT_SIMULATOR_POLLS_PER_VISIT,
        )
    }
}
