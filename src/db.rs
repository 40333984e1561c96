// ==========================================
// 网箱投喂控制系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键级联删除依赖 foreign_keys)
// - 统一 busy_timeout，减少后台任务与控制请求并发写入时的 busy 错误
// - 内置 schema，init_schema 幂等
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表语句
///
/// 说明：
/// - cage_feeding / feeding_event 随 feeding_session 级联删除
/// - 布局表 (feeding_line / cage / doser / silo) 由外部系统维护，这里只建表
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS feeding_line (
    line_id TEXT PRIMARY KEY,
    line_name TEXT NOT NULL,
    blower_power_pct REAL NOT NULL,
    blow_before_s REAL NOT NULL DEFAULT 0,
    blow_after_s REAL NOT NULL DEFAULT 0,
    selector_positioning_s REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS silo (
    silo_id TEXT PRIMARY KEY,
    silo_name TEXT NOT NULL,
    stock_kg REAL NOT NULL DEFAULT 0,
    capacity_kg REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS doser (
    doser_id TEXT PRIMARY KEY,
    line_id TEXT NOT NULL REFERENCES feeding_line(line_id),
    silo_id TEXT NOT NULL UNIQUE REFERENCES silo(silo_id),
    max_rate_kg_per_min REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS cage (
    cage_id TEXT PRIMARY KEY,
    cage_name TEXT NOT NULL,
    line_id TEXT REFERENCES feeding_line(line_id),
    slot_number INTEGER,
    transport_time_s REAL
);

CREATE TABLE IF NOT EXISTS feeding_session (
    session_id TEXT PRIMARY KEY,
    line_id TEXT NOT NULL REFERENCES feeding_line(line_id),
    feeding_type TEXT NOT NULL,
    operator_id TEXT NOT NULL,
    total_programmed_kg REAL NOT NULL,
    allow_overtime INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    actual_start TEXT NOT NULL,
    ended_at TEXT,
    total_dispensed_kg REAL NOT NULL DEFAULT 0,
    -- 正在访问的网箱投喂 (visit_started 写入，visit_completed 清空)
    current_cage_feeding_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_feeding_session_line_status
    ON feeding_session(line_id, status);

-- 同一投喂线最多一个 ACTIVE 会话
CREATE UNIQUE INDEX IF NOT EXISTS uq_feeding_session_active_line
    ON feeding_session(line_id) WHERE status = 'ACTIVE';

CREATE TABLE IF NOT EXISTS cage_feeding (
    cage_feeding_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES feeding_session(session_id) ON DELETE CASCADE,
    cage_id TEXT NOT NULL,
    doser_id TEXT NOT NULL,
    silo_id TEXT NOT NULL,
    execution_order INTEGER NOT NULL,
    programmed_kg REAL NOT NULL,
    programmed_visits INTEGER NOT NULL,
    rate_kg_per_min REAL NOT NULL,
    mode TEXT NOT NULL,
    dispensed_kg REAL NOT NULL DEFAULT 0,
    completed_visits INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    CHECK (completed_visits <= programmed_visits)
);

CREATE INDEX IF NOT EXISTS idx_cage_feeding_session
    ON cage_feeding(session_id, execution_order);

CREATE TABLE IF NOT EXISTS feeding_event (
    event_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES feeding_session(session_id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    payload_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feeding_event_session
    ON feeding_event(session_id, occurred_at);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存数据库并建表（测试/演示用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 建表并写入 schema_version（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
