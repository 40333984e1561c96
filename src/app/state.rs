// ==========================================
// 网箱投喂控制系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 装配: 连接 → 仓储 → 配置 → 设备 → 编排器 → API
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::FeedingApi;
use crate::config::{ConfigManager, FeedingConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::device::{DevicePort, SimulatedDevice, SimulatorSettings};
use crate::engine::{FeedingOrchestrator, FeedingRepositories, OrchestratorSettings};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享数据库连接
    pub conn: Arc<Mutex<Connection>>,

    /// 仓储集合
    pub repos: FeedingRepositories,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 设备驱动
    pub device: Arc<dyn DevicePort>,

    /// 投喂编排器
    pub orchestrator: Arc<FeedingOrchestrator>,

    /// 投喂API
    pub feeding_api: Arc<FeedingApi>,
}

impl AppState {
    /// 打开数据库并装配全部组件
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - device: 设备驱动
    ///
    /// # 返回
    /// - Err(String): 初始化错误
    pub async fn new(db_path: String, device: Arc<dyn DevicePort>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)), device).await
    }

    /// 基于已有连接装配 (连接需已建表)
    pub async fn from_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        device: Arc<dyn DevicePort>,
    ) -> Result<Self, String> {
        let repos = FeedingRepositories::from_connection(conn.clone());

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let poll_interval = config_manager
            .get_poll_interval()
            .await
            .map_err(|e| format!("读取轮询间隔失败: {}", e))?;

        let orchestrator = Arc::new(FeedingOrchestrator::new(
            repos.clone(),
            device.clone(),
            OrchestratorSettings { poll_interval },
        ));

        let feeding_api = Arc::new(FeedingApi::new(
            repos.clone(),
            orchestrator.clone(),
            device.clone(),
            config_manager.clone(),
        ));

        tracing::info!(poll_interval_ms = poll_interval.as_millis() as u64, "AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            repos,
            config_manager,
            device,
            orchestrator,
            feeding_api,
        })
    }

    /// 使用模拟器作为设备驱动装配
    ///
    /// 模拟器注册库中全部投喂线，单次访问轮询次数取自配置
    pub async fn with_simulator(db_path: String) -> Result<(Self, Arc<SimulatedDevice>), String> {
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = ConfigManager::from_connection(conn.clone())
            .map_err(|e| format!("无法创建ConfigManager: {}", e))?;
        let polls_per_visit = config_manager
            .get_simulator_polls_per_visit()
            .await
            .map_err(|e| format!("读取模拟器配置失败: {}", e))?;

        let simulator = Arc::new(SimulatedDevice::new(SimulatorSettings {
            polls_per_visit,
            ..SimulatorSettings::default()
        }));
        let line_ids = FeedingRepositories::from_connection(conn.clone())
            .layout_repo
            .list_line_ids()
            .map_err(|e| format!("读取投喂线失败: {}", e))?;
        for line_id in &line_ids {
            simulator.register_line(line_id);
        }

        let state = Self::from_connection(db_path, conn, simulator.clone()).await?;
        Ok((state, simulator))
    }
}

/// 获取默认数据库路径
///
/// 优先级: CAGE_FEEDING_DB_PATH 环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CAGE_FEEDING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./cage_feeding.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("cage-feeding-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("cage-feeding");
        }

        // 目录创建失败时 SQLite 打开会报错，这里不拦截
        std::fs::create_dir_all(&path).ok();
        path = path.join("cage_feeding.db");
    }

    path.to_string_lossy().to_string()
}
