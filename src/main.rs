// ==========================================
// 网箱投喂控制系统 - 演示入口
// ==========================================
// 用法: cage-feeding [db_path]
// 流程: 建表 → 首次运行写入演示布局 → 模拟器执行一次循环投喂 → 打印事件
// ==========================================

use std::sync::{Arc, Mutex};

use cage_feeding::api::{CagePlanRequest, StartFeedingRequest};
use cage_feeding::app::{get_default_db_path, AppState};
use cage_feeding::config::{config_keys, ConfigManager};
use cage_feeding::db::{init_schema, open_sqlite_connection};
use cage_feeding::engine::FeedingRepositories;
use cage_feeding::{logging, Cage, CageFeedingMode, Doser, FeedingLine, FeedingType, Silo};

const DEMO_LINE_ID: &str = "LINE-1";
const DEMO_DOSER_ID: &str = "DOSER-1";
const DEMO_SILO_ID: &str = "SILO-1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", cage_feeding::APP_NAME, cage_feeding::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    seed_demo_layout(&db_path)?;

    let (state, _simulator) = AppState::with_simulator(db_path)
        .await
        .map_err(anyhow::Error::msg)?;

    let request = StartFeedingRequest {
        line_id: DEMO_LINE_ID.to_string(),
        doser_id: DEMO_DOSER_ID.to_string(),
        feeding_type: FeedingType::Cyclic,
        operator_id: "demo".to_string(),
        allow_overtime: false,
        cages: vec![
            demo_cage("CAGE-3", 1.5, 2, CageFeedingMode::Normal),
            demo_cage("CAGE-1", 2.0, 2, CageFeedingMode::Normal),
            demo_cage("CAGE-2", 1.0, 1, CageFeedingMode::Pause),
            demo_cage("CAGE-4", 0.0, 0, CageFeedingMode::Fasting),
        ],
    };

    let started = state.feeding_api.start_feeding(request).await?;
    tracing::info!(session_id = %started.session_id, "投喂会话已启动");

    let outcome = started.task.await??;
    tracing::info!(?outcome, "投喂会话结束");

    let session = state.feeding_api.get_session(&started.session_id)?;
    println!(
        "session={} status={} dispensed={:.3}kg / programmed={:.3}kg",
        session.session_id, session.status, session.total_dispensed_kg, session.total_programmed_kg
    );
    for event in state.feeding_api.list_session_events(&started.session_id)? {
        println!(
            "{}  {:<22} {}",
            event.occurred_at.format("%H:%M:%S%.3f"),
            event.event_type(),
            serde_json::to_string(&event.kind)?
        );
    }

    if let Some(silo) = state.repos.silo_repo.find_by_id(DEMO_SILO_ID)? {
        println!("silo={} stock={:.3}kg", silo.silo_id, silo.stock_kg);
    }

    Ok(())
}

fn demo_cage(cage_id: &str, kg_per_visit: f64, visits: i32, mode: CageFeedingMode) -> CagePlanRequest {
    CagePlanRequest {
        cage_id: cage_id.to_string(),
        kg_per_visit,
        visits,
        rate_kg_per_min: 12.0,
        mode,
    }
}

/// 首次运行写入演示布局 (一条线、一个料仓、四个网箱)
fn seed_demo_layout(db_path: &str) -> anyhow::Result<()> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let repos = FeedingRepositories::from_connection(conn.clone());
    if repos.layout_repo.find_line(DEMO_LINE_ID)?.is_some() {
        return Ok(());
    }

    tracing::info!("写入演示布局");
    repos.layout_repo.insert_line(&FeedingLine {
        line_id: DEMO_LINE_ID.to_string(),
        line_name: "一号投喂线".to_string(),
        blower_power_pct: 75.0,
        blow_before_s: 0.2,
        blow_after_s: 0.2,
        selector_positioning_s: 0.2,
    })?;
    repos.silo_repo.insert(&Silo {
        silo_id: DEMO_SILO_ID.to_string(),
        silo_name: "一号料仓".to_string(),
        stock_kg: 1_000.0,
        capacity_kg: 2_000.0,
    })?;
    repos.layout_repo.insert_doser(&Doser {
        doser_id: DEMO_DOSER_ID.to_string(),
        line_id: DEMO_LINE_ID.to_string(),
        silo_id: DEMO_SILO_ID.to_string(),
        max_rate_kg_per_min: 30.0,
    })?;
    for slot in 1..=4 {
        repos.layout_repo.insert_cage(&Cage {
            cage_id: format!("CAGE-{}", slot),
            cage_name: format!("{}号网箱", slot),
            line_id: Some(DEMO_LINE_ID.to_string()),
            slot_number: Some(slot),
            transport_time_s: None,
        })?;
    }

    // 演示用短轮询间隔
    let config = ConfigManager::from_connection(conn)?;
    config.set_global_config_value(config_keys::POLL_INTERVAL_MS, "200")?;
    config.set_global_config_value(config_keys::DEFAULT_TRANSPORT_TIME_S, "0.5")?;

    Ok(())
}
