// ==========================================
// 网箱投喂控制系统 - 投喂事件领域模型
// ==========================================
// 红线: 事件只追加，不修改，不单独删除
// 用途: 审计追踪，复盘会话结束原因
// 对齐: feeding_event 表 (event_type + payload_json)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// FeedingEvent - 投喂事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingEvent {
    pub event_id: String,
    pub session_id: String,
    pub occurred_at: NaiveDateTime,
    pub kind: FeedingEventKind,
}

// ==========================================
// FeedingEventKind - 事件类型及负载
// ==========================================
// 序列化: {"event_type": "visit_completed", ...payload}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum FeedingEventKind {
    SessionStarted {
        operator_id: String,
        total_programmed_kg: f64,
        cage_count: usize,
    },
    VisitStarted {
        cage_id: String,
        visit_number: i32, // 该网箱的第几次访问 (1起)
        cycle_number: i32, // 第几轮 (1起)
        target_kg: f64,
        rate_kg_per_min: f64,
    },
    VisitCompleted {
        cage_id: String,
        visit_number: i32,
        cycle_number: i32,
        dispensed_grams: i64,
        duration_seconds: f64,
    },
    SessionInterrupted {
        reason: String,
        error_code: Option<i32>,
        cage_id: Option<String>,
        cage_pending_visits: i32, // 当前网箱剩余访问
        pending_visits: i32,      // 整场剩余访问
    },
    SessionCompleted {
        operator_id: String,
        total_dispensed_kg: f64,
        duration_seconds: i64,
    },
    SessionCancelled {
        operator_id: String,
        pending_visits: i32,
    },
    SessionPaused {
        operator_id: String,
    },
    SessionResumed {
        operator_id: String,
    },
    FeedingRateChanged {
        cage_id: String,
        old_rate_kg_per_min: f64,
        new_rate_kg_per_min: f64,
    },
}

impl FeedingEventKind {
    /// 事件类型标识 (用于数据库 event_type 列)
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedingEventKind::SessionStarted { .. } => "session_started",
            FeedingEventKind::VisitStarted { .. } => "visit_started",
            FeedingEventKind::VisitCompleted { .. } => "visit_completed",
            FeedingEventKind::SessionInterrupted { .. } => "session_interrupted",
            FeedingEventKind::SessionCompleted { .. } => "session_completed",
            FeedingEventKind::SessionCancelled { .. } => "session_cancelled",
            FeedingEventKind::SessionPaused { .. } => "session_paused",
            FeedingEventKind::SessionResumed { .. } => "session_resumed",
            FeedingEventKind::FeedingRateChanged { .. } => "feeding_rate_changed",
        }
    }
}

impl FeedingEvent {
    /// 创建新事件 (UUID + 当前时间)
    pub fn new(session_id: &str, kind: FeedingEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            occurred_at: chrono::Utc::now().naive_utc(),
            kind,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// 千克换算为克 (四舍五入)
pub fn kg_to_grams(kg: f64) -> i64 {
    (kg * 1000.0).round() as i64
}
