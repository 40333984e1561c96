// ==========================================
// 网箱投喂控制系统 - 投喂会话领域模型
// ==========================================
// 红线: 同一投喂线同时最多一个 ACTIVE 会话（由计划用例保证）
// 红线: 终态会话不再迁移
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{FeedingType, SessionStatus};

// ==========================================
// FeedingSession - 投喂会话
// ==========================================
// 对齐: feeding_session 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingSession {
    pub session_id: String,
    pub line_id: String,
    pub feeding_type: FeedingType,
    pub operator_id: String,
    pub total_programmed_kg: f64,   // 计划总量 (仅 NORMAL 模式计入)
    pub allow_overtime: bool,
    pub status: SessionStatus,
    pub actual_start: NaiveDateTime,

    // ===== 结束信息 (终态时写入) =====
    pub ended_at: Option<NaiveDateTime>,
    pub total_dispensed_kg: f64,
}

impl FeedingSession {
    /// 创建 ACTIVE 会话
    pub fn new(
        session_id: String,
        line_id: String,
        feeding_type: FeedingType,
        operator_id: String,
        total_programmed_kg: f64,
        allow_overtime: bool,
        actual_start: NaiveDateTime,
    ) -> Self {
        Self {
            session_id,
            line_id,
            feeding_type,
            operator_id,
            total_programmed_kg,
            allow_overtime,
            status: SessionStatus::Active,
            actual_start,
            ended_at: None,
            total_dispensed_kg: 0.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 标记完成，返回是否发生了状态迁移
    pub fn complete(&mut self, total_dispensed_kg: f64, now: NaiveDateTime) -> bool {
        self.terminate(SessionStatus::Completed, now, Some(total_dispensed_kg))
    }

    /// 标记中断
    pub fn interrupt(&mut self, now: NaiveDateTime) -> bool {
        self.terminate(SessionStatus::Interrupted, now, None)
    }

    /// 标记取消
    pub fn cancel(&mut self, now: NaiveDateTime) -> bool {
        self.terminate(SessionStatus::Cancelled, now, None)
    }

    /// 自实际开始以来的时长（秒）
    pub fn elapsed_seconds(&self, now: NaiveDateTime) -> i64 {
        (now - self.actual_start).num_seconds().max(0)
    }

    fn terminate(
        &mut self,
        status: SessionStatus,
        now: NaiveDateTime,
        total_dispensed_kg: Option<f64>,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        self.ended_at = Some(now);
        if let Some(total) = total_dispensed_kg {
            self.total_dispensed_kg = total;
        }
        true
    }
}
