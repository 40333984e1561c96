// ==========================================
// 网箱投喂控制系统 - 轮询访问调度
// ==========================================
// 职责: 决定每一轮中每个网箱做什么 (访问 / 等效等待 / 跳过)
// 规则:
// - 轮数 = max(programmed_visits)
// - FASTING 跳过
// - round ≥ programmed_visits 跳过 (网箱可少于最大轮数)
// - round < completed_visits 跳过 (已完成的轮次，恢复执行时使用)
// - PAUSE 只等待等效时长，不与设备通信
// ==========================================

use std::time::Duration;

use crate::domain::cage_feeding::CageFeeding;
use crate::domain::types::CageFeedingMode;

// ==========================================
// VisitStep - 单网箱单轮的动作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStep {
    /// 实际访问 (下料)
    Visit,
    /// 等效等待 (不下料)
    Wait,
}

// ==========================================
// VisitTiming - 投喂线固定时序参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitTiming {
    pub blower_power_pct: f64,
    pub blow_before_s: f64,
    pub blow_after_s: f64,
    pub selector_positioning_s: f64,
}

/// 计划总轮数
pub fn total_rounds(feedings: &[CageFeeding]) -> i32 {
    feedings
        .iter()
        .map(|f| f.programmed_visits)
        .max()
        .unwrap_or(0)
        .max(0)
}

/// 第 round 轮 (0起) 该网箱的动作，None 表示跳过
pub fn step_for(feeding: &CageFeeding, round: i32) -> Option<VisitStep> {
    if feeding.mode == CageFeedingMode::Fasting {
        return None;
    }
    if round >= feeding.programmed_visits {
        return None;
    }
    match feeding.mode {
        CageFeedingMode::Pause => Some(VisitStep::Wait),
        _ if round < feeding.completed_visits => None,
        _ => Some(VisitStep::Visit),
    }
}

/// PAUSE 模式的等效时长
///
/// 定位 + 前吹 + (计划量 / 速率) × 60 + 输送 + 后吹
/// 速率 ≤ 0 时下料时长按 0 计
pub fn pause_duration(feeding: &CageFeeding, timing: &VisitTiming, transport_time_s: f64) -> Duration {
    let dosing_s = if feeding.rate_kg_per_min > 0.0 {
        feeding.programmed_kg / feeding.rate_kg_per_min * 60.0
    } else {
        0.0
    };

    let total_s = timing.selector_positioning_s
        + timing.blow_before_s
        + dosing_s
        + transport_time_s
        + timing.blow_after_s;

    if total_s > 0.0 {
        // 超出 Duration 表示范围 (含 +inf) 时取上限
        Duration::try_from_secs_f64(total_s).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// 整场剩余的实际访问次数 (仅 NORMAL)
pub fn pending_visits_total(feedings: &[CageFeeding]) -> i32 {
    feedings
        .iter()
        .filter(|f| f.mode == CageFeedingMode::Normal)
        .map(CageFeeding::pending_visits)
        .sum()
}
