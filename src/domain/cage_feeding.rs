// ==========================================
// 网箱投喂控制系统 - 网箱投喂领域模型
// ==========================================
// 红线: completed_visits ≤ programmed_visits
// 红线: dispensed_kg 单调递增
// 红线: FASTING 模式 programmed_visits 恒为 0
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::types::{CageFeedingMode, CageFeedingStatus};

// ==========================================
// CageFeeding - 单网箱投喂计划与进度
// ==========================================
// 对齐: cage_feeding 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CageFeeding {
    pub cage_feeding_id: String,
    pub session_id: String,
    pub cage_id: String,
    pub doser_id: String,
    pub silo_id: String,
    pub execution_order: i32,      // 升序 = 物理访问顺序 (由槽位推导)

    // ===== 计划 =====
    pub programmed_kg: f64,        // 每次访问的计划量
    pub programmed_visits: i32,
    pub rate_kg_per_min: f64,
    pub mode: CageFeedingMode,

    // ===== 进度 =====
    pub dispensed_kg: f64,
    pub completed_visits: i32,
    pub status: CageFeedingStatus,
}

impl CageFeeding {
    /// 创建 PENDING 状态的网箱投喂
    ///
    /// FASTING 模式会把 programmed_visits 归零
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cage_feeding_id: String,
        session_id: String,
        cage_id: String,
        doser_id: String,
        silo_id: String,
        execution_order: i32,
        programmed_kg: f64,
        programmed_visits: i32,
        rate_kg_per_min: f64,
        mode: CageFeedingMode,
    ) -> Self {
        let programmed_visits = match mode {
            CageFeedingMode::Fasting => 0,
            _ => programmed_visits.max(0),
        };

        Self {
            cage_feeding_id,
            session_id,
            cage_id,
            doser_id,
            silo_id,
            execution_order,
            programmed_kg,
            programmed_visits,
            rate_kg_per_min,
            mode,
            dispensed_kg: 0.0,
            completed_visits: 0,
            status: CageFeedingStatus::Pending,
        }
    }

    /// 剩余未完成访问次数
    pub fn pending_visits(&self) -> i32 {
        (self.programmed_visits - self.completed_visits).max(0)
    }

    /// 计划总下料量 (仅 NORMAL 模式实际下料)
    pub fn planned_total_kg(&self) -> f64 {
        match self.mode {
            CageFeedingMode::Normal => self.programmed_kg * f64::from(self.programmed_visits),
            CageFeedingMode::Pause | CageFeedingMode::Fasting => 0.0,
        }
    }

    /// 首访: PENDING → IN_PROGRESS
    ///
    /// 返回是否发生了状态迁移
    pub fn start_visit(&mut self) -> bool {
        if self.status == CageFeedingStatus::Pending {
            self.status = CageFeedingStatus::InProgress;
            return true;
        }
        false
    }

    /// 记录一次完成的访问
    ///
    /// 已达到计划次数时不再累计，返回 false
    pub fn record_visit(&mut self, dispensed_kg: f64) -> bool {
        if self.completed_visits >= self.programmed_visits {
            return false;
        }

        self.dispensed_kg += dispensed_kg.max(0.0);
        self.completed_visits += 1;
        if self.completed_visits == self.programmed_visits {
            self.status = CageFeedingStatus::Completed;
        } else {
            self.status = CageFeedingStatus::InProgress;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_feeding(mode: CageFeedingMode, visits: i32) -> CageFeeding {
        CageFeeding::new(
            "CF1".to_string(),
            "S1".to_string(),
            "C1".to_string(),
            "D1".to_string(),
            "SILO1".to_string(),
            1,
            2.0,
            visits,
            10.0,
            mode,
        )
    }

    #[test]
    fn test_fasting_has_no_visits() {
        let feeding = make_feeding(CageFeedingMode::Fasting, 5);
        assert_eq!(feeding.programmed_visits, 0);
        assert_eq!(feeding.planned_total_kg(), 0.0);
        assert_eq!(feeding.pending_visits(), 0);
    }

    #[test]
    fn test_visit_lifecycle() {
        let mut feeding = make_feeding(CageFeedingMode::Normal, 2);
        assert_eq!(feeding.planned_total_kg(), 4.0);

        assert!(feeding.start_visit());
        assert!(!feeding.start_visit());
        assert_eq!(feeding.status, CageFeedingStatus::InProgress);

        assert!(feeding.record_visit(2.1));
        assert_eq!(feeding.status, CageFeedingStatus::InProgress);
        assert_eq!(feeding.pending_visits(), 1);

        assert!(feeding.record_visit(1.9));
        assert_eq!(feeding.status, CageFeedingStatus::Completed);
        assert!((feeding.dispensed_kg - 4.0).abs() < 1e-9);

        // 超出计划次数不再累计
        assert!(!feeding.record_visit(5.0));
        assert_eq!(feeding.completed_visits, 2);
        assert!((feeding.dispensed_kg - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_mode_plans_nothing() {
        let feeding = make_feeding(CageFeedingMode::Pause, 3);
        assert_eq!(feeding.programmed_visits, 3);
        assert_eq!(feeding.planned_total_kg(), 0.0);
    }
}
