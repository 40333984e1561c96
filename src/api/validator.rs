// ==========================================
// 网箱投喂控制系统 - 投喂计划前置条件校验器
// ==========================================
// 职责: 启动投喂前的同步校验，失败时不创建会话、不下发设备命令
// 校验项:
// - 投喂线存在，且无 ACTIVE 会话
// - 下料器属于该投喂线，料仓存在
// - 每个网箱挂接在该投喂线并已分配槽位
// - NORMAL/PAUSE: 访问次数 ≥ 1，单次量 > 0，0 < 速率 ≤ 下料器能力
// - 料仓库存覆盖 NORMAL 计划总量
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::feeding_api::{CagePlanRequest, StartFeedingRequest};
use crate::domain::cage_feeding::CageFeeding;
use crate::domain::layout::{Cage, Doser, FeedingLine, Silo};
use crate::domain::types::CageFeedingMode;
use crate::engine::stock::{check_silo_stock, required_stock_kg};
use crate::repository::{FeedingSessionRepository, LayoutRepository, SiloRepository};

// ==========================================
// ValidatedPlan - 校验通过的计划
// ==========================================

/// 单个网箱的校验结果
#[derive(Debug, Clone)]
pub struct ValidatedCage {
    pub request: CagePlanRequest,
    pub cage: Cage,
    pub slot: i32,
}

/// 校验通过的投喂计划 (网箱已按槽位升序排列)
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub line: FeedingLine,
    pub doser: Doser,
    pub silo: Silo,
    pub cages: Vec<ValidatedCage>,
}

// ==========================================
// FeedingPlanValidator - 前置条件校验器
// ==========================================
pub struct FeedingPlanValidator {
    layout_repo: Arc<LayoutRepository>,
    silo_repo: Arc<SiloRepository>,
    session_repo: Arc<FeedingSessionRepository>,
}

impl FeedingPlanValidator {
    pub fn new(
        layout_repo: Arc<LayoutRepository>,
        silo_repo: Arc<SiloRepository>,
        session_repo: Arc<FeedingSessionRepository>,
    ) -> Self {
        Self {
            layout_repo,
            silo_repo,
            session_repo,
        }
    }

    /// 校验启动请求 (不含库存，库存由 validate_stock 在生成网箱投喂后校验)
    pub fn validate_start(&self, request: &StartFeedingRequest) -> ApiResult<ValidatedPlan> {
        if request.line_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("投喂线ID不能为空".to_string()));
        }
        if request.operator_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作员ID不能为空".to_string()));
        }
        if request.cages.is_empty() {
            return Err(ApiError::InvalidInput("投喂计划至少包含一个网箱".to_string()));
        }

        let line = self
            .layout_repo
            .find_line(&request.line_id)?
            .ok_or_else(|| ApiError::NotFound(format!("投喂线(id={})不存在", request.line_id)))?;

        self.ensure_line_idle(&request.line_id)?;

        let doser = self
            .layout_repo
            .find_doser(&request.doser_id)?
            .ok_or_else(|| ApiError::NotFound(format!("下料器(id={})不存在", request.doser_id)))?;
        if doser.line_id != line.line_id {
            return Err(ApiError::InvalidInput(format!(
                "下料器{}不属于投喂线{}",
                doser.doser_id, line.line_id
            )));
        }

        let silo = self
            .silo_repo
            .find_by_id(&doser.silo_id)?
            .ok_or_else(|| ApiError::NotFound(format!("料仓(id={})不存在", doser.silo_id)))?;

        let mut seen = HashSet::new();
        let mut cages = Vec::with_capacity(request.cages.len());
        for cage_request in &request.cages {
            if !seen.insert(cage_request.cage_id.as_str()) {
                return Err(ApiError::InvalidInput(format!(
                    "网箱重复: {}",
                    cage_request.cage_id
                )));
            }

            let cage = self
                .layout_repo
                .find_cage(&cage_request.cage_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("网箱(id={})不存在", cage_request.cage_id))
                })?;

            let slot = match (cage.line_id.as_deref(), cage.slot_number) {
                (Some(line_id), Some(slot)) if line_id == line.line_id => slot,
                _ => {
                    return Err(ApiError::CageNotOnLine {
                        cage_id: cage.cage_id.clone(),
                        line_id: line.line_id.clone(),
                    })
                }
            };

            validate_cage_plan(cage_request, &doser)?;

            cages.push(ValidatedCage {
                request: cage_request.clone(),
                cage,
                slot,
            });
        }

        // 物理访问顺序 = 槽位升序
        cages.sort_by_key(|c| c.slot);

        Ok(ValidatedPlan {
            line,
            doser,
            silo,
            cages,
        })
    }

    /// 投喂线不得已有 ACTIVE 会话
    pub fn ensure_line_idle(&self, line_id: &str) -> ApiResult<()> {
        if let Some(active) = self.session_repo.find_active_by_line(line_id)? {
            return Err(ApiError::ActiveSessionExists {
                line_id: line_id.to_string(),
                session_id: active.session_id,
            });
        }
        Ok(())
    }

    /// 料仓库存必须覆盖 NORMAL 计划总量
    pub fn validate_stock(&self, silo: &Silo, feedings: &[CageFeeding]) -> ApiResult<()> {
        check_silo_stock(silo, required_stock_kg(feedings))?;
        Ok(())
    }
}

/// 单网箱计划校验 (FASTING 不受约束)
fn validate_cage_plan(request: &CagePlanRequest, doser: &Doser) -> ApiResult<()> {
    if request.mode == CageFeedingMode::Fasting {
        return Ok(());
    }

    if request.visits < 1 {
        return Err(ApiError::InvalidInput(format!(
            "网箱{}访问次数必须 ≥ 1: {}",
            request.cage_id, request.visits
        )));
    }
    if !request.kg_per_visit.is_finite() || request.kg_per_visit <= 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "网箱{}单次投喂量必须 > 0: {}",
            request.cage_id, request.kg_per_visit
        )));
    }
    validate_rate(&request.cage_id, request.rate_kg_per_min, doser)
}

/// 下料速率: 0 < rate ≤ 下料器最大能力
pub fn validate_rate(cage_id: &str, rate_kg_per_min: f64, doser: &Doser) -> ApiResult<()> {
    if !rate_kg_per_min.is_finite() || rate_kg_per_min <= 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "网箱{}下料速率必须 > 0: {}",
            cage_id, rate_kg_per_min
        )));
    }
    if rate_kg_per_min > doser.max_rate_kg_per_min {
        return Err(ApiError::RateExceedsCapacity {
            cage_id: cage_id.to_string(),
            rate_kg_per_min,
            max_rate_kg_per_min: doser.max_rate_kg_per_min,
        });
    }
    Ok(())
}
