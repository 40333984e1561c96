// ==========================================
// 网箱投喂控制系统 - 投喂 API
// ==========================================
// 职责: 启动投喂 (计划用例)、停止/取消、暂停/恢复、
//       运行中改速率、进度查询、事件追溯、手动设备控制
// 红线: 前置条件全部通过才持久化会话并启动编排器
// 红线: 停止/取消对终态会话是空操作
// ==========================================

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{validate_rate, FeedingPlanValidator};
use crate::config::FeedingConfigReader;
use crate::device::{DevicePort, DeviceStatus, VisitStage};
use crate::domain::cage_feeding::CageFeeding;
use crate::domain::feeding_event::{FeedingEvent, FeedingEventKind};
use crate::domain::session::FeedingSession;
use crate::domain::types::{CageFeedingMode, FeedingType, SessionStatus};
use crate::engine::schedule::pending_visits_total;
use crate::engine::{EngineResult, FeedingOrchestrator, FeedingRepositories, FeedingRunPlan, RunOutcome};
use crate::repository::RepositoryError;

// ==========================================
// 请求 / 响应 DTO
// ==========================================

/// 单个网箱的投喂计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CagePlanRequest {
    pub cage_id: String,
    pub kg_per_visit: f64,
    pub visits: i32,
    pub rate_kg_per_min: f64,
    pub mode: CageFeedingMode,
}

/// 启动投喂请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartFeedingRequest {
    pub line_id: String,
    pub doser_id: String,
    pub feeding_type: FeedingType,
    pub operator_id: String,
    pub allow_overtime: bool,
    pub cages: Vec<CagePlanRequest>,
}

/// 已启动的投喂 (会话ID + 后台执行任务)
#[derive(Debug)]
pub struct StartedFeeding {
    pub session_id: String,
    pub task: JoinHandle<EngineResult<RunOutcome>>,
}

/// 投喂进度
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedingProgress {
    pub session: FeedingSession,
    pub current_cage_feeding: Option<CageFeeding>,
    pub device_status: DeviceStatus,
    pub dispensed_kg: f64,        // 已持久化的下料量
    pub live_dispensed_kg: f64,   // 进行中访问的设备自报量
    pub completion_pct: f64,      // 0..=100
    pub completed_visits: i32,
    pub programmed_visits: i32,
}

/// 手动设备命令 (仅投喂线空闲时允许)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ManualDeviceCommand {
    Blower { power_pct: f64, on: bool },
    Doser { doser_id: String, rate_kg_per_min: f64, on: bool },
    Selector { slot: i32 },
}

/// 操作员终止方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorTermination {
    Stop,
    Cancel,
}

// ==========================================
// FeedingApi - 投喂 API
// ==========================================
pub struct FeedingApi {
    repos: FeedingRepositories,
    validator: FeedingPlanValidator,
    orchestrator: Arc<FeedingOrchestrator>,
    device: Arc<dyn DevicePort>,
    config: Arc<dyn FeedingConfigReader>,
}

impl FeedingApi {
    pub fn new(
        repos: FeedingRepositories,
        orchestrator: Arc<FeedingOrchestrator>,
        device: Arc<dyn DevicePort>,
        config: Arc<dyn FeedingConfigReader>,
    ) -> Self {
        let validator = FeedingPlanValidator::new(
            repos.layout_repo.clone(),
            repos.silo_repo.clone(),
            repos.session_repo.clone(),
        );
        Self {
            repos,
            validator,
            orchestrator,
            device,
            config,
        }
    }

    // ==========================================
    // 启动
    // ==========================================

    /// 启动投喂
    ///
    /// # 流程
    /// 1. 前置条件校验 (失败不创建会话)
    /// 2. 按槽位排序生成网箱投喂，校验库存
    /// 3. 会话 + 网箱投喂 + session_started 一个事务写入
    /// 4. 后台启动编排器
    ///
    /// # 返回
    /// - 会话ID 与编排器任务句柄
    #[instrument(skip(self, request), fields(line_id = %request.line_id, operator_id = %request.operator_id))]
    pub async fn start_feeding(&self, request: StartFeedingRequest) -> ApiResult<StartedFeeding> {
        let validated = self.validator.validate_start(&request)?;
        let default_transport_s = self.config.get_default_transport_time_s().await?;

        let session_id = Uuid::new_v4().to_string();
        let feedings: Vec<CageFeeding> = validated
            .cages
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                CageFeeding::new(
                    Uuid::new_v4().to_string(),
                    session_id.clone(),
                    c.cage.cage_id.clone(),
                    validated.doser.doser_id.clone(),
                    validated.silo.silo_id.clone(),
                    idx as i32 + 1,
                    c.request.kg_per_visit,
                    c.request.visits,
                    c.request.rate_kg_per_min,
                    c.request.mode,
                )
            })
            .collect();

        self.validator.validate_stock(&validated.silo, &feedings)?;

        let total_programmed_kg: f64 = feedings.iter().map(CageFeeding::planned_total_kg).sum();
        let session = FeedingSession::new(
            session_id.clone(),
            validated.line.line_id.clone(),
            request.feeding_type,
            request.operator_id.clone(),
            total_programmed_kg,
            request.allow_overtime,
            Utc::now().naive_utc(),
        );
        let started = FeedingEvent::new(
            &session_id,
            FeedingEventKind::SessionStarted {
                operator_id: request.operator_id.clone(),
                total_programmed_kg,
                cage_count: feedings.len(),
            },
        );

        match self
            .repos
            .progress_repo
            .create_session(&session, &feedings, &started)
        {
            Ok(()) => {}
            Err(err @ RepositoryError::UniqueConstraintViolation(_)) => {
                // 并发启动: 另一请求已抢先创建 ACTIVE 会话
                self.validator.ensure_line_idle(&request.line_id)?;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        }

        let slot_by_cage: HashMap<String, i32> = validated
            .cages
            .iter()
            .map(|c| (c.cage.cage_id.clone(), c.slot))
            .collect();
        let transport_time_by_cage: HashMap<String, f64> = validated
            .cages
            .iter()
            .map(|c| {
                (
                    c.cage.cage_id.clone(),
                    c.cage.transport_time_s.unwrap_or(default_transport_s),
                )
            })
            .collect();

        let plan = FeedingRunPlan {
            session,
            cage_feedings: feedings,
            line_id: validated.line.line_id.clone(),
            slot_by_cage,
            silo_id: validated.silo.silo_id.clone(),
            blower_power_pct: validated.line.blower_power_pct,
            transport_time_by_cage,
            blow_before_s: validated.line.blow_before_s,
            blow_after_s: validated.line.blow_after_s,
            selector_positioning_s: validated.line.selector_positioning_s,
        };

        info!(
            %session_id,
            total_programmed_kg,
            cage_count = plan.cage_feedings.len(),
            "投喂会话已创建，启动编排器"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let task = tokio::spawn(async move { orchestrator.run(plan).await });

        Ok(StartedFeeding { session_id, task })
    }

    // ==========================================
    // 停止 / 取消
    // ==========================================

    /// 停止投喂: 会话 INTERRUPTED + session_interrupted，设备停机
    ///
    /// 终态会话直接返回当前状态，不写入
    pub async fn stop_feeding(&self, session_id: &str, operator_id: &str) -> ApiResult<SessionStatus> {
        self.terminate_by_operator(session_id, operator_id, OperatorTermination::Stop)
            .await
    }

    /// 取消投喂: 会话 CANCELLED + session_cancelled，设备停机
    pub async fn cancel_feeding(
        &self,
        session_id: &str,
        operator_id: &str,
    ) -> ApiResult<SessionStatus> {
        self.terminate_by_operator(session_id, operator_id, OperatorTermination::Cancel)
            .await
    }

    async fn terminate_by_operator(
        &self,
        session_id: &str,
        operator_id: &str,
        termination: OperatorTermination,
    ) -> ApiResult<SessionStatus> {
        let mut session = self.load_session(session_id)?;
        if session.is_terminal() {
            info!(session_id, status = %session.status, ?termination, "会话已结束，忽略请求");
            return Ok(session.status);
        }

        let feedings = self.repos.cage_feeding_repo.find_by_session(session_id)?;
        let pending_visits = pending_visits_total(&feedings);
        let now = Utc::now().naive_utc();

        let kind = match termination {
            OperatorTermination::Stop => {
                session.interrupt(now);
                let current = self
                    .repos
                    .cage_feeding_repo
                    .find_current_by_session(session_id)?;
                FeedingEventKind::SessionInterrupted {
                    reason: "operator_stop".to_string(),
                    error_code: None,
                    cage_id: current.as_ref().map(|f| f.cage_id.clone()),
                    cage_pending_visits: current
                        .as_ref()
                        .map(CageFeeding::pending_visits)
                        .unwrap_or(0),
                    pending_visits,
                }
            }
            OperatorTermination::Cancel => {
                session.cancel(now);
                FeedingEventKind::SessionCancelled {
                    operator_id: operator_id.to_string(),
                    pending_visits,
                }
            }
        };
        let event = FeedingEvent::new(session_id, kind);

        if !self.repos.progress_repo.terminate_session(&session, &event)? {
            let current = self.load_session(session_id)?;
            info!(session_id, status = %current.status, "会话已被并发终结，忽略请求");
            return Ok(current.status);
        }

        self.device.stop(&session.line_id).await?;
        info!(
            session_id,
            operator_id,
            status = %session.status,
            pending_visits,
            "操作员终止投喂会话"
        );
        Ok(session.status)
    }

    // ==========================================
    // 暂停 / 恢复
    // ==========================================

    /// 暂停设备 (会话保持 ACTIVE，编排器继续轮询)
    pub async fn pause_feeding(&self, session_id: &str, operator_id: &str) -> ApiResult<()> {
        let session = self.load_active_session(session_id, "PAUSED")?;
        self.device.pause(&session.line_id).await?;
        self.repos.progress_repo.append_event(&FeedingEvent::new(
            session_id,
            FeedingEventKind::SessionPaused {
                operator_id: operator_id.to_string(),
            },
        ))?;
        info!(session_id, operator_id, "投喂暂停");
        Ok(())
    }

    /// 恢复设备
    pub async fn resume_feeding(&self, session_id: &str, operator_id: &str) -> ApiResult<()> {
        let session = self.load_active_session(session_id, "RESUMED")?;
        self.device.resume(&session.line_id).await?;
        self.repos.progress_repo.append_event(&FeedingEvent::new(
            session_id,
            FeedingEventKind::SessionResumed {
                operator_id: operator_id.to_string(),
            },
        ))?;
        info!(session_id, operator_id, "投喂恢复");
        Ok(())
    }

    // ==========================================
    // 运行中修改
    // ==========================================

    /// 修改网箱下料速率 (下一次访问生效)
    pub fn update_feeding_rate(
        &self,
        cage_feeding_id: &str,
        rate_kg_per_min: f64,
    ) -> ApiResult<CageFeeding> {
        let mut feeding = self
            .repos
            .cage_feeding_repo
            .find_by_id(cage_feeding_id)?
            .ok_or_else(|| ApiError::NotFound(format!("网箱投喂(id={})不存在", cage_feeding_id)))?;

        let session = self.load_session(&feeding.session_id)?;
        if session.is_terminal() {
            return Err(ApiError::InvalidStateTransition {
                from: session.status.to_string(),
                to: "RATE_CHANGED".to_string(),
            });
        }

        let doser = self
            .repos
            .layout_repo
            .find_doser(&feeding.doser_id)?
            .ok_or_else(|| ApiError::NotFound(format!("下料器(id={})不存在", feeding.doser_id)))?;
        validate_rate(&feeding.cage_id, rate_kg_per_min, &doser)?;

        let old_rate = feeding.rate_kg_per_min;
        let event = FeedingEvent::new(
            &feeding.session_id,
            FeedingEventKind::FeedingRateChanged {
                cage_id: feeding.cage_id.clone(),
                old_rate_kg_per_min: old_rate,
                new_rate_kg_per_min: rate_kg_per_min,
            },
        );
        self.repos
            .progress_repo
            .change_rate(cage_feeding_id, rate_kg_per_min, &event)?;

        info!(
            session_id = %feeding.session_id,
            cage_id = %feeding.cage_id,
            old_rate,
            new_rate = rate_kg_per_min,
            "下料速率已修改"
        );
        feeding.rate_kg_per_min = rate_kg_per_min;
        Ok(feeding)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询投喂线当前进度 (只读)
    ///
    /// # 返回
    /// - Ok(None): 投喂线没有 ACTIVE 会话
    pub async fn get_feeding_progress(&self, line_id: &str) -> ApiResult<Option<FeedingProgress>> {
        let Some(session) = self.repos.session_repo.find_active_by_line(line_id)? else {
            return Ok(None);
        };

        let feedings = self
            .repos
            .cage_feeding_repo
            .find_by_session(&session.session_id)?;
        let current = self
            .repos
            .cage_feeding_repo
            .find_current_by_session(&session.session_id)?;
        let device_status = self.device.peek_status(line_id).await?;

        let dispensed_kg: f64 = feedings.iter().map(|f| f.dispensed_kg).sum();
        let live_dispensed_kg = if current.is_some() {
            live_visit_kg(&device_status)
        } else {
            0.0
        };
        let completed_visits: i32 = feedings.iter().map(|f| f.completed_visits).sum();
        let programmed_visits: i32 = feedings
            .iter()
            .filter(|f| f.mode == CageFeedingMode::Normal)
            .map(|f| f.programmed_visits)
            .sum();

        Ok(Some(FeedingProgress {
            completion_pct: completion_percentage(
                dispensed_kg + live_dispensed_kg,
                session.total_programmed_kg,
            ),
            session,
            current_cage_feeding: current,
            device_status,
            dispensed_kg,
            live_dispensed_kg,
            completed_visits,
            programmed_visits,
        }))
    }

    pub fn get_session(&self, session_id: &str) -> ApiResult<FeedingSession> {
        self.load_session(session_id)
    }

    pub fn list_sessions_by_line(&self, line_id: &str) -> ApiResult<Vec<FeedingSession>> {
        Ok(self.repos.session_repo.list_by_line(line_id)?)
    }

    pub fn list_cage_feedings(&self, session_id: &str) -> ApiResult<Vec<CageFeeding>> {
        Ok(self.repos.cage_feeding_repo.find_by_session(session_id)?)
    }

    /// 会话事件 (按发生时间升序)
    pub fn list_session_events(&self, session_id: &str) -> ApiResult<Vec<FeedingEvent>> {
        Ok(self.repos.event_repo.find_by_session(session_id)?)
    }

    // ==========================================
    // 手动设备控制
    // ==========================================

    /// 手动控制风机/下料器/选择器
    ///
    /// # 红线
    /// - 投喂线有 ACTIVE 会话时拒绝，避免与编排器争抢设备
    pub async fn manual_control(&self, line_id: &str, command: ManualDeviceCommand) -> ApiResult<()> {
        self.repos
            .layout_repo
            .find_line(line_id)?
            .ok_or_else(|| ApiError::NotFound(format!("投喂线(id={})不存在", line_id)))?;
        self.validator.ensure_line_idle(line_id)?;

        match &command {
            ManualDeviceCommand::Blower { power_pct, on } => {
                if !(0.0..=100.0).contains(power_pct) {
                    return Err(ApiError::InvalidInput(format!(
                        "风机功率必须在 0~100 之间: {}",
                        power_pct
                    )));
                }
                self.device.set_blower(line_id, *power_pct, *on).await?;
            }
            ManualDeviceCommand::Doser {
                doser_id,
                rate_kg_per_min,
                on,
            } => {
                let doser = self
                    .repos
                    .layout_repo
                    .find_doser(doser_id)?
                    .ok_or_else(|| ApiError::NotFound(format!("下料器(id={})不存在", doser_id)))?;
                if doser.line_id != line_id {
                    return Err(ApiError::InvalidInput(format!(
                        "下料器{}不属于投喂线{}",
                        doser_id, line_id
                    )));
                }
                if *on {
                    validate_rate(doser_id, *rate_kg_per_min, &doser)?;
                }
                self.device
                    .set_doser(line_id, doser_id, *rate_kg_per_min, *on)
                    .await?;
            }
            ManualDeviceCommand::Selector { slot } => {
                if *slot < 1 {
                    return Err(ApiError::InvalidInput(format!("槽位号必须 ≥ 1: {}", slot)));
                }
                self.device.set_selector(line_id, *slot).await?;
            }
        }

        info!(line_id, ?command, "手动设备命令已下发");
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load_session(&self, session_id: &str) -> ApiResult<FeedingSession> {
        self.repos
            .session_repo
            .find_by_id(session_id)?
            .ok_or_else(|| ApiError::NotFound(format!("投喂会话(id={})不存在", session_id)))
    }

    fn load_active_session(&self, session_id: &str, requested: &str) -> ApiResult<FeedingSession> {
        let session = self.load_session(session_id)?;
        if session.status != SessionStatus::Active {
            warn!(session_id, status = %session.status, requested, "会话非 ACTIVE，拒绝操作");
            return Err(ApiError::InvalidStateTransition {
                from: session.status.to_string(),
                to: requested.to_string(),
            });
        }
        Ok(session)
    }
}

/// 设备自报的进行中访问下料量 (完成阶段已由编排器持久化，不重复计入)
fn live_visit_kg(status: &DeviceStatus) -> f64 {
    match status.current_stage {
        VisitStage::Idle | VisitStage::Completed => 0.0,
        _ => status.dispensed_kg.max(0.0),
    }
}

/// 完成百分比，限制在 0~100
pub fn completion_percentage(dispensed_kg: f64, total_programmed_kg: f64) -> f64 {
    if total_programmed_kg <= 0.0 {
        return 0.0;
    }
    (dispensed_kg / total_programmed_kg * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_percentage_is_clamped() {
        assert_eq!(completion_percentage(5.0, 10.0), 50.0);
        assert_eq!(completion_percentage(12.0, 10.0), 100.0);
        assert_eq!(completion_percentage(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_live_kg_ignores_completed_stage() {
        let mut status = DeviceStatus::idle();
        status.dispensed_kg = 1.5;
        status.current_stage = VisitStage::Dosing;
        assert_eq!(live_visit_kg(&status), 1.5);

        status.current_stage = VisitStage::Completed;
        assert_eq!(live_visit_kg(&status), 0.0);
    }

    #[test]
    fn test_manual_command_serde_tag() {
        let cmd = ManualDeviceCommand::Selector { slot: 3 };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["command"], "selector");
        assert_eq!(value["slot"], 3);
    }
}
