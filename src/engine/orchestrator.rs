// ==========================================
// 网箱投喂控制系统 - 投喂编排器
// ==========================================
// 职责: 把投喂计划 (网箱 × 轮次) 转换为设备命令序列，
//       每一步持久化进度，响应硬件故障与外部停止/取消
// ==========================================
// 取消协议:
// - 编排器不持有内存取消标志；停止/取消请求直接改写 feeding_session.status
// - 每个网箱结束后、每次轮询时 (含 PAUSE 等待) 重读会话，发现终态立即返回
// - 外部停止后不再向设备发任何命令 (停机由发起停止的请求负责)
// ==========================================
// 红线: 同一投喂线的访问严格串行
// 红线: 硬件故障不重试，整场中断
// ==========================================

mod visit;

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::domain::cage_feeding::CageFeeding;
use crate::domain::feeding_event::{FeedingEvent, FeedingEventKind};
use crate::domain::session::FeedingSession;
use crate::domain::types::SessionStatus;
use crate::device::{DevicePort, VisitCommand};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::FeedingRepositories;
use crate::engine::schedule::{self, VisitStep, VisitTiming};

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

// ==========================================
// FeedingRunPlan - 一次执行的全部输入
// ==========================================
// 由计划用例构造
#[derive(Debug, Clone)]
pub struct FeedingRunPlan {
    pub session: FeedingSession,
    pub cage_feedings: Vec<CageFeeding>,
    pub line_id: String,
    pub slot_by_cage: HashMap<String, i32>,
    pub silo_id: String,
    pub blower_power_pct: f64,
    pub transport_time_by_cage: HashMap<String, f64>,
    pub blow_before_s: f64,
    pub blow_after_s: f64,
    pub selector_positioning_s: f64,
}

impl FeedingRunPlan {
    pub fn timing(&self) -> VisitTiming {
        VisitTiming {
            blower_power_pct: self.blower_power_pct,
            blow_before_s: self.blow_before_s,
            blow_after_s: self.blow_after_s,
            selector_positioning_s: self.selector_positioning_s,
        }
    }

    pub fn transport_time_for(&self, cage_id: &str) -> f64 {
        self.transport_time_by_cage.get(cage_id).copied().unwrap_or(0.0)
    }

    /// 由网箱投喂当前参数 + 固定时序构造访问命令
    pub fn build_command(&self, feeding: &CageFeeding) -> EngineResult<VisitCommand> {
        let slot = self
            .slot_by_cage
            .get(&feeding.cage_id)
            .copied()
            .ok_or_else(|| EngineError::MissingSlot {
                cage_id: feeding.cage_id.clone(),
            })?;

        Ok(VisitCommand {
            slot,
            target_kg: feeding.programmed_kg,
            rate_kg_per_min: feeding.rate_kg_per_min,
            blower_power_pct: self.blower_power_pct,
            transport_time_s: self.transport_time_for(&feeding.cage_id),
            blow_before_s: self.blow_before_s,
            blow_after_s: self.blow_after_s,
            selector_positioning_s: self.selector_positioning_s,
        })
    }
}

// ==========================================
// RunOutcome - 执行结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// 全部轮次完成
    Completed { total_dispensed_kg: f64 },
    /// 硬件故障中断
    Interrupted { error_code: Option<i32> },
    /// 检测到外部停止/取消
    Aborted { observed_status: SessionStatus },
}

/// 单次访问结果
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum VisitOutcome {
    Completed,
    HardwareError { error_code: Option<i32> },
    Aborted { observed_status: SessionStatus },
}

// ==========================================
// OrchestratorSettings - 编排器参数
// ==========================================
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

// ==========================================
// FeedingOrchestrator - 投喂编排器
// ==========================================
pub struct FeedingOrchestrator {
    repos: FeedingRepositories,
    device: Arc<dyn DevicePort>,
    settings: OrchestratorSettings,
}

impl FeedingOrchestrator {
    pub fn new(
        repos: FeedingRepositories,
        device: Arc<dyn DevicePort>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            repos,
            device,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// 执行一次投喂会话直到完成、中断或被外部停止
    ///
    /// # 错误
    /// 仓储/驱动错误会终止执行；返回前尽力向设备发送一次 stop 作为补偿。
    /// 已下发过的 stop 失败 (EngineError::StopFailed) 不再补偿
    #[instrument(skip(self, plan), fields(session_id = %plan.session.session_id, line_id = %plan.line_id))]
    pub async fn run(&self, plan: FeedingRunPlan) -> EngineResult<RunOutcome> {
        let line_id = plan.line_id.clone();

        match self.run_rounds(plan).await {
            Ok(outcome) => {
                info!(?outcome, "投喂会话执行结束");
                Ok(outcome)
            }
            Err(err @ EngineError::StopFailed { .. }) => {
                // 停机已尝试过一次，硬件命令不重试
                error!(error = %err, "停机命令失败，需人工确认设备状态");
                Err(err)
            }
            Err(err) => {
                error!(error = %err, "投喂会话执行失败，发送补偿停机");
                if let Err(stop_err) = self.device.stop(&line_id).await {
                    warn!(error = %stop_err, "补偿停机失败");
                }
                Err(err)
            }
        }
    }

    async fn run_rounds(&self, plan: FeedingRunPlan) -> EngineResult<RunOutcome> {
        let session_id = plan.session.session_id.clone();
        let timing = plan.timing();

        let mut feedings = plan.cage_feedings.clone();
        feedings.sort_by_key(|f| f.execution_order);

        let total_rounds = schedule::total_rounds(&feedings);
        info!(
            total_rounds,
            cage_count = feedings.len(),
            silo_id = %plan.silo_id,
            "开始执行投喂会话"
        );

        for round in 0..total_rounds {
            for idx in 0..feedings.len() {
                let Some(step) = schedule::step_for(&feedings[idx], round) else {
                    continue;
                };

                match step {
                    VisitStep::Wait => {
                        let feeding = &feedings[idx];
                        let wait = schedule::pause_duration(
                            feeding,
                            &timing,
                            plan.transport_time_for(&feeding.cage_id),
                        );
                        info!(
                            cage_id = %feeding.cage_id,
                            round = round + 1,
                            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                            "PAUSE 模式: 等效等待"
                        );
                        if let Some(observed_status) = self.pause_wait(&session_id, wait).await? {
                            info!(%observed_status, round = round + 1, "等效等待中检测到外部停止");
                            return Ok(RunOutcome::Aborted { observed_status });
                        }
                    }
                    VisitStep::Visit => {
                        let pending_total = schedule::pending_visits_total(&feedings);
                        let outcome = self
                            .execute_visit(&plan, &mut feedings[idx], round, pending_total)
                            .await?;

                        match outcome {
                            VisitOutcome::Completed => {}
                            VisitOutcome::HardwareError { error_code } => {
                                return Ok(RunOutcome::Interrupted { error_code });
                            }
                            VisitOutcome::Aborted { observed_status } => {
                                return Ok(RunOutcome::Aborted { observed_status });
                            }
                        }
                    }
                }

                // 检查点: 每个网箱之后
                if let Some(observed_status) = self.check_external_stop(&session_id)? {
                    info!(%observed_status, round = round + 1, "检测到外部停止，放弃执行");
                    return Ok(RunOutcome::Aborted { observed_status });
                }
            }
        }

        if let Some(observed_status) = self.check_external_stop(&session_id)? {
            info!(%observed_status, "完成前检测到外部停止，放弃执行");
            return Ok(RunOutcome::Aborted { observed_status });
        }

        self.complete_session(&plan, &feedings).await
    }

    /// PAUSE 等效等待，按轮询间隔分段并重读会话
    async fn pause_wait(
        &self,
        session_id: &str,
        wait: Duration,
    ) -> EngineResult<Option<SessionStatus>> {
        let deadline = Instant::now().checked_add(wait);
        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::time::sleep(remaining.min(self.settings.poll_interval)).await;

            if let Some(observed_status) = self.check_external_stop(session_id)? {
                return Ok(Some(observed_status));
            }
        }
    }

    /// 重读会话；若已为终态返回其状态
    fn check_external_stop(&self, session_id: &str) -> EngineResult<Option<SessionStatus>> {
        let session = self.load_session(session_id)?;
        Ok(session.is_terminal().then_some(session.status))
    }

    fn load_session(&self, session_id: &str) -> EngineResult<FeedingSession> {
        self.repos
            .session_repo
            .find_by_id(session_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "FeedingSession".to_string(),
                id: session_id.to_string(),
            })
    }

    /// 停机一次；失败包装为 StopFailed
    pub(crate) async fn stop_device(&self, line_id: &str) -> EngineResult<()> {
        self.device
            .stop(line_id)
            .await
            .map_err(|source| EngineError::StopFailed {
                line_id: line_id.to_string(),
                source,
            })
    }

    /// 标记完成: 汇总下料量与时长，写入 session_completed，停机
    async fn complete_session(
        &self,
        plan: &FeedingRunPlan,
        feedings: &[CageFeeding],
    ) -> EngineResult<RunOutcome> {
        let mut session = self.load_session(&plan.session.session_id)?;
        let total_dispensed_kg: f64 = feedings.iter().map(|f| f.dispensed_kg).sum();
        let now = Utc::now().naive_utc();

        if !session.complete(total_dispensed_kg, now) {
            return Ok(RunOutcome::Aborted {
                observed_status: session.status,
            });
        }

        let event = FeedingEvent::new(
            &session.session_id,
            FeedingEventKind::SessionCompleted {
                operator_id: session.operator_id.clone(),
                total_dispensed_kg,
                duration_seconds: session.elapsed_seconds(now),
            },
        );

        if !self.repos.progress_repo.terminate_session(&session, &event)? {
            let observed_status = self.load_session(&session.session_id)?.status;
            return Ok(RunOutcome::Aborted { observed_status });
        }

        self.stop_device(&plan.line_id).await?;

        let remaining_stock = self
            .repos
            .silo_repo
            .find_by_id(&plan.silo_id)?
            .map(|silo| silo.stock_kg);
        info!(
            total_dispensed_kg,
            duration_seconds = session.elapsed_seconds(now),
            ?remaining_stock,
            "投喂会话完成"
        );

        Ok(RunOutcome::Completed { total_dispensed_kg })
    }
}
