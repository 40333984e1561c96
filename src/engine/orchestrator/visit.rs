// ==========================================
// 网箱投喂控制系统 - 单次访问执行
// ==========================================
// 流程:
// 1. 重读速率 (运行中可被人工修改)，构造命令
// 2. start_visit → (首访 IN_PROGRESS) + visit_started，一个事务
// 3. 轮询: sleep → get_status → 重读会话
//    - 会话终态: 直接返回，不再写入
//    - has_error: 会话 INTERRUPTED + session_interrupted，停机一次
//    - COMPLETED: 累计下料 + visit_completed + 料仓扣减，一个事务
// ==========================================

use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{FeedingOrchestrator, FeedingRunPlan, VisitOutcome};
use crate::device::{DeviceStatus, VisitStage};
use crate::domain::cage_feeding::CageFeeding;
use crate::domain::feeding_event::{kg_to_grams, FeedingEvent, FeedingEventKind};
use crate::engine::error::{EngineError, EngineResult};

impl FeedingOrchestrator {
    pub(crate) async fn execute_visit(
        &self,
        plan: &FeedingRunPlan,
        feeding: &mut CageFeeding,
        round: i32,
        pending_total: i32,
    ) -> EngineResult<VisitOutcome> {
        let session_id = plan.session.session_id.clone();
        let visit_number = feeding.completed_visits + 1;
        let cycle_number = round + 1;

        // ===== 1. 重读速率 =====
        let stored = self
            .repos
            .cage_feeding_repo
            .find_by_id(&feeding.cage_feeding_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "CageFeeding".to_string(),
                id: feeding.cage_feeding_id.clone(),
            })?;
        feeding.rate_kg_per_min = stored.rate_kg_per_min;
        let command = plan.build_command(feeding)?;

        // ===== 2. 开始访问 =====
        self.device.start_visit(&plan.line_id, &command).await?;
        feeding.start_visit();

        let started = FeedingEvent::new(
            &session_id,
            FeedingEventKind::VisitStarted {
                cage_id: feeding.cage_id.clone(),
                visit_number,
                cycle_number,
                target_kg: command.target_kg,
                rate_kg_per_min: command.rate_kg_per_min,
            },
        );
        self.repos.progress_repo.record_visit_started(feeding, &started)?;

        info!(
            cage_id = %feeding.cage_id,
            slot = command.slot,
            visit_number,
            cycle_number,
            target_kg = command.target_kg,
            "访问开始"
        );
        let started_at = Instant::now();

        // ===== 3. 轮询 =====
        loop {
            tokio::time::sleep(self.settings.poll_interval).await;
            let status = self.device.get_status(&plan.line_id).await?;

            if let Some(observed_status) = self.check_external_stop(&session_id)? {
                info!(
                    cage_id = %feeding.cage_id,
                    %observed_status,
                    "轮询中检测到外部停止"
                );
                return Ok(VisitOutcome::Aborted { observed_status });
            }

            if status.has_error {
                return self
                    .interrupt_on_hardware_error(plan, feeding, &status, pending_total)
                    .await;
            }

            if status.current_stage == VisitStage::Completed {
                self.finish_visit(
                    feeding,
                    &status,
                    visit_number,
                    cycle_number,
                    started_at.elapsed().as_secs_f64(),
                )?;
                return Ok(VisitOutcome::Completed);
            }

            debug!(
                cage_id = %feeding.cage_id,
                stage = %status.current_stage,
                dispensed_kg = status.dispensed_kg,
                paused = status.is_paused,
                "访问进行中"
            );
        }
    }

    /// 访问完成: 累计进度、记录事件、扣减库存
    fn finish_visit(
        &self,
        feeding: &mut CageFeeding,
        status: &DeviceStatus,
        visit_number: i32,
        cycle_number: i32,
        duration_seconds: f64,
    ) -> EngineResult<()> {
        let dispensed_kg = status.dispensed_kg.max(0.0);
        feeding.record_visit(dispensed_kg);

        let completed = FeedingEvent::new(
            &feeding.session_id,
            FeedingEventKind::VisitCompleted {
                cage_id: feeding.cage_id.clone(),
                visit_number,
                cycle_number,
                dispensed_grams: kg_to_grams(dispensed_kg),
                duration_seconds,
            },
        );
        let remaining_stock =
            self.repos
                .progress_repo
                .record_visit_completed(feeding, &completed, dispensed_kg)?;

        info!(
            cage_id = %feeding.cage_id,
            visit_number,
            dispensed_kg,
            completed_visits = feeding.completed_visits,
            programmed_visits = feeding.programmed_visits,
            remaining_stock,
            "访问完成"
        );
        if remaining_stock < 0.0 {
            warn!(silo_id = %feeding.silo_id, remaining_stock, "料仓账面库存为负");
        }
        Ok(())
    }

    /// 硬件故障: 会话中断、记录事件、停机一次
    async fn interrupt_on_hardware_error(
        &self,
        plan: &FeedingRunPlan,
        feeding: &CageFeeding,
        status: &DeviceStatus,
        pending_total: i32,
    ) -> EngineResult<VisitOutcome> {
        let mut session = self.load_session(&plan.session.session_id)?;
        let now = Utc::now().naive_utc();

        if !session.interrupt(now) {
            return Ok(VisitOutcome::Aborted {
                observed_status: session.status,
            });
        }

        let event = FeedingEvent::new(
            &session.session_id,
            FeedingEventKind::SessionInterrupted {
                reason: "hardware_error".to_string(),
                error_code: status.error_code,
                cage_id: Some(feeding.cage_id.clone()),
                cage_pending_visits: feeding.pending_visits(),
                pending_visits: pending_total,
            },
        );

        if !self.repos.progress_repo.terminate_session(&session, &event)? {
            let observed_status = self.load_session(&session.session_id)?.status;
            return Ok(VisitOutcome::Aborted { observed_status });
        }

        warn!(
            cage_id = %feeding.cage_id,
            error_code = ?status.error_code,
            cage_pending_visits = feeding.pending_visits(),
            pending_visits = pending_total,
            "硬件故障，会话中断"
        );

        self.stop_device(&plan.line_id).await?;
        Ok(VisitOutcome::HardwareError {
            error_code: status.error_code,
        })
    }
}
