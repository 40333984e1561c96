// ==========================================
// 网箱投喂控制系统 - 设备模拟器
// ==========================================
// 职责: 进程内模拟投喂线控制器，按轮询推进访问阶段
// 用途: 无 PLC 环境下的联调、集成测试
// 特性: 确定性推进、故障注入、命令记录
// ==========================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::device::port::{
    DeviceError, DevicePort, DeviceResult, DeviceStatus, VisitCommand, VisitStage,
};

// ==========================================
// SimulatorSettings - 模拟器参数
// ==========================================
#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    /// 一次访问从开始到 COMPLETED 所需的轮询次数 (≥1)
    pub polls_per_visit: u32,
    /// 实际下料量 = 目标量 × 系数 (>1 表示超量下料)
    pub dispense_factor: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            polls_per_visit: 3,
            dispense_factor: 1.0,
        }
    }
}

// ==========================================
// FaultInjection - 故障注入点
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaultInjection {
    visit_no: u32, // 第几次访问 (1起，按该投喂线累计)
    poll_no: u32,  // 该访问内第几次轮询 (1起)
    error_code: i32,
}

// ==========================================
// LineSnapshot - 单投喂线的命令记录
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LineSnapshot {
    pub commands: Vec<VisitCommand>,
    pub status_polls: u32,
    pub stop_count: u32,
    pub pause_count: u32,
    pub resume_count: u32,
    pub manual_commands: Vec<String>,
}

#[derive(Debug, Default)]
struct LineState {
    current: Option<VisitCommand>,
    visit_no: u32,
    polls_in_visit: u32,
    paused: bool,
    error_code: Option<i32>,
    dispense_factor: Option<f64>,
    faults: Vec<FaultInjection>,
    log: LineSnapshot,
}

// ==========================================
// SimulatedDevice - 模拟设备
// ==========================================
pub struct SimulatedDevice {
    settings: SimulatorSettings,
    lines: Mutex<HashMap<String, LineState>>,
}

impl SimulatedDevice {
    pub fn new(settings: SimulatorSettings) -> Self {
        Self {
            settings: SimulatorSettings {
                polls_per_visit: settings.polls_per_visit.max(1),
                ..settings
            },
            lines: Mutex::new(HashMap::new()),
        }
    }

    /// 创建并注册多条投喂线
    pub fn with_lines(settings: SimulatorSettings, line_ids: &[&str]) -> Self {
        let device = Self::new(settings);
        for line_id in line_ids {
            device.register_line(line_id);
        }
        device
    }

    /// 注册投喂线 (重复注册无副作用)
    pub fn register_line(&self, line_id: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.entry(line_id.to_string()).or_default();
        }
    }

    /// 在指定访问的指定轮询注入硬件故障
    pub fn fail_at(&self, line_id: &str, visit_no: u32, poll_no: u32, error_code: i32) {
        if let Ok(mut lines) = self.lines.lock() {
            lines
                .entry(line_id.to_string())
                .or_default()
                .faults
                .push(FaultInjection {
                    visit_no,
                    poll_no,
                    error_code,
                });
        }
    }

    /// 覆盖单条投喂线的下料系数
    pub fn set_dispense_factor(&self, line_id: &str, factor: f64) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.entry(line_id.to_string()).or_default().dispense_factor = Some(factor);
        }
    }

    /// 读取命令记录
    pub fn snapshot(&self, line_id: &str) -> Option<LineSnapshot> {
        let lines = self.lines.lock().ok()?;
        lines.get(line_id).map(|state| state.log.clone())
    }

    fn lock_lines(&self) -> DeviceResult<MutexGuard<'_, HashMap<String, LineState>>> {
        self.lines.lock().map_err(|e| DeviceError::Communication {
            line_id: "*".to_string(),
            message: format!("模拟器状态锁获取失败: {}", e),
        })
    }

    fn with_line<T>(
        &self,
        line_id: &str,
        f: impl FnOnce(&mut LineState) -> DeviceResult<T>,
    ) -> DeviceResult<T> {
        let mut lines = self.lock_lines()?;
        let state = lines
            .get_mut(line_id)
            .ok_or_else(|| DeviceError::UnknownLine(line_id.to_string()))?;
        f(state)
    }

    /// 读取状态；advance=true 时计为一次轮询并推进访问
    fn read_status(&self, line_id: &str, advance: bool) -> DeviceResult<DeviceStatus> {
        let default_factor = self.settings.dispense_factor;
        let polls_per_visit = self.settings.polls_per_visit;

        let (command, polls, paused, error_code, factor) = self.with_line(line_id, |state| {
            if advance {
                state.log.status_polls += 1;
                if state.current.is_some() && !state.paused && state.error_code.is_none() {
                    state.polls_in_visit = (state.polls_in_visit + 1).min(polls_per_visit);
                    let (visit_no, poll_no) = (state.visit_no, state.polls_in_visit);
                    if let Some(fault) = state
                        .faults
                        .iter()
                        .find(|f| f.visit_no == visit_no && f.poll_no == poll_no)
                    {
                        state.error_code = Some(fault.error_code);
                    }
                }
            }

            Ok((
                state.current.clone(),
                state.polls_in_visit,
                state.paused,
                state.error_code,
                state.dispense_factor.unwrap_or(default_factor),
            ))
        })?;

        let Some(command) = command else {
            return Ok(DeviceStatus::idle());
        };

        let stage = self.stage_for(polls);
        let progress = f64::from(polls) / f64::from(polls_per_visit);
        let dispensed_kg = if stage == VisitStage::Completed {
            command.target_kg * factor
        } else {
            command.target_kg * factor * progress
        };

        Ok(DeviceStatus {
            dispensed_kg,
            is_running: stage != VisitStage::Completed && error_code.is_none(),
            is_paused: paused,
            current_stage: stage,
            has_error: error_code.is_some(),
            error_code,
        })
    }

    fn stage_for(&self, polls: u32) -> VisitStage {
        let total = self.settings.polls_per_visit;
        if polls >= total {
            return VisitStage::Completed;
        }
        // 前 total-1 次轮询均分到四个中间阶段
        let progress = f64::from(polls) / f64::from(total);
        if progress < 0.25 {
            VisitStage::Positioning
        } else if progress < 0.5 {
            VisitStage::BlowingBefore
        } else if progress < 0.75 {
            VisitStage::Dosing
        } else {
            VisitStage::BlowingAfter
        }
    }
}

#[async_trait]
impl DevicePort for SimulatedDevice {
    async fn start_visit(&self, line_id: &str, command: &VisitCommand) -> DeviceResult<()> {
        let polls_per_visit = self.settings.polls_per_visit;
        self.with_line(line_id, |state| {
            let in_flight = state.current.is_some()
                && state.polls_in_visit < polls_per_visit
                && state.error_code.is_none();
            if in_flight {
                return Err(DeviceError::Rejected {
                    line_id: line_id.to_string(),
                    message: "上一访问尚未结束".to_string(),
                });
            }
            state.visit_no += 1;
            state.polls_in_visit = 0;
            state.paused = false;
            state.error_code = None;
            state.current = Some(command.clone());
            state.log.commands.push(command.clone());
            debug!(line_id, visit_no = state.visit_no, slot = command.slot, "模拟器: 开始访问");
            Ok(())
        })
    }

    async fn get_status(&self, line_id: &str) -> DeviceResult<DeviceStatus> {
        self.read_status(line_id, true)
    }

    async fn peek_status(&self, line_id: &str) -> DeviceResult<DeviceStatus> {
        self.read_status(line_id, false)
    }

    async fn stop(&self, line_id: &str) -> DeviceResult<()> {
        self.with_line(line_id, |state| {
            state.log.stop_count += 1;
            state.current = None;
            state.polls_in_visit = 0;
            state.paused = false;
            state.error_code = None;
            Ok(())
        })
    }

    async fn pause(&self, line_id: &str) -> DeviceResult<()> {
        self.with_line(line_id, |state| {
            state.log.pause_count += 1;
            state.paused = true;
            Ok(())
        })
    }

    async fn resume(&self, line_id: &str) -> DeviceResult<()> {
        self.with_line(line_id, |state| {
            state.log.resume_count += 1;
            state.paused = false;
            Ok(())
        })
    }

    async fn set_blower(&self, line_id: &str, power_pct: f64, on: bool) -> DeviceResult<()> {
        self.with_line(line_id, |state| {
            state
                .log
                .manual_commands
                .push(format!("blower power={} on={}", power_pct, on));
            Ok(())
        })
    }

    async fn set_doser(
        &self,
        line_id: &str,
        doser_id: &str,
        rate_kg_per_min: f64,
        on: bool,
    ) -> DeviceResult<()> {
        self.with_line(line_id, |state| {
            state.log.manual_commands.push(format!(
                "doser {} rate={} on={}",
                doser_id, rate_kg_per_min, on
            ));
            Ok(())
        })
    }

    async fn set_selector(&self, line_id: &str, slot: i32) -> DeviceResult<()> {
        self.with_line(line_id, |state| {
            state.log.manual_commands.push(format!("selector slot={}", slot));
            Ok(())
        })
    }
}
