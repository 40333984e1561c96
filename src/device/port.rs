// ==========================================
// 网箱投喂控制系统 - 设备端口
// ==========================================
// 职责: 定义编排器与投喂线控制器 (PLC / 模拟器) 之间的统一命令/状态接口
// 红线: 端口不含业务逻辑
// 红线: 硬件故障只通过 DeviceStatus.has_error 上报，调用方轮询
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// VisitStage - 访问阶段
// ==========================================
// 顺序: Positioning → BlowingBefore → Dosing → BlowingAfter → Completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStage {
    Idle,
    Positioning,
    BlowingBefore,
    Dosing,
    BlowingAfter,
    Completed,
}

impl fmt::Display for VisitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VisitStage::Idle => "IDLE",
            VisitStage::Positioning => "POSITIONING",
            VisitStage::BlowingBefore => "BLOWING_BEFORE",
            VisitStage::Dosing => "DOSING",
            VisitStage::BlowingAfter => "BLOWING_AFTER",
            VisitStage::Completed => "COMPLETED",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// VisitCommand - 单次访问命令
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitCommand {
    pub slot: i32,                    // 目标槽位
    pub target_kg: f64,               // 目标下料量
    pub rate_kg_per_min: f64,         // 下料速率
    pub blower_power_pct: f64,        // 风机功率
    pub transport_time_s: f64,        // 管道输送时长
    pub blow_before_s: f64,
    pub blow_after_s: f64,
    pub selector_positioning_s: f64,
}

// ==========================================
// DeviceStatus - 设备状态快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub dispensed_kg: f64,            // 当前访问已下料量 (设备自报)
    pub is_running: bool,
    pub is_paused: bool,
    pub current_stage: VisitStage,
    pub has_error: bool,
    pub error_code: Option<i32>,
}

impl DeviceStatus {
    /// 空闲状态
    pub fn idle() -> Self {
        Self {
            dispensed_kg: 0.0,
            is_running: false,
            is_paused: false,
            current_stage: VisitStage::Idle,
            has_error: false,
            error_code: None,
        }
    }
}

// ==========================================
// DeviceError - 驱动通信错误
// ==========================================
// 注意: 这里只表示驱动本身的失败 (链路断开、未知投喂线)，
//       不表示硬件故障
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("未知投喂线: {0}")]
    UnknownLine(String),

    #[error("设备通信失败: line={line_id}, {message}")]
    Communication { line_id: String, message: String },

    #[error("设备命令被拒绝: line={line_id}, {message}")]
    Rejected { line_id: String, message: String },
}

pub type DeviceResult<T> = Result<T, DeviceError>;

// ==========================================
// DevicePort Trait
// ==========================================
// 实现者: SimulatedDevice / Modbus 驱动
#[async_trait]
pub trait DevicePort: Send + Sync {
    // ===== 访问控制 =====

    /// 开始一次访问 (非阻塞，设备开始定位/下料)
    async fn start_visit(&self, line_id: &str, command: &VisitCommand) -> DeviceResult<()>;

    /// 读取当前访问状态 (编排器轮询)
    async fn get_status(&self, line_id: &str) -> DeviceResult<DeviceStatus>;

    /// 只读状态查询 (进度展示用，不计入轮询)
    ///
    /// 控制器读状态无副作用时直接复用 get_status
    async fn peek_status(&self, line_id: &str) -> DeviceResult<DeviceStatus> {
        self.get_status(line_id).await
    }

    // ===== 控制面命令 (幂等) =====

    async fn stop(&self, line_id: &str) -> DeviceResult<()>;

    async fn pause(&self, line_id: &str) -> DeviceResult<()>;

    async fn resume(&self, line_id: &str) -> DeviceResult<()>;

    // ===== 手动设备控制 =====

    /// 手动启停风机
    async fn set_blower(&self, line_id: &str, power_pct: f64, on: bool) -> DeviceResult<()>;

    /// 手动启停下料器
    async fn set_doser(
        &self,
        line_id: &str,
        doser_id: &str,
        rate_kg_per_min: f64,
        on: bool,
    ) -> DeviceResult<()>;

    /// 手动定位选择器
    async fn set_selector(&self, line_id: &str, slot: i32) -> DeviceResult<()>;
}
