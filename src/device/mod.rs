// ==========================================
// 网箱投喂控制系统 - 设备层
// ==========================================
// 职责: 设备端口定义 + 具体驱动 (模拟器)
// ==========================================

pub mod port;
pub mod simulator;

pub use port::{DeviceError, DevicePort, DeviceResult, DeviceStatus, VisitCommand, VisitStage};
pub use simulator::{LineSnapshot, SimulatedDevice, SimulatorSettings};
