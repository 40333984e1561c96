// ==========================================
// 网箱投喂控制系统 - 设备布局领域模型
// ==========================================
// 说明: 布局由外部系统维护，本子系统只读
//       (唯一例外: 料仓库存随下料扣减)
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// FeedingLine - 投喂线 (一台风机 + 一个选择器)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingLine {
    pub line_id: String,
    pub line_name: String,
    pub blower_power_pct: f64,        // 风机功率 (%)
    pub blow_before_s: f64,           // 下料前吹风时长
    pub blow_after_s: f64,            // 下料后吹风时长
    pub selector_positioning_s: f64,  // 选择器定位时长
}

// ==========================================
// Cage - 网箱 (挂接在投喂线的某个槽位)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cage {
    pub cage_id: String,
    pub cage_name: String,
    pub line_id: Option<String>,
    pub slot_number: Option<i32>,
    pub transport_time_s: Option<f64>, // 管道输送时长 (缺省取配置)
}

// ==========================================
// Doser - 下料器 (一个下料器对应一个料仓)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doser {
    pub doser_id: String,
    pub line_id: String,
    pub silo_id: String,
    pub max_rate_kg_per_min: f64,
}

// ==========================================
// Silo - 料仓
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Silo {
    pub silo_id: String,
    pub silo_name: String,
    pub stock_kg: f64,
    pub capacity_kg: f64,
}
