// ==========================================
// 网箱投喂控制系统 - 料仓库存核算
// ==========================================
// 职责: 开始投喂前的库存预检
// 说明: 执行期扣减按设备自报的实际下料量进行 (见 FeedingProgressRepository)
//       超量下料如实反映在库存中，不单独标记为异常
// ==========================================

use thiserror::Error;

use crate::domain::cage_feeding::CageFeeding;
use crate::domain::layout::Silo;

/// 库存不足
#[derive(Error, Debug, Clone, PartialEq)]
#[error("料仓库存不足: silo={silo_id}, 需要={required_kg:.2}kg, 现有={available_kg:.2}kg, 缺口={shortage_kg:.2}kg")]
pub struct StockShortage {
    pub silo_id: String,
    pub required_kg: f64,
    pub available_kg: f64,
    pub shortage_kg: f64,
}

/// 计划所需库存 = Σ NORMAL 网箱 (每次计划量 × 访问次数)
pub fn required_stock_kg(feedings: &[CageFeeding]) -> f64 {
    feedings.iter().map(CageFeeding::planned_total_kg).sum()
}

/// 校验料仓库存是否覆盖计划量
pub fn check_silo_stock(silo: &Silo, required_kg: f64) -> Result<(), StockShortage> {
    if silo.stock_kg + f64::EPSILON >= required_kg {
        return Ok(());
    }
    Err(StockShortage {
        silo_id: silo.silo_id.clone(),
        required_kg,
        available_kg: silo.stock_kg,
        shortage_kg: required_kg - silo.stock_kg,
    })
}
