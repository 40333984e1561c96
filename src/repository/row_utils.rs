// ==========================================
// 网箱投喂控制系统 - 行映射辅助函数
// ==========================================
// 职责: 时间戳与枚举列的统一读写格式
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::types::Type;

/// 时间戳存储格式（毫秒精度，便于同秒内事件排序）
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 解析时间戳列（兼容无小数秒的旧数据）
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 解析枚举列
pub fn parse_enum<T>(
    idx: usize,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("无法识别的枚举值: {}", raw).into(),
        )
    })
}
