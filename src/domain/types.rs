// ==========================================
// 网箱投喂控制系统 - 领域类型定义
// ==========================================
// 持久化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 投喂类型 (Feeding Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedingType {
    Manual, // 人工发起
    Cyclic, // 循环投喂
}

impl FeedingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedingType::Manual => "MANUAL",
            FeedingType::Cyclic => "CYCLIC",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MANUAL" => Some(FeedingType::Manual),
            "CYCLIC" => Some(FeedingType::Cyclic),
            _ => None,
        }
    }
}

impl fmt::Display for FeedingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 投喂会话状态 (Session Status)
// ==========================================
// 红线: ACTIVE 是唯一的非终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,      // 执行中
    Interrupted, // 中断（硬件故障或人工停止）
    Cancelled,   // 已取消
    Completed,   // 已完成
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Interrupted => "INTERRUPTED",
            SessionStatus::Cancelled => "CANCELLED",
            SessionStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(SessionStatus::Active),
            "INTERRUPTED" => Some(SessionStatus::Interrupted),
            "CANCELLED" => Some(SessionStatus::Cancelled),
            "COMPLETED" => Some(SessionStatus::Completed),
            _ => None,
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    /// 是否为外部停止（人工停止/取消）
    pub fn is_externally_stopped(&self) -> bool {
        matches!(self, SessionStatus::Interrupted | SessionStatus::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 网箱投喂模式 (Cage Feeding Mode)
// ==========================================
// NORMAL: 每次访问实际下料
// PAUSE: 占用一次访问的等效时长，不下料
// FASTING: 禁食，programmed_visits = 0，整场跳过
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CageFeedingMode {
    Normal,
    Pause,
    Fasting,
}

impl CageFeedingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CageFeedingMode::Normal => "NORMAL",
            CageFeedingMode::Pause => "PAUSE",
            CageFeedingMode::Fasting => "FASTING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NORMAL" => Some(CageFeedingMode::Normal),
            "PAUSE" => Some(CageFeedingMode::Pause),
            "FASTING" => Some(CageFeedingMode::Fasting),
            _ => None,
        }
    }
}

impl fmt::Display for CageFeedingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 网箱投喂状态 (Cage Feeding Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CageFeedingStatus {
    Pending,    // 未开始
    InProgress, // 已开始首访
    Completed,  // 全部访问完成
}

impl CageFeedingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CageFeedingStatus::Pending => "PENDING",
            CageFeedingStatus::InProgress => "IN_PROGRESS",
            CageFeedingStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(CageFeedingStatus::Pending),
            "IN_PROGRESS" => Some(CageFeedingStatus::InProgress),
            "COMPLETED" => Some(CageFeedingStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for CageFeedingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
