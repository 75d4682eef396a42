// ==========================================
// 市场订单接入系统 - 领域类型定义
// ==========================================
// 依据: 订单接入流程设计 v0.2 - 状态机与批次分类
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 红线: 状态只能通过状态机接口流转,每次流转追加历史
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Dispatched,  // 已发货(初始状态,创建即扣减预留池)
    Delivered,   // 已送达
    Returned,    // 已退货(库存终态)
    Cancelled,   // 已取消(库存终态)
    WrongReturn, // 错退(库存终态)
}

impl OrderStatus {
    /// 是否属于退回族状态(对库存而言是终态)
    ///
    /// 进入退回族时将数量回补到预留池;族内再次流转不再产生库存副作用
    pub fn is_return_family(&self) -> bool {
        matches!(
            self,
            OrderStatus::Returned | OrderStatus::Cancelled | OrderStatus::WrongReturn
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Dispatched => write!(f, "DISPATCHED"),
            OrderStatus::Delivered => write!(f, "DELIVERED"),
            OrderStatus::Returned => write!(f, "RETURNED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::WrongReturn => write!(f, "WRONG_RETURN"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DISPATCHED" => Ok(OrderStatus::Dispatched),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "RETURNED" => Ok(OrderStatus::Returned),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "WRONG_RETURN" => Ok(OrderStatus::WrongReturn),
            other => Err(format!("未知的订单状态: {}", other)),
        }
    }
}

// ==========================================
// 映射来源 (Mapping Source)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingSource {
    Manual,  // 单条人工确认
    Bulk,    // 批量导入时确认
    Pattern, // 模板自动解析
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingSource::Manual => write!(f, "MANUAL"),
            MappingSource::Bulk => write!(f, "BULK"),
            MappingSource::Pattern => write!(f, "PATTERN"),
        }
    }
}

impl FromStr for MappingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(MappingSource::Manual),
            "BULK" => Ok(MappingSource::Bulk),
            "PATTERN" => Ok(MappingSource::Pattern),
            other => Err(format!("未知的映射来源: {}", other)),
        }
    }
}

// ==========================================
// 批次类型 (Batch Kind)
// ==========================================
// 红线: 一个批次只允许一种类型;混合批次整体拒绝,不做行级降级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchKind {
    PendingHandover, // 待交接批次(仅含发货前状态)
    Dispatched,      // 已发货批次(发货后状态,可夹带退货/取消行并跳过)
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::PendingHandover => write!(f, "PENDING_HANDOVER"),
            BatchKind::Dispatched => write!(f, "DISPATCHED"),
        }
    }
}

// ==========================================
// 导入管线阶段 (Pipeline Stage)
// ==========================================
// 多步向导用显式状态机表达,每个操作员动作对应一个迁移函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Previewing,        // 预览中(纯计算,无副作用)
    ResolvingMappings, // 人工映射解析中
    FinalReview,       // 终审(全部行已解析)
    Committing,        // 提交中(逐行落库,可在确认点挂起)
    Done,              // 完成
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Previewing => write!(f, "PREVIEWING"),
            PipelineStage::ResolvingMappings => write!(f, "RESOLVING_MAPPINGS"),
            PipelineStage::FinalReview => write!(f, "FINAL_REVIEW"),
            PipelineStage::Committing => write!(f, "COMMITTING"),
            PipelineStage::Done => write!(f, "DONE"),
        }
    }
}

// ==========================================
// 库存事件类型 (Stock Event Type)
// ==========================================
// 用途: stock_event 审计流水的事件分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockEventType {
    Allocate,          // 常规分配(预留池扣减)
    EmergencyTransfer, // 紧急调拨(预留不足,经确认后动用主池)
    Restore,           // 退回回补(回补预留池)
    Refill,            // 预留池补充(池间重分类,无物理变动)
    DeleteReversal,    // 删除订单时的净效应冲销
}

impl fmt::Display for StockEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockEventType::Allocate => write!(f, "ALLOCATE"),
            StockEventType::EmergencyTransfer => write!(f, "EMERGENCY_TRANSFER"),
            StockEventType::Restore => write!(f, "RESTORE"),
            StockEventType::Refill => write!(f, "REFILL"),
            StockEventType::DeleteReversal => write!(f, "DELETE_REVERSAL"),
        }
    }
}

impl FromStr for StockEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOCATE" => Ok(StockEventType::Allocate),
            "EMERGENCY_TRANSFER" => Ok(StockEventType::EmergencyTransfer),
            "RESTORE" => Ok(StockEventType::Restore),
            "REFILL" => Ok(StockEventType::Refill),
            "DELETE_REVERSAL" => Ok(StockEventType::DeleteReversal),
            other => Err(format!("未知的库存事件类型: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrip() {
        for status in [
            OrderStatus::Dispatched,
            OrderStatus::Delivered,
            OrderStatus::Returned,
            OrderStatus::Cancelled,
            OrderStatus::WrongReturn,
        ] {
            let text = status.to_string();
            assert_eq!(text.parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_return_family() {
        assert!(!OrderStatus::Dispatched.is_return_family());
        assert!(!OrderStatus::Delivered.is_return_family());
        assert!(OrderStatus::Returned.is_return_family());
        assert!(OrderStatus::Cancelled.is_return_family());
        assert!(OrderStatus::WrongReturn.is_return_family());
    }
}
