// ==========================================
// 市场订单接入系统 - 订单领域模型
// ==========================================
// 依据: 订单接入流程设计 v0.2 - 订单状态机
// 红线: 状态只通过状态机接口变更;历史仅追加;
//       物理删除仅限管理员操作且必须先冲销库存净效应
// ==========================================

use crate::domain::product::VariantKey;
use crate::domain::types::OrderStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// MarketplaceOrder - 市场订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceOrder {
    // ===== 主键与外部标识 =====
    pub order_id: String,                     // 内部订单 ID(UUID)
    pub account_name: String,                 // 归属市场账号
    pub marketplace_order_id: Option<String>, // 平台订单号(可选)
    pub order_item_id: String,                // 平台订单行 ID(唯一,用于查重)

    // ===== 变体与数量 =====
    pub variant: VariantKey, // 款号/颜色/尺码
    pub quantity: i64,       // 件数

    // ===== 状态 =====
    pub status: OrderStatus, // 当前状态
    pub sale_date: NaiveDate, // 销售日期

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}

impl MarketplaceOrder {
    /// 构造一条新订单(初始状态: DISPATCHED)
    pub fn new_dispatched(
        account_name: impl Into<String>,
        marketplace_order_id: Option<String>,
        order_item_id: impl Into<String>,
        variant: VariantKey,
        quantity: i64,
        sale_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: Uuid::new_v4().to_string(),
            account_name: account_name.into(),
            marketplace_order_id,
            order_item_id: order_item_id.into(),
            variant,
            quantity,
            status: OrderStatus::Dispatched,
            sale_date,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// StatusChange - 状态流转历史条目
// ==========================================
// 仅追加,永不修改;同状态重入也记录(带新备注/时间戳)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub history_id: String,                    // 历史条目 ID(UUID)
    pub order_id: String,                      // 关联订单
    pub previous_status: Option<OrderStatus>,  // 流转前状态(创建时为 None)
    pub new_status: OrderStatus,               // 流转后状态
    pub changed_at: DateTime<Utc>,             // 流转时间
    pub changed_by: Option<String>,            // 操作人
    pub comment: Option<String>,               // 备注
}

impl StatusChange {
    pub fn new(
        order_id: impl Into<String>,
        previous_status: Option<OrderStatus>,
        new_status: OrderStatus,
        changed_by: Option<String>,
        comment: Option<String>,
    ) -> Self {
        Self {
            history_id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            previous_status,
            new_status,
            changed_at: Utc::now(),
            changed_by,
            comment,
        }
    }
}
