// ==========================================
// 市场订单接入系统 - 商品目录领域模型
// ==========================================
// 依据: 库存双池模型说明 - current/locked/available 口径
// 红线: available_stock 永不落库,始终由 current - locked 派生
// 用途: 目录管理(外部)写入,本核心只读目录结构,只改库存计数
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// VariantKey - 变体三元组
// ==========================================
// 变体 = (design, color, size),库存记账的最小单位
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub design: String, // 款号
    pub color: String,  // 颜色
    pub size: String,   // 尺码
}

impl VariantKey {
    pub fn new(design: impl Into<String>, color: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            color: color.into(),
            size: size.into(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.design, self.color, self.size)
    }
}

// ==========================================
// SizeVariant - 尺码变体(库存记账单位)
// ==========================================
// 不变式: 任何变更后必须满足 0 <= locked_stock <= current_stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeVariant {
    pub size: String,        // 尺码标签(颜色内唯一)
    pub current_stock: i64,  // 实物总库存
    pub locked_stock: i64,   // 预留池(市场渠道专用)
    pub reorder_point: i64,  // 补货提示阈值
}

impl SizeVariant {
    /// 主池可用量(派生,不落库)
    pub fn available_stock(&self) -> i64 {
        self.current_stock - self.locked_stock
    }

    /// 是否低于补货阈值
    pub fn below_reorder_point(&self) -> bool {
        self.current_stock < self.reorder_point
    }
}

// ==========================================
// ColorVariant - 颜色变体
// ==========================================
// 不变式: 颜色名在商品内唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorVariant {
    pub color: String,          // 颜色标签
    pub wholesale_price: f64,   // 批发价
    pub retail_price: f64,      // 零售价
    pub sizes: Vec<SizeVariant>, // 尺码有序集合
}

// ==========================================
// Product - 商品
// ==========================================
// 由目录管理(外部)创建/编辑,本核心只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub design: String,           // 款号(唯一标识)
    pub colors: Vec<ColorVariant>, // 颜色有序集合
}

// ==========================================
// VariantStock - 变体库存快照
// ==========================================
// 用途: 目录仓储查询/变更操作的返回载体,携带变更后的最新计数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantStock {
    pub key: VariantKey,
    pub current_stock: i64,
    pub locked_stock: i64,
    pub reorder_point: i64,
}

impl VariantStock {
    /// 主池可用量(派生,不落库)
    pub fn available_stock(&self) -> i64 {
        self.current_stock - self.locked_stock
    }

    /// 是否低于补货阈值
    pub fn below_reorder_point(&self) -> bool {
        self.current_stock < self.reorder_point
    }
}

// ==========================================
// MarketplaceAccount - 市场账号
// ==========================================
// 只读配置,由账号管理(外部)维护
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceAccount {
    pub account_name: String,     // 账号名
    pub platform: Option<String>, // 平台标识
    pub is_active: bool,          // 是否启用
    pub is_default: bool,         // 是否默认账号
}

// ==========================================
// StockLockSettings - 预留池设置(租户级)
// ==========================================
// lock_value 为聚合目标值(报表口径); max_threshold 限制补充操作的上限
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLockSettings {
    pub enabled: bool,      // 预留池功能开关
    pub lock_value: i64,    // 聚合锁定目标(报表用)
    pub max_threshold: i64, // 单变体锁定上限(约束 refill)
}
