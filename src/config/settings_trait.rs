// ==========================================
// 市场订单接入系统 - 导入设置读取 Trait
// ==========================================
// 职责: 定义导入/分配模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::product::StockLockSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

// ==========================================
// ImportColumnMap - 报表列名映射
// ==========================================
// 各市场平台导出报表的列名不同,按账号配置覆盖,缺省用通用列名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportColumnMap {
    pub external_order_id: String,
    pub order_item_id: String,
    pub sku_code: String,
    pub quantity: String,
    pub status: String,
}

impl Default for ImportColumnMap {
    fn default() -> Self {
        Self {
            external_order_id: "Order No".to_string(),
            order_item_id: "Order Item ID".to_string(),
            sku_code: "SKU".to_string(),
            quantity: "Quantity".to_string(),
            status: "Order Status".to_string(),
        }
    }
}

// ==========================================
// SettingsReader Trait
// ==========================================
// 用途: 导入引擎与分配器所需的配置读取接口
// 实现者: ConfigManager（从 global_config 表读取）
#[async_trait]
pub trait SettingsReader: Send + Sync {
    /// 获取预留池设置
    ///
    /// # 默认值
    /// - enabled=true, lock_value=0, max_threshold=50
    async fn get_stock_lock_settings(&self) -> Result<StockLockSettings, Box<dyn Error>>;

    /// 获取"待交接"状态词表(发货前状态)
    ///
    /// # 默认值
    /// - ["Ready to Ship", "Ready to dispatch", "Pending"]
    async fn get_pending_handover_statuses(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// 获取"已发出"状态词表(发货后状态)
    ///
    /// # 默认值
    /// - ["Shipped", "Dispatched", "In Transit", "Delivered"]
    async fn get_dispatched_statuses(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// 获取跳过状态词表(退货/取消类,导入时不落库)
    ///
    /// # 默认值
    /// - ["Returned", "RTO", "RTO Complete", "Cancelled",
    ///    "Return Initiated", "Exchange"]
    async fn get_skip_statuses(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// 获取报表列名映射
    async fn get_column_map(&self) -> Result<ImportColumnMap, Box<dyn Error>>;
}
