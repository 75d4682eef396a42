// ==========================================
// 市场订单接入系统 - 导入领域模型
// ==========================================
// 依据: 订单接入流程设计 v0.2 - 批次导入与预览
// 用途: 导入管道中间产物与报告结构
// 红线: 行级可恢复问题进报告结构,不跨管线边界抛错
// ==========================================

use crate::domain::product::VariantKey;
use crate::domain::types::{BatchKind, StockEventType};
use crate::sku::parser::ParsedSku;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// RawOrderRow - 原始导入行
// ==========================================
// 来源: 市场导出文件(CSV/Excel),列名由配置映射
// 生命周期: 仅在导入流程内
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOrderRow {
    pub row_number: usize,                  // 原始文件行号(用于报告定位)
    pub external_order_id: Option<String>,  // 平台订单号
    pub order_item_id: Option<String>,      // 平台订单行 ID
    pub sku_code: Option<String>,           // 市场商品编码
    pub quantity: Option<i64>,              // 件数
    pub status_text: Option<String>,        // 平台生命周期状态(原文)
}

// ==========================================
// 行处理结果 - 带标签联合
// ==========================================
// 每个变体只携带该标签相关的字段

/// 已解析行(可进入提交阶段)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedRow {
    pub row_number: usize,
    pub external_order_id: Option<String>,
    pub order_item_id: String,
    pub sku_code: String,
    pub variant: VariantKey,
    pub quantity: i64,
    pub resolved_by: ResolutionSource, // 直接解析 or 命中映射
}

/// 解析来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum ResolutionSource {
    DirectParse,                      // SKU 解析器直接给出且目录校验通过
    Mapping { mapping_id: String },   // 命中已确认映射(提交时累加使用计数)
}

/// 未解析行(进入人工映射队列)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedRow {
    pub row_number: usize,
    pub sku_code: String,
    pub quantity: i64,
}

/// 跳过行(接受但不导入的状态,如已退货)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub order_item_id: Option<String>,
    pub status_text: String,
}

/// 无效行(状态既不可导入也不可跳过,或字段缺失)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidRow {
    pub row_number: usize,
    pub reason: String,
}

/// 行处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "outcome")]
pub enum RowOutcome {
    Parsed(ParsedRow),
    Unresolved(UnresolvedRow),
    Skipped(SkippedRow),
    Invalid(InvalidRow),
}

// ==========================================
// UnresolvedCode - 未解析编码聚合
// ==========================================
// 按原始编码聚合出现次数与影响件数,供人工映射界面展示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedCode {
    pub sku_code: String,              // 市场原始编码
    pub occurrences: usize,            // 出现次数
    pub total_quantity: i64,           // 聚合影响件数
    pub suggestion: Option<ParsedSku>, // 解析器的部分建议(若解析出过三元组但目录不存在)
}

// ==========================================
// VariantBreakdown - 变体汇总
// ==========================================
// 提交前供操作员审阅的每变体口径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantBreakdown {
    pub variant: VariantKey,
    pub total_quantity: i64,
    pub order_count: usize,
}

// ==========================================
// ImportPreview - 导入预览
// ==========================================
// 纯读取产物: 重复计算幂等,零副作用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub account_name: String,
    pub batch_kind: BatchKind,
    pub resolved_rows: Vec<ParsedRow>,
    pub unresolved_codes: Vec<UnresolvedCode>,
    pub skipped_rows: Vec<SkippedRow>,
    pub invalid_rows: Vec<InvalidRow>,
    pub breakdown: Vec<VariantBreakdown>,
}

impl ImportPreview {
    /// 是否所有行都已解析(允许进入终审)
    pub fn fully_resolved(&self) -> bool {
        self.unresolved_codes.is_empty()
    }
}

// ==========================================
// ImportReport - 提交报告
// ==========================================
// 红线: 必须逐行/逐单给出明确原因,不允许只有聚合数字

/// 成功提交的行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedRow {
    pub row_number: usize,
    pub order_id: String,
    pub order_item_id: String,
    pub variant: VariantKey,
    pub quantity: i64,
    pub emergency_transfer: bool, // 是否经确认动用了主池
}

/// 失败的行(含行号与原因)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRow {
    pub row_number: usize,
    pub order_item_id: String,
    pub reason: String,
}

/// 重复行(单独统计,不计入失败)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRow {
    pub row_number: usize,
    pub order_item_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub success: Vec<CommittedRow>,
    pub failed: Vec<FailedRow>,
    pub duplicates: Vec<DuplicateRow>,
    pub total_success: usize,
    pub total_failed: usize,
    pub total_duplicates: usize,
    /// 提交后跌破补货阈值的变体(建议性提示)
    pub low_stock_variants: Vec<VariantKey>,
}

impl ImportReport {
    /// 重算聚合计数(逐行明细为准)
    pub fn finalize(&mut self) {
        self.total_success = self.success.len();
        self.total_failed = self.failed.len();
        self.total_duplicates = self.duplicates.len();
        self.low_stock_variants.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        self.low_stock_variants.dedup();
    }
}

// ==========================================
// StockEvent - 库存审计流水
// ==========================================
// 仅追加;所有库存变更操作(分配/紧急调拨/回补/补充/冲销)都落一条
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEvent {
    pub event_id: String,            // 事件 ID(UUID)
    pub event_type: StockEventType,  // 事件类型
    pub variant: VariantKey,         // 涉及变体
    pub quantity: i64,               // 涉及件数
    pub order_id: Option<String>,    // 关联订单(若有)
    pub detail: Option<String>,      // 附加说明(如动用主池的件数)
    pub created_by: Option<String>,  // 操作人
    pub created_at: DateTime<Utc>,   // 发生时间
}

impl StockEvent {
    pub fn new(
        event_type: StockEventType,
        variant: VariantKey,
        quantity: i64,
        order_id: Option<String>,
        detail: Option<String>,
        created_by: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            variant,
            quantity,
            order_id,
            detail,
            created_by,
            created_at: Utc::now(),
        }
    }
}
