// ==========================================
// 市场订单接入系统 - SKU 映射领域模型
// ==========================================
// 用途: 记录已确认的 市场编码 → 内部变体 关联
// 说明: 映射在创建时记录归属账号,但读取对租户下所有账号共享
//       (产品文档确认的既定设计,非缺陷)
// ==========================================

use crate::domain::product::VariantKey;
use crate::domain::types::MappingSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// SkuMapping - 已确认映射
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuMapping {
    pub mapping_id: String,                  // 映射 ID(UUID)
    pub marketplace_sku: String,             // 市场原始编码
    pub account_name: String,                // 创建时的归属账号
    pub variant: VariantKey,                 // 解析到的内部变体
    pub usage_count: i64,                    // 复用次数
    pub last_used_at: Option<DateTime<Utc>>, // 最近使用时间
    pub mapping_source: MappingSource,       // 映射来源
    pub created_at: DateTime<Utc>,           // 创建时间
}

impl SkuMapping {
    /// 构造一条新的待落库映射
    pub fn new(
        marketplace_sku: impl Into<String>,
        account_name: impl Into<String>,
        variant: VariantKey,
        source: MappingSource,
    ) -> Self {
        Self {
            mapping_id: Uuid::new_v4().to_string(),
            marketplace_sku: marketplace_sku.into(),
            account_name: account_name.into(),
            variant,
            usage_count: 0,
            last_used_at: None,
            mapping_source: source,
            created_at: Utc::now(),
        }
    }
}

// ==========================================
// SkuPattern - 推断的编码模板
// ==========================================
// 用途: 同一会话确认 >=3 条映射后,尝试推断可复用模板
//       ({design}/{color}/{size} 占位符 + 实际用到的尺码转换表)
// 说明: 纯建议性输出,接受与否不阻塞导入管线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuPattern {
    pub template: String,                  // 占位符模板,如 "{design}-{color}_{size}"
    pub size_table: Vec<(String, String)>, // 实际用到的 数字→字母 尺码映射
    pub sample_count: usize,               // 推断所依据的样本数
}
