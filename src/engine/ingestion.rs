// ==========================================
// 市场订单接入系统 - 导入摄取引擎
// ==========================================
// 职责: 原始行 → 批次判别 → 行校验 → SKU 解析/映射命中 → 预览
// 红线: 预览纯读取,零副作用;重复计算幂等
// 红线: 混合批次(发货前后状态并存)整批拒绝,不做行级拆分
// ==========================================

use crate::config::settings_trait::SettingsReader;
use crate::domain::import::{
    ImportPreview, InvalidRow, ParsedRow, RawOrderRow, ResolutionSource, RowOutcome, SkippedRow,
    UnresolvedCode, UnresolvedRow, VariantBreakdown,
};
use crate::domain::product::VariantKey;
use crate::domain::types::BatchKind;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::catalog_repo::InventoryCatalog;
use crate::repository::mapping_repo::SkuMappingStore;
use crate::sku::parser::parse_sku;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// ImportIngestionEngine - 摄取引擎
// ==========================================
pub struct ImportIngestionEngine<M, C, S>
where
    M: SkuMappingStore,
    C: InventoryCatalog,
    S: SettingsReader,
{
    mappings: Arc<M>,
    catalog: Arc<C>,
    settings: Arc<S>,
}

/// 状态词表匹配(忽略大小写与首尾空白)
fn contains_status(vocabulary: &[String], status: &str) -> bool {
    let status = status.trim();
    vocabulary.iter().any(|v| v.trim().eq_ignore_ascii_case(status))
}

impl<M, C, S> ImportIngestionEngine<M, C, S>
where
    M: SkuMappingStore,
    C: InventoryCatalog,
    S: SettingsReader,
{
    pub fn new(mappings: Arc<M>, catalog: Arc<C>, settings: Arc<S>) -> Self {
        Self {
            mappings,
            catalog,
            settings,
        }
    }

    /// 生成导入预览
    ///
    /// # 流程
    /// 1. 批次判别: 按状态词表判定整批为"待交接"或"已发出",混合即拒绝
    /// 2. 行校验: 关键字段缺失/数量非法 → 无效行
    /// 3. 解析: 规则解析 + 目录校验 → 映射命中 → 未解析聚合
    ///
    /// # 说明
    /// - 未知状态行记为无效行(不参与批次判别)
    /// - 映射命中但目录已无该变体时回落为未解析(映射已失效)
    pub async fn preview(
        &self,
        account_name: &str,
        rows: &[RawOrderRow],
    ) -> EngineResult<ImportPreview> {
        let pending_vocab = self.settings.get_pending_handover_statuses().await?;
        let dispatched_vocab = self.settings.get_dispatched_statuses().await?;
        let skip_vocab = self.settings.get_skip_statuses().await?;

        let batch_kind =
            classify_batch(rows, &pending_vocab, &dispatched_vocab, &skip_vocab)?;

        // 一次扫描批量取映射(仅对出现过的编码)
        let distinct_skus: Vec<String> = {
            let mut seen = BTreeMap::new();
            for row in rows {
                if let Some(sku) = &row.sku_code {
                    seen.entry(sku.clone()).or_insert(());
                }
            }
            seen.into_keys().collect()
        };
        let mapping_hits = self.mappings.bulk_lookup(&distinct_skus).await?;

        let mut outcomes: Vec<RowOutcome> = Vec::with_capacity(rows.len());
        for row in rows {
            outcomes.push(
                self.process_row(row, &pending_vocab, &dispatched_vocab, &skip_vocab, &mapping_hits)
                    .await?,
            );
        }

        let preview = assemble_preview(account_name, batch_kind, rows, outcomes);

        info!(
            account = account_name,
            batch_kind = %preview.batch_kind,
            resolved = preview.resolved_rows.len(),
            unresolved = preview.unresolved_codes.len(),
            skipped = preview.skipped_rows.len(),
            invalid = preview.invalid_rows.len(),
            "预览生成完成"
        );

        Ok(preview)
    }

    async fn process_row(
        &self,
        row: &RawOrderRow,
        pending_vocab: &[String],
        dispatched_vocab: &[String],
        skip_vocab: &[String],
        mapping_hits: &HashMap<String, crate::domain::mapping::SkuMapping>,
    ) -> EngineResult<RowOutcome> {
        // ===== 状态校验 =====
        let status_text = match &row.status_text {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Ok(RowOutcome::Invalid(InvalidRow {
                    row_number: row.row_number,
                    reason: "缺少订单状态".to_string(),
                }))
            }
        };

        if contains_status(skip_vocab, &status_text) {
            return Ok(RowOutcome::Skipped(SkippedRow {
                row_number: row.row_number,
                order_item_id: row.order_item_id.clone(),
                status_text,
            }));
        }

        if !contains_status(pending_vocab, &status_text)
            && !contains_status(dispatched_vocab, &status_text)
        {
            return Ok(RowOutcome::Invalid(InvalidRow {
                row_number: row.row_number,
                reason: format!("未知订单状态: {}", status_text),
            }));
        }

        // ===== 字段校验 =====
        let order_item_id = match &row.order_item_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => {
                return Ok(RowOutcome::Invalid(InvalidRow {
                    row_number: row.row_number,
                    reason: "缺少订单行 ID".to_string(),
                }))
            }
        };

        let sku_code = match &row.sku_code {
            Some(sku) if !sku.trim().is_empty() => sku.trim().to_string(),
            _ => {
                return Ok(RowOutcome::Invalid(InvalidRow {
                    row_number: row.row_number,
                    reason: "缺少商品编码".to_string(),
                }))
            }
        };

        let quantity = match row.quantity {
            Some(q) if q > 0 => q,
            _ => {
                return Ok(RowOutcome::Invalid(InvalidRow {
                    row_number: row.row_number,
                    reason: "件数缺失或非正数".to_string(),
                }))
            }
        };

        // ===== 解析: 规则解析 → 目录校验 =====
        let parsed = parse_sku(&sku_code);
        if let Some(p) = &parsed {
            let key = VariantKey::new(&p.design, &p.color, &p.size);
            if self.catalog.find_variant(&key).await?.is_some() {
                return Ok(RowOutcome::Parsed(ParsedRow {
                    row_number: row.row_number,
                    external_order_id: row.external_order_id.clone(),
                    order_item_id,
                    sku_code,
                    variant: key,
                    quantity,
                    resolved_by: ResolutionSource::DirectParse,
                }));
            }
            debug!(sku = %sku_code, variant = %key, "规则解析成功但目录无此变体,尝试映射");
        }

        // ===== 映射命中 =====
        if let Some(mapping) = mapping_hits.get(&sku_code) {
            if self.catalog.find_variant(&mapping.variant).await?.is_some() {
                return Ok(RowOutcome::Parsed(ParsedRow {
                    row_number: row.row_number,
                    external_order_id: row.external_order_id.clone(),
                    order_item_id,
                    sku_code,
                    variant: mapping.variant.clone(),
                    quantity,
                    resolved_by: ResolutionSource::Mapping {
                        mapping_id: mapping.mapping_id.clone(),
                    },
                }));
            }
            warn!(
                sku = %sku_code,
                mapping_id = %mapping.mapping_id,
                "映射命中但目录已无该变体,回落为未解析"
            );
        }

        Ok(RowOutcome::Unresolved(UnresolvedRow {
            row_number: row.row_number,
            sku_code,
            quantity,
        }))
    }
}

/// 批次判别
///
/// 跳过状态与未知状态不参与判别;仅当发货前与发货后状态并存时拒绝。
/// 全为跳过/未知时按"已发出"处理(无可导入行,预览自然为空)。
fn classify_batch(
    rows: &[RawOrderRow],
    pending_vocab: &[String],
    dispatched_vocab: &[String],
    skip_vocab: &[String],
) -> EngineResult<BatchKind> {
    let mut pending_found: Vec<String> = Vec::new();
    let mut dispatched_found: Vec<String> = Vec::new();

    for row in rows {
        let Some(status) = row.status_text.as_deref().map(str::trim) else {
            continue;
        };
        if status.is_empty() || contains_status(skip_vocab, status) {
            continue;
        }

        if contains_status(pending_vocab, status) {
            if !contains_status(&pending_found, status) {
                pending_found.push(status.to_string());
            }
        } else if contains_status(dispatched_vocab, status) {
            if !contains_status(&dispatched_found, status) {
                dispatched_found.push(status.to_string());
            }
        }
    }

    if !pending_found.is_empty() && !dispatched_found.is_empty() {
        return Err(EngineError::MixedBatch {
            pending_statuses: pending_found,
            dispatched_statuses: dispatched_found,
        });
    }

    if !pending_found.is_empty() {
        Ok(BatchKind::PendingHandover)
    } else {
        Ok(BatchKind::Dispatched)
    }
}

/// 行处理结果 → 预览(未解析聚合 + 变体汇总)
fn assemble_preview(
    account_name: &str,
    batch_kind: BatchKind,
    rows: &[RawOrderRow],
    outcomes: Vec<RowOutcome>,
) -> ImportPreview {
    let mut resolved_rows = Vec::new();
    let mut skipped_rows = Vec::new();
    let mut invalid_rows = Vec::new();
    // BTreeMap 保证聚合顺序稳定(编码字典序)
    let mut unresolved: BTreeMap<String, UnresolvedCode> = BTreeMap::new();

    for outcome in outcomes {
        match outcome {
            RowOutcome::Parsed(row) => resolved_rows.push(row),
            RowOutcome::Skipped(row) => skipped_rows.push(row),
            RowOutcome::Invalid(row) => invalid_rows.push(row),
            RowOutcome::Unresolved(row) => {
                let entry =
                    unresolved
                        .entry(row.sku_code.clone())
                        .or_insert_with(|| UnresolvedCode {
                            sku_code: row.sku_code.clone(),
                            occurrences: 0,
                            total_quantity: 0,
                            suggestion: parse_sku(&row.sku_code),
                        });
                entry.occurrences += 1;
                entry.total_quantity += row.quantity;
            }
        }
    }

    // 变体汇总(保持首次出现顺序)
    let mut breakdown: Vec<VariantBreakdown> = Vec::new();
    for row in &resolved_rows {
        match breakdown.iter_mut().find(|b| b.variant == row.variant) {
            Some(entry) => {
                entry.total_quantity += row.quantity;
                entry.order_count += 1;
            }
            None => breakdown.push(VariantBreakdown {
                variant: row.variant.clone(),
                total_quantity: row.quantity,
                order_count: 1,
            }),
        }
    }

    debug!(total_rows = rows.len(), "预览装配完成");

    ImportPreview {
        account_name: account_name.to_string(),
        batch_kind,
        resolved_rows,
        unresolved_codes: unresolved.into_values().collect(),
        skipped_rows,
        invalid_rows,
        breakdown,
    }
}
