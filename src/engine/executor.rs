// ==========================================
// 市场订单接入系统 - 导入执行器
// ==========================================
// 职责: 已解析批次的逐行提交(查重 → 建单 → 报告)
// 红线: 按源文件行序提交;已提交行不回滚不重放;
//       首个需确认行处挂起,恢复后从断点继续
// ==========================================

use crate::domain::import::{
    CommittedRow, DuplicateRow, FailedRow, ImportPreview, ImportReport, ParsedRow,
    ResolutionSource,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lifecycle::{
    CreateOrderOutcome, CreateOrderRequest, OrderLifecycle, PendingOrder,
};
use crate::repository::audit_repo::StockEventRepository;
use crate::repository::catalog_repo::InventoryCatalog;
use crate::repository::mapping_repo::SkuMappingStore;
use crate::repository::order_repo::OrderRepository;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// CommitState - 断点续提状态
// ==========================================
// 可序列化: 挂起期间由调用方持有(或落盘),不占引擎状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitState {
    pub account_name: String,
    pub sale_date: NaiveDate,
    pub rows: Vec<ParsedRow>,
    /// 下一个待处理行的下标(挂起行本身)
    pub next_index: usize,
    pub report: ImportReport,
    pub operator: Option<String>,
}

// ==========================================
// CommitProgress - 提交进度
// ==========================================
#[derive(Debug, Clone)]
pub enum CommitProgress {
    Completed(ImportReport),
    /// 在 row 处挂起等待操作员决定
    Suspended {
        state: CommitState,
        pending: PendingOrder,
        row: ParsedRow,
    },
}

// ==========================================
// ConfirmDecision - 操作员对挂起行的决定
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    /// 同意动用主池
    UseMainStock,
    /// 放弃该行(记失败,继续后续行)
    AbortRow,
}

// ==========================================
// ImportExecutor - 执行器
// ==========================================
pub struct ImportExecutor<C, O, A, M>
where
    C: InventoryCatalog,
    O: OrderRepository,
    A: StockEventRepository,
    M: SkuMappingStore,
{
    lifecycle: OrderLifecycle<C, O, A>,
    catalog: Arc<C>,
    mappings: Arc<M>,
}

impl<C, O, A, M> ImportExecutor<C, O, A, M>
where
    C: InventoryCatalog,
    O: OrderRepository,
    A: StockEventRepository,
    M: SkuMappingStore,
{
    pub fn new(catalog: Arc<C>, orders: Arc<O>, events: Arc<A>, mappings: Arc<M>) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(catalog.clone(), orders, events),
            catalog,
            mappings,
        }
    }

    /// 开始提交一个已完全解析的预览
    pub async fn commit(
        &self,
        preview: &ImportPreview,
        sale_date: NaiveDate,
        operator: Option<&str>,
    ) -> EngineResult<CommitProgress> {
        if !preview.fully_resolved() {
            return Err(EngineError::UnresolvedSku {
                codes: preview
                    .unresolved_codes
                    .iter()
                    .map(|c| c.sku_code.clone())
                    .collect(),
            });
        }

        let state = CommitState {
            account_name: preview.account_name.clone(),
            sale_date,
            rows: preview.resolved_rows.clone(),
            next_index: 0,
            report: ImportReport::default(),
            operator: operator.map(str::to_string),
        };

        info!(
            account = %state.account_name,
            rows = state.rows.len(),
            "开始逐行提交"
        );
        self.run(state).await
    }

    /// 恢复挂起的提交
    pub async fn resume(
        &self,
        mut state: CommitState,
        pending: &PendingOrder,
        decision: ConfirmDecision,
    ) -> EngineResult<CommitProgress> {
        let row = state
            .rows
            .get(state.next_index)
            .cloned()
            .ok_or_else(|| EngineError::PendingNotFound(pending.token.clone()))?;

        match decision {
            ConfirmDecision::UseMainStock => {
                let operator = state.operator.clone();
                match self
                    .lifecycle
                    .confirm_use_main(pending, operator.as_deref())
                    .await
                {
                    Ok(CreateOrderOutcome::Created { order, emergency }) => {
                        self.record_success(&mut state, &row, &order.order_id, emergency)
                            .await;
                    }
                    Ok(CreateOrderOutcome::Failed {
                        reserved,
                        main,
                        required,
                        ..
                    }) => {
                        state.report.failed.push(FailedRow {
                            row_number: row.row_number,
                            order_item_id: row.order_item_id.clone(),
                            reason: format!(
                                "库存不足: 预留 {} + 可用 {} < 需求 {}",
                                reserved, main, required
                            ),
                        });
                    }
                    Ok(CreateOrderOutcome::NeedsConfirmation(_)) => {
                        return Err(EngineError::Other(anyhow::anyhow!(
                            "确认路径返回了再次挂起,不应发生"
                        )));
                    }
                    Err(EngineError::DuplicateOrder(order_item_id)) => {
                        state.report.duplicates.push(DuplicateRow {
                            row_number: row.row_number,
                            order_item_id,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
            ConfirmDecision::AbortRow => {
                info!(row = row.row_number, "操作员放弃该行");
                state.report.failed.push(FailedRow {
                    row_number: row.row_number,
                    order_item_id: row.order_item_id.clone(),
                    reason: "预留不足,操作员放弃该行".to_string(),
                });
            }
        }

        state.next_index += 1;
        self.run(state).await
    }

    /// 从 next_index 起逐行处理,直到完成或再次挂起
    async fn run(&self, mut state: CommitState) -> EngineResult<CommitProgress> {
        while state.next_index < state.rows.len() {
            let row = state.rows[state.next_index].clone();

            // 行级查重(观察此前所有行的效应)
            if self.lifecycle.order_item_exists(&row.order_item_id).await? {
                state.report.duplicates.push(DuplicateRow {
                    row_number: row.row_number,
                    order_item_id: row.order_item_id.clone(),
                });
                state.next_index += 1;
                continue;
            }

            let request = CreateOrderRequest {
                account_name: state.account_name.clone(),
                marketplace_order_id: row.external_order_id.clone(),
                order_item_id: row.order_item_id.clone(),
                variant: row.variant.clone(),
                quantity: row.quantity,
                sale_date: state.sale_date,
            };

            let operator = state.operator.clone();
            match self.lifecycle.create_order(request, operator.as_deref()).await {
                Ok(CreateOrderOutcome::Created { order, emergency }) => {
                    self.record_success(&mut state, &row, &order.order_id, emergency)
                        .await;
                }
                Ok(CreateOrderOutcome::NeedsConfirmation(pending)) => {
                    info!(
                        row = row.row_number,
                        variant = %row.variant,
                        "该行需确认动用主池,挂起提交"
                    );
                    return Ok(CommitProgress::Suspended {
                        state,
                        pending,
                        row,
                    });
                }
                Ok(CreateOrderOutcome::Failed {
                    reserved,
                    main,
                    required,
                    ..
                }) => {
                    state.report.failed.push(FailedRow {
                        row_number: row.row_number,
                        order_item_id: row.order_item_id.clone(),
                        reason: format!(
                            "库存不足: 预留 {} + 可用 {} < 需求 {}",
                            reserved, main, required
                        ),
                    });
                }
                Err(EngineError::DuplicateOrder(order_item_id)) => {
                    state.report.duplicates.push(DuplicateRow {
                        row_number: row.row_number,
                        order_item_id,
                    });
                }
                Err(e) => return Err(e),
            }

            state.next_index += 1;
        }

        state.report.finalize();
        info!(
            account = %state.account_name,
            success = state.report.total_success,
            failed = state.report.total_failed,
            duplicates = state.report.total_duplicates,
            "批次提交完成"
        );
        Ok(CommitProgress::Completed(state.report))
    }

    /// 成功行的统一记账: 成功明细 + 映射复用计数 + 低库存提示
    async fn record_success(
        &self,
        state: &mut CommitState,
        row: &ParsedRow,
        order_id: &str,
        emergency: bool,
    ) {
        state.report.success.push(CommittedRow {
            row_number: row.row_number,
            order_id: order_id.to_string(),
            order_item_id: row.order_item_id.clone(),
            variant: row.variant.clone(),
            quantity: row.quantity,
            emergency_transfer: emergency,
        });

        // 映射复用计数是旁路记账,失败不影响提交结果
        if let ResolutionSource::Mapping { mapping_id } = &row.resolved_by {
            if let Err(e) = self.mappings.touch_usage(mapping_id).await {
                warn!(mapping_id = %mapping_id, error = %e, "映射复用计数更新失败");
            }
        }

        // 低库存提示同为旁路,读取失败仅告警
        match self.catalog.find_variant(&row.variant).await {
            Ok(Some(stock)) if stock.below_reorder_point() => {
                state.report.low_stock_variants.push(row.variant.clone());
            }
            Ok(_) => {}
            Err(e) => warn!(variant = %row.variant, error = %e, "低库存检查失败"),
        }
    }
}
