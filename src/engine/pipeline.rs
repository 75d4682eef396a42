// ==========================================
// 市场订单接入系统 - 导入管线状态机
// ==========================================
// 职责: 预览 → 映射确认 → 终审 → 提交 → 完成 的显式状态机
// 约定: 每个操作员动作对应一个迁移函数;阶段不符即拒绝
// 红线: Committing 之前随时可放弃且零副作用;
//       开始提交后放弃不回溯,已提交行成立
// ==========================================

use crate::config::settings_trait::SettingsReader;
use crate::domain::import::{ImportPreview, ImportReport, RawOrderRow};
use crate::domain::mapping::SkuPattern;
use crate::domain::types::{MappingSource, PipelineStage};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::executor::{CommitProgress, CommitState, ConfirmDecision, ImportExecutor};
use crate::engine::ingestion::ImportIngestionEngine;
use crate::engine::lifecycle::PendingOrder;
use crate::engine::resolution::{MappingResolutionWorkflow, MappingSelection};
use crate::repository::audit_repo::StockEventRepository;
use crate::repository::catalog_repo::InventoryCatalog;
use crate::repository::mapping_repo::SkuMappingStore;
use crate::repository::order_repo::OrderRepository;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

// ==========================================
// ImportPipeline - 单账号单次导入的管线
// ==========================================
// 单逻辑执行者模型: 一个管线实例驱动一次导入,人机交互边界挂起
pub struct ImportPipeline<M, C, S, O, A>
where
    M: SkuMappingStore,
    C: InventoryCatalog,
    S: SettingsReader,
    O: OrderRepository,
    A: StockEventRepository,
{
    account_name: String,
    stage: PipelineStage,

    ingestion: ImportIngestionEngine<M, C, S>,
    resolution: MappingResolutionWorkflow<M, C>,
    executor: ImportExecutor<C, O, A, M>,

    raw_rows: Vec<RawOrderRow>,
    preview: Option<ImportPreview>,
    suspended: Option<(CommitState, PendingOrder)>,
    report: Option<ImportReport>,
}

impl<M, C, S, O, A> ImportPipeline<M, C, S, O, A>
where
    M: SkuMappingStore,
    C: InventoryCatalog,
    S: SettingsReader,
    O: OrderRepository,
    A: StockEventRepository,
{
    pub fn new(
        account_name: impl Into<String>,
        mappings: Arc<M>,
        catalog: Arc<C>,
        settings: Arc<S>,
        orders: Arc<O>,
        events: Arc<A>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            stage: PipelineStage::Previewing,
            ingestion: ImportIngestionEngine::new(
                mappings.clone(),
                catalog.clone(),
                settings,
            ),
            resolution: MappingResolutionWorkflow::new(mappings.clone(), catalog.clone()),
            executor: ImportExecutor::new(catalog, orders, events, mappings),
            raw_rows: Vec::new(),
            preview: None,
            suspended: None,
            report: None,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn preview(&self) -> Option<&ImportPreview> {
        self.preview.as_ref()
    }

    pub fn report(&self) -> Option<&ImportReport> {
        self.report.as_ref()
    }

    fn require_stage(&self, expected: PipelineStage) -> EngineResult<()> {
        if self.stage != expected {
            return Err(EngineError::InvalidStage {
                expected,
                actual: self.stage,
            });
        }
        Ok(())
    }

    /// [Previewing] 载入原始行并生成预览
    ///
    /// 全部解析 → 直接进入终审;有未解析编码 → 进入映射确认
    pub async fn load_preview(
        &mut self,
        rows: Vec<RawOrderRow>,
    ) -> EngineResult<&ImportPreview> {
        self.require_stage(PipelineStage::Previewing)?;

        let preview = self.ingestion.preview(&self.account_name, &rows).await?;
        self.stage = if preview.fully_resolved() {
            PipelineStage::FinalReview
        } else {
            PipelineStage::ResolvingMappings
        };
        info!(stage = %self.stage, "预览载入完成");

        self.raw_rows = rows;
        Ok(&*self.preview.insert(preview))
    }

    /// [ResolvingMappings] 提交人工映射确认,并做第二次穷尽解析
    ///
    /// 第二次解析仍有未解析编码时大声失败(不静默丢行),阶段不变
    pub async fn submit_resolutions(
        &mut self,
        source: MappingSource,
        selections: Vec<MappingSelection>,
    ) -> EngineResult<Option<SkuPattern>> {
        self.require_stage(PipelineStage::ResolvingMappings)?;

        let outcome = self
            .resolution
            .resolve_all(&self.account_name, source, selections)
            .await?;

        let preview = self
            .ingestion
            .preview(&self.account_name, &self.raw_rows)
            .await?;
        if !preview.fully_resolved() {
            let codes = preview
                .unresolved_codes
                .iter()
                .map(|c| c.sku_code.clone())
                .collect();
            self.preview = Some(preview);
            return Err(EngineError::UnresolvedSku { codes });
        }

        self.preview = Some(preview);
        self.stage = PipelineStage::FinalReview;
        info!("映射确认完毕,进入终审");
        Ok(outcome.pattern_proposal)
    }

    /// [FinalReview] 终审通过,开始逐行提交
    pub async fn start_commit(
        &mut self,
        sale_date: NaiveDate,
        operator: Option<&str>,
    ) -> EngineResult<PipelineStage> {
        self.require_stage(PipelineStage::FinalReview)?;
        let preview = self
            .preview
            .as_ref()
            .ok_or_else(|| EngineError::Other(anyhow::anyhow!("终审阶段缺少预览")))?;

        self.stage = PipelineStage::Committing;
        let progress = self.executor.commit(preview, sale_date, operator).await?;
        self.apply_progress(progress);
        Ok(self.stage)
    }

    /// [Committing] 操作员对挂起行作出决定,从断点继续
    pub async fn decide_pending(
        &mut self,
        decision: ConfirmDecision,
    ) -> EngineResult<PipelineStage> {
        self.require_stage(PipelineStage::Committing)?;
        let (state, pending) = self
            .suspended
            .take()
            .ok_or_else(|| EngineError::PendingNotFound("无挂起行".to_string()))?;

        let progress = self.executor.resume(state, &pending, decision).await?;
        self.apply_progress(progress);
        Ok(self.stage)
    }

    /// 当前挂起行的不足明细(供确认界面展示)
    pub fn pending_confirmation(&self) -> Option<&PendingOrder> {
        self.suspended.as_ref().map(|(_, pending)| pending)
    }

    fn apply_progress(&mut self, progress: CommitProgress) {
        match progress {
            CommitProgress::Completed(report) => {
                self.report = Some(report);
                self.suspended = None;
                self.stage = PipelineStage::Done;
                info!("管线完成");
            }
            CommitProgress::Suspended { state, pending, .. } => {
                self.suspended = Some((state, pending));
                info!("提交挂起,等待操作员决定");
            }
        }
    }
}
