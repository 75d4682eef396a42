// ==========================================
// 市场订单接入系统 - 导入API
// ==========================================
// 职责: 封装一次导入会话(文件读取 → 管线驱动 → 报告)
// 约定: 每账号同一时刻一个导入会话(单逻辑执行者)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, SettingsReader};
use crate::db::open_sqlite_connection;
use crate::domain::import::{ImportPreview, ImportReport, RawOrderRow};
use crate::domain::mapping::SkuPattern;
use crate::domain::product::VariantKey;
use crate::domain::types::{MappingSource, PipelineStage};
use crate::engine::allocator::ReservedShortfall;
use crate::engine::executor::ConfirmDecision;
use crate::engine::file_reader::{rows_from_records, UniversalFileParser};
use crate::engine::pipeline::ImportPipeline;
use crate::engine::resolution::MappingSelection;
use crate::repository::{
    SqliteInventoryCatalog, SqliteOrderRepository, SqliteSkuMappingStore,
    SqliteStockEventRepository,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

type SqlitePipeline = ImportPipeline<
    SqliteSkuMappingStore,
    SqliteInventoryCatalog,
    ConfigManager,
    SqliteOrderRepository,
    SqliteStockEventRepository,
>;

/// 一条人工映射确认(API 入参)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSelectionRequest {
    pub sku_code: String,
    pub design: String,
    pub color: String,
    pub size: String,
}

/// 提交进度响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub stage: PipelineStage,
    /// 管线完成时的终报告
    pub report: Option<ImportReport>,
    /// 挂起时的不足明细(供确认界面展示)
    pub pending_shortfall: Option<ReservedShortfall>,
}

/// 导入API
pub struct ImportApi {
    db_path: String,
    session: AsyncMutex<Option<SqlitePipeline>>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            session: AsyncMutex::new(None),
        }
    }

    /// 组装一条共享连接上的管线(各仓储共用同一连接)
    fn build_pipeline(&self, account_name: &str) -> ApiResult<SqlitePipeline> {
        let conn = open_sqlite_connection(&self.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        let conn: Arc<Mutex<Connection>> = Arc::new(Mutex::new(conn));

        let mappings = Arc::new(SqliteSkuMappingStore::from_connection(conn.clone()));
        let catalog = Arc::new(SqliteInventoryCatalog::from_connection(conn.clone()));
        let orders = Arc::new(SqliteOrderRepository::from_connection(conn.clone()));
        let events = Arc::new(SqliteStockEventRepository::from_connection(conn.clone()));
        let settings = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        );

        Ok(ImportPipeline::new(
            account_name,
            mappings,
            catalog,
            settings,
            orders,
            events,
        ))
    }

    /// 从报表文件开启导入会话并生成预览
    ///
    /// # 参数
    /// - account_name: 导入归属账号
    /// - file_path: CSV/XLSX 文件路径
    pub async fn preview_import_file(
        &self,
        account_name: &str,
        file_path: &str,
    ) -> ApiResult<ImportPreview> {
        let records = UniversalFileParser.parse(file_path)?;

        // 列名映射按配置读取
        let settings = ConfigManager::new(&self.db_path)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let columns = settings
            .get_column_map()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let rows = rows_from_records(records, &columns);
        self.preview_import(account_name, rows).await
    }

    /// 从已构造的原始行开启导入会话并生成预览
    pub async fn preview_import(
        &self,
        account_name: &str,
        rows: Vec<RawOrderRow>,
    ) -> ApiResult<ImportPreview> {
        let mut pipeline = self.build_pipeline(account_name)?;
        let preview = pipeline.load_preview(rows).await?.clone();

        let mut session = self.session.lock().await;
        *session = Some(pipeline);

        info!(account = account_name, "导入会话已开启");
        Ok(preview)
    }

    /// 提交人工映射确认(管线随后做第二次穷尽解析)
    pub async fn resolve_mappings(
        &self,
        source: MappingSource,
        selections: Vec<MappingSelectionRequest>,
    ) -> ApiResult<Option<SkuPattern>> {
        let mut session = self.session.lock().await;
        let pipeline = session
            .as_mut()
            .ok_or_else(|| ApiError::InvalidInput("无进行中的导入会话".to_string()))?;

        let selections = selections
            .into_iter()
            .map(|s| MappingSelection {
                sku_code: s.sku_code,
                variant: VariantKey::new(s.design, s.color, s.size),
            })
            .collect();

        Ok(pipeline.submit_resolutions(source, selections).await?)
    }

    /// 当前会话的预览快照
    pub async fn current_preview(&self) -> ApiResult<ImportPreview> {
        let session = self.session.lock().await;
        session
            .as_ref()
            .and_then(|p| p.preview().cloned())
            .ok_or_else(|| ApiError::InvalidInput("无进行中的导入会话".to_string()))
    }

    /// 终审通过,开始逐行提交
    pub async fn commit_import(
        &self,
        sale_date: NaiveDate,
        operator: Option<&str>,
    ) -> ApiResult<CommitResponse> {
        let mut session = self.session.lock().await;
        let pipeline = session
            .as_mut()
            .ok_or_else(|| ApiError::InvalidInput("无进行中的导入会话".to_string()))?;

        pipeline.start_commit(sale_date, operator).await?;
        Ok(Self::progress_of(pipeline))
    }

    /// 对挂起行作出决定并继续提交
    pub async fn resume_commit(&self, use_main_stock: bool) -> ApiResult<CommitResponse> {
        let mut session = self.session.lock().await;
        let pipeline = session
            .as_mut()
            .ok_or_else(|| ApiError::InvalidInput("无进行中的导入会话".to_string()))?;

        let decision = if use_main_stock {
            ConfirmDecision::UseMainStock
        } else {
            ConfirmDecision::AbortRow
        };
        pipeline.decide_pending(decision).await?;
        Ok(Self::progress_of(pipeline))
    }

    /// 放弃当前会话
    ///
    /// 提交开始前放弃零副作用;提交中放弃不回溯,已提交行成立
    pub async fn abandon(&self) -> ApiResult<()> {
        let mut session = self.session.lock().await;
        if session.take().is_some() {
            info!("导入会话已放弃");
        }
        Ok(())
    }

    fn progress_of(pipeline: &SqlitePipeline) -> CommitResponse {
        CommitResponse {
            stage: pipeline.stage(),
            report: pipeline.report().cloned(),
            pending_shortfall: pipeline
                .pending_confirmation()
                .map(|p| p.shortfall.clone()),
        }
    }
}
