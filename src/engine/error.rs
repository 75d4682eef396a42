// ==========================================
// 市场订单接入系统 - 引擎层错误
// ==========================================
// 职责: 导入/分配/生命周期引擎的错误类型定义
// 约定: 行级可恢复问题进报告结构,此处仅批级/操作级硬错误
// ==========================================

use crate::domain::product::VariantKey;
use crate::domain::types::{OrderStatus, PipelineStage};
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 批次级错误 =====
    #[error("混合批次: 待交接状态 {pending_statuses:?} 与已发出状态 {dispatched_statuses:?} 同时存在,请拆分文件后重新导入")]
    MixedBatch {
        pending_statuses: Vec<String>,
        dispatched_statuses: Vec<String>,
    },

    #[error("存在未解析编码,无法进入终审: {codes:?}")]
    UnresolvedSku { codes: Vec<String> },

    // ===== 库存分配错误 =====
    #[error("库存不足: 变体 {variant} 预留 {reserved} + 可用 {main} < 需求 {required}")]
    InsufficientStock {
        variant: VariantKey,
        reserved: i64,
        main: i64,
        required: i64,
    },

    #[error("超出锁定上限: 变体 {variant} 当前锁定 {locked} + 补充 {amount} > 上限 {max_threshold}")]
    ThresholdExceeded {
        variant: VariantKey,
        locked: i64,
        amount: i64,
        max_threshold: i64,
    },

    #[error("补充数量不足: 申请 {amount} 件,至少需要 {min_required} 件")]
    RefillTooSmall { amount: i64, min_required: i64 },

    #[error("变体不存在: {0}")]
    VariantNotFound(String),

    // ===== 订单生命周期错误 =====
    #[error("订单行重复: order_item_id={0}")]
    DuplicateOrder(String),

    #[error("非法状态迁移: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    // ===== 管线状态错误 =====
    #[error("管线阶段不匹配: 当前 {actual:?},该操作要求 {expected:?}")]
    InvalidStage {
        expected: PipelineStage,
        actual: PipelineStage,
    },

    #[error("无挂起的确认项(令牌不存在或已消费): {0}")]
    PendingNotFound(String),

    // ===== 文件读取错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("不支持的文件格式: {0}")]
    UnsupportedFormat(String),

    #[error("CSV 解析错误: {0}")]
    CsvParse(String),

    #[error("Excel 解析错误: {0}")]
    ExcelParse(String),

    // ===== 底层错误传递 =====
    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置读取错误: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        EngineError::CsvParse(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Other(anyhow::Error::new(e))
    }
}

impl From<Box<dyn std::error::Error>> for EngineError {
    fn from(e: Box<dyn std::error::Error>) -> Self {
        EngineError::Config(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
