// ==========================================
// 市场订单接入系统 - 领域层
// ==========================================
// 职责: 实体与类型定义,不含业务流程
// ==========================================

pub mod import;
pub mod mapping;
pub mod order;
pub mod product;
pub mod types;

// 重导出核心实体
pub use import::{
    CommittedRow, DuplicateRow, FailedRow, ImportPreview, ImportReport, InvalidRow, ParsedRow,
    RawOrderRow, ResolutionSource, RowOutcome, SkippedRow, StockEvent, UnresolvedCode,
    UnresolvedRow, VariantBreakdown,
};
pub use mapping::{SkuMapping, SkuPattern};
pub use order::{MarketplaceOrder, StatusChange};
pub use product::{
    ColorVariant, MarketplaceAccount, Product, SizeVariant, StockLockSettings, VariantKey,
    VariantStock,
};
pub use types::{BatchKind, MappingSource, OrderStatus, PipelineStage, StockEventType};
