// ==========================================
// 市场订单接入系统 - 业务引擎层
// ==========================================
// 职责: 导入摄取、映射确认、库存分配、订单生命周期、逐行提交
// 约定: 决策在引擎,原子读改写在仓储;行级问题进报告,不抛错
// ==========================================

pub mod allocator;
pub mod error;
pub mod executor;
pub mod file_reader;
pub mod ingestion;
pub mod lifecycle;
pub mod pipeline;
pub mod resolution;

pub use allocator::{
    AllocationOutcome, PendingAllocation, ReservationAllocator, ReservedShortfall, StockAllocator,
};
pub use error::{EngineError, EngineResult};
pub use executor::{CommitProgress, CommitState, ConfirmDecision, ImportExecutor};
pub use file_reader::{rows_from_records, CsvParser, ExcelParser, FileParser, UniversalFileParser};
pub use ingestion::ImportIngestionEngine;
pub use lifecycle::{CreateOrderOutcome, CreateOrderRequest, OrderLifecycle, PendingOrder};
pub use pipeline::ImportPipeline;
pub use resolution::{
    color_options, size_options, variant_exists, MappingResolutionWorkflow, MappingSelection,
    ResolutionOutcome,
};
