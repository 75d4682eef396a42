// ==========================================
// 市场订单接入系统 - 核心库
// ==========================================
// 依据: 订单接入流程设计 v0.2
// 技术栈: Rust + SQLite
// 系统定位: 交互式导入管线 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// SKU 解析 - 纯函数规则解析与模板推断
pub mod sku;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchKind, MappingSource, OrderStatus, PipelineStage, StockEventType};

// 领域实体
pub use domain::{
    ImportPreview, ImportReport, MarketplaceOrder, Product, RawOrderRow, SkuMapping, SkuPattern,
    StatusChange, StockEvent, VariantKey, VariantStock,
};

// 引擎
pub use engine::{
    AllocationOutcome, CommitProgress, ConfirmDecision, CreateOrderOutcome, CreateOrderRequest,
    ImportExecutor, ImportIngestionEngine, ImportPipeline, MappingResolutionWorkflow,
    OrderLifecycle, ReservationAllocator, StockAllocator,
};

// API
pub use api::{ImportApi, OrderApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "电商市场订单接入系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================

// 确保编译时所有模块可见
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
