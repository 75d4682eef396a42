// ==========================================
// 市场订单接入系统 - 数据仓储层
// ==========================================
// 职责: 数据访问,不含业务逻辑
// 约定: 接口为 async trait(便于测试替身),SQLite 实现内部同步
// ==========================================

pub mod audit_repo;
pub mod catalog_repo;
pub mod error;
pub mod mapping_repo;
pub mod order_repo;

pub use audit_repo::{SqliteStockEventRepository, StockEventRepository};
pub use catalog_repo::{ApplyOutcome, InventoryCatalog, SqliteInventoryCatalog};
pub use error::{RepositoryError, RepositoryResult};
pub use mapping_repo::{SkuMappingStore, SqliteSkuMappingStore};
pub use order_repo::{OrderRepository, SqliteOrderRepository};
