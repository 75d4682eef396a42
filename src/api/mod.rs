// ==========================================
// 市场订单接入系统 - API层
// ==========================================
// 职责: 面向调用方的粗粒度接口,组装仓储与引擎
// ==========================================

pub mod error;
pub mod import_api;
pub mod order_api;

pub use error::{ApiError, ApiResult};
pub use import_api::{CommitResponse, ImportApi, MappingSelectionRequest};
pub use order_api::{CreateOrderResponse, DeliveredResponse, OrderApi};
