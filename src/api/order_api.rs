// ==========================================
// 市场订单接入系统 - 订单API
// ==========================================
// 职责: 封装单笔订单的创建/流转/删除与预留池手工操作
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, SettingsReader};
use crate::db::open_sqlite_connection;
use crate::domain::order::{MarketplaceOrder, StatusChange};
use crate::domain::product::{VariantKey, VariantStock};
use crate::domain::types::OrderStatus;
use crate::engine::lifecycle::{
    CreateOrderOutcome, CreateOrderRequest, OrderLifecycle, PendingOrder,
};
use crate::repository::{
    SqliteInventoryCatalog, SqliteOrderRepository, SqliteStockEventRepository,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::warn;

type SqliteLifecycle =
    OrderLifecycle<SqliteInventoryCatalog, SqliteOrderRepository, SqliteStockEventRepository>;

/// 建单响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    /// CREATED / NEEDS_CONFIRMATION / FAILED
    pub outcome: String,
    pub order: Option<MarketplaceOrder>,
    /// 本单是否动用了主池
    pub emergency_transfer: bool,
    /// 挂起令牌与明细(outcome=NEEDS_CONFIRMATION 时)
    pub pending: Option<PendingOrder>,
    /// 失败原因(outcome=FAILED 时)
    pub failure_reason: Option<String>,
}

/// 送达+建议性补充 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveredResponse {
    pub order: MarketplaceOrder,
    /// 补充结果说明(None 表示未申请补充)
    pub refill_note: Option<String>,
}

/// 订单API
pub struct OrderApi {
    db_path: String,
}

impl OrderApi {
    /// 创建新的OrderApi实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    fn build_lifecycle(&self) -> ApiResult<SqliteLifecycle> {
        let conn = open_sqlite_connection(&self.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        let conn: Arc<Mutex<Connection>> = Arc::new(Mutex::new(conn));

        let catalog = Arc::new(SqliteInventoryCatalog::from_connection(conn.clone()));
        let orders = Arc::new(SqliteOrderRepository::from_connection(conn.clone()));
        let events = Arc::new(SqliteStockEventRepository::from_connection(conn));
        Ok(OrderLifecycle::new(catalog, orders, events))
    }

    fn outcome_to_response(outcome: CreateOrderOutcome) -> CreateOrderResponse {
        match outcome {
            CreateOrderOutcome::Created { order, emergency } => CreateOrderResponse {
                outcome: "CREATED".to_string(),
                order: Some(order),
                emergency_transfer: emergency,
                pending: None,
                failure_reason: None,
            },
            CreateOrderOutcome::NeedsConfirmation(pending) => CreateOrderResponse {
                outcome: "NEEDS_CONFIRMATION".to_string(),
                order: None,
                emergency_transfer: false,
                pending: Some(pending),
                failure_reason: None,
            },
            CreateOrderOutcome::Failed {
                variant,
                reserved,
                main,
                required,
            } => CreateOrderResponse {
                outcome: "FAILED".to_string(),
                order: None,
                emergency_transfer: false,
                pending: None,
                failure_reason: Some(format!(
                    "库存不足: 变体 {} 预留 {} + 可用 {} < 需求 {}",
                    variant, reserved, main, required
                )),
            },
        }
    }

    /// 手工建单(初始状态 DISPATCHED)
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        operator: Option<&str>,
    ) -> ApiResult<CreateOrderResponse> {
        let lifecycle = self.build_lifecycle()?;
        let outcome = lifecycle.create_order(request, operator).await?;
        Ok(Self::outcome_to_response(outcome))
    }

    /// 确认动用主池,继续完成挂起的建单
    pub async fn confirm_use_main_stock(
        &self,
        pending: PendingOrder,
        operator: Option<&str>,
    ) -> ApiResult<CreateOrderResponse> {
        let lifecycle = self.build_lifecycle()?;
        let outcome = lifecycle.confirm_use_main(&pending, operator).await?;
        Ok(Self::outcome_to_response(outcome))
    }

    /// 状态流转
    pub async fn transition_order_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        operator: Option<&str>,
        comment: Option<String>,
    ) -> ApiResult<MarketplaceOrder> {
        let lifecycle = self.build_lifecycle()?;
        Ok(lifecycle
            .transition(order_id, new_status, operator, comment)
            .await?)
    }

    /// 标记送达,可选同时发起建议性预留池补充
    ///
    /// # 说明
    /// - 补充与送达相互独立: 补充被拒或失败不回滚送达
    pub async fn mark_delivered_with_refill(
        &self,
        order_id: &str,
        refill_amount: Option<i64>,
        operator: Option<&str>,
    ) -> ApiResult<DeliveredResponse> {
        let lifecycle = self.build_lifecycle()?;
        let order = lifecycle
            .transition(order_id, OrderStatus::Delivered, operator, None)
            .await?;

        let refill_note = match refill_amount {
            None => None,
            Some(amount) => {
                let settings = ConfigManager::new(&self.db_path)
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;
                let lock_settings = settings
                    .get_stock_lock_settings()
                    .await
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;

                match lifecycle
                    .refill_lock(
                        &order.variant,
                        amount,
                        1,
                        lock_settings.max_threshold,
                        operator,
                    )
                    .await
                {
                    Ok(stock) => Some(format!(
                        "已补充 {} 件,锁定 {} / 总量 {}",
                        amount, stock.locked_stock, stock.current_stock
                    )),
                    Err(e) => {
                        warn!(order_id, error = %e, "送达后的建议性补充失败(不影响送达)");
                        Some(format!("补充失败: {}", e))
                    }
                }
            }
        };

        Ok(DeliveredResponse { order, refill_note })
    }

    /// 手工补充预留池
    pub async fn refill_lock(
        &self,
        variant: VariantKey,
        amount: i64,
        min_required: i64,
        operator: Option<&str>,
    ) -> ApiResult<VariantStock> {
        let settings = ConfigManager::new(&self.db_path)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let lock_settings = settings
            .get_stock_lock_settings()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let lifecycle = self.build_lifecycle()?;
        Ok(lifecycle
            .refill_lock(
                &variant,
                amount,
                min_required,
                lock_settings.max_threshold,
                operator,
            )
            .await?)
    }

    /// 管理员删除(先冲销库存净效应)
    ///
    /// # 返回
    /// - true: 发生了库存冲销
    pub async fn delete_order(&self, order_id: &str, operator: Option<&str>) -> ApiResult<bool> {
        let lifecycle = self.build_lifecycle()?;
        Ok(lifecycle.delete_order(order_id, operator).await?)
    }

    /// 订单状态历史(升序)
    pub async fn order_history(&self, order_id: &str) -> ApiResult<Vec<StatusChange>> {
        let lifecycle = self.build_lifecycle()?;
        Ok(lifecycle.history(order_id).await?)
    }
}
