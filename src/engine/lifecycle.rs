// ==========================================
// 市场订单接入系统 - 订单生命周期引擎
// ==========================================
// 职责: 创建(含分配) / 状态流转(含回补) / 管理员删除(含冲销)
// 红线: 状态只经此引擎变更;每次流转都追加历史;
//       退货族对库存终态,重复流转不再动库存
// ==========================================

use crate::domain::order::{MarketplaceOrder, StatusChange};
use crate::domain::product::{VariantKey, VariantStock};
use crate::domain::types::{OrderStatus, StockEventType};
use crate::engine::allocator::{
    AllocationOutcome, PendingAllocation, ReservationAllocator, ReservedShortfall, StockAllocator,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::audit_repo::StockEventRepository;
use crate::repository::catalog_repo::InventoryCatalog;
use crate::repository::order_repo::OrderRepository;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ==========================================
// CreateOrderRequest - 建单请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub account_name: String,
    pub marketplace_order_id: Option<String>,
    pub order_item_id: String,
    pub variant: VariantKey,
    pub quantity: i64,
    pub sale_date: NaiveDate,
}

// ==========================================
// PendingOrder - 挂起待确认的建单
// ==========================================
// 携带原始请求与不足明细;恢复时按最新库存重新计算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub token: String,
    pub request: CreateOrderRequest,
    pub shortfall: ReservedShortfall,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// CreateOrderOutcome - 建单结果
// ==========================================
#[derive(Debug, Clone)]
pub enum CreateOrderOutcome {
    /// 建单完成(emergency 表示动用了主池)
    Created {
        order: MarketplaceOrder,
        emergency: bool,
    },
    /// 预留不足,挂起等操作员确认是否动用主池
    NeedsConfirmation(PendingOrder),
    /// 两池合计不足,订单未创建,零库存变更
    Failed {
        variant: VariantKey,
        reserved: i64,
        main: i64,
        required: i64,
    },
}

// ==========================================
// OrderLifecycle - 生命周期引擎
// ==========================================
pub struct OrderLifecycle<C, O, A>
where
    C: InventoryCatalog,
    O: OrderRepository,
    A: StockEventRepository,
{
    orders: Arc<O>,
    allocator: ReservationAllocator<C, A>,
}

impl<C, O, A> OrderLifecycle<C, O, A>
where
    C: InventoryCatalog,
    O: OrderRepository,
    A: StockEventRepository,
{
    pub fn new(catalog: Arc<C>, orders: Arc<O>, events: Arc<A>) -> Self {
        Self {
            orders,
            allocator: ReservationAllocator::new(catalog, events),
        }
    }

    /// 创建订单(初始状态 DISPATCHED,先分配后落库)
    ///
    /// # 流程
    /// 1. order_item_id 查重(重复即拒绝,零变更)
    /// 2. 分配: 预留充足静默扣减;不足挂起;两池不足失败
    /// 3. 订单 + 首条历史同事务落库;落库失败则冲销刚才的分配
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        operator: Option<&str>,
    ) -> EngineResult<CreateOrderOutcome> {
        if self.orders.exists_order_item(&request.order_item_id).await? {
            return Err(EngineError::DuplicateOrder(request.order_item_id));
        }

        match self
            .allocator
            .allocate(&request.variant, request.quantity, None, operator)
            .await?
        {
            AllocationOutcome::Allocated { emergency, .. } => {
                self.persist_created(request, emergency, operator).await
            }
            AllocationOutcome::NeedsConfirmation(pending) => {
                Ok(CreateOrderOutcome::NeedsConfirmation(PendingOrder {
                    token: pending.token,
                    shortfall: pending.shortfall,
                    created_at: pending.created_at,
                    request,
                }))
            }
            AllocationOutcome::Insufficient {
                variant,
                reserved,
                main,
                required,
            } => Ok(CreateOrderOutcome::Failed {
                variant,
                reserved,
                main,
                required,
            }),
        }
    }

    /// 确认动用主池后继续建单
    pub async fn confirm_use_main(
        &self,
        pending: &PendingOrder,
        operator: Option<&str>,
    ) -> EngineResult<CreateOrderOutcome> {
        let request = pending.request.clone();

        // 挂起期间可能已被别处导入同一行
        if self.orders.exists_order_item(&request.order_item_id).await? {
            return Err(EngineError::DuplicateOrder(request.order_item_id));
        }

        let allocation = PendingAllocation {
            token: pending.token.clone(),
            variant: request.variant.clone(),
            quantity: request.quantity,
            shortfall: pending.shortfall.clone(),
            created_at: pending.created_at,
        };

        match self
            .allocator
            .confirm_use_main(&allocation, None, operator)
            .await?
        {
            AllocationOutcome::Allocated { emergency, .. } => {
                self.persist_created(request, emergency, operator).await
            }
            AllocationOutcome::Insufficient {
                variant,
                reserved,
                main,
                required,
            } => Ok(CreateOrderOutcome::Failed {
                variant,
                reserved,
                main,
                required,
            }),
            // confirm 路径不会再次挂起
            AllocationOutcome::NeedsConfirmation(_) => Err(EngineError::Other(anyhow::anyhow!(
                "确认路径返回了再次挂起,不应发生"
            ))),
        }
    }

    async fn persist_created(
        &self,
        request: CreateOrderRequest,
        emergency: bool,
        operator: Option<&str>,
    ) -> EngineResult<CreateOrderOutcome> {
        let order = MarketplaceOrder::new_dispatched(
            request.account_name,
            request.marketplace_order_id,
            request.order_item_id,
            request.variant,
            request.quantity,
            request.sale_date,
        );
        let change = StatusChange::new(
            order.order_id.clone(),
            None,
            OrderStatus::Dispatched,
            operator.map(str::to_string),
            None,
        );

        if let Err(e) = self.orders.insert_with_history(&order, &change).await {
            // 分配已生效,落库失败必须冲销,否则库存凭空少一笔
            error!(order_item = %order.order_item_id, error = %e, "订单落库失败,冲销分配");
            self.allocator
                .restore(
                    &order.variant,
                    order.quantity,
                    StockEventType::Restore,
                    Some(&order.order_id),
                    operator,
                )
                .await?;
            return Err(e.into());
        }

        info!(
            order_id = %order.order_id,
            order_item = %order.order_item_id,
            variant = %order.variant,
            quantity = order.quantity,
            emergency,
            "订单创建完成"
        );
        Ok(CreateOrderOutcome::Created { order, emergency })
    }

    /// 状态流转
    ///
    /// # 规则
    /// - 同状态重入: 仅追加历史(幂等,不动库存)
    /// - DISPATCHED → DELIVERED: 仅状态与历史
    /// - DISPATCHED/DELIVERED → 退货族: 回补预留池后变更状态
    /// - 退货族内互转: 仅状态与历史(库存终态,不再回补)
    /// - 其余: 非法流转
    pub async fn transition(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        operator: Option<&str>,
        comment: Option<String>,
    ) -> EngineResult<MarketplaceOrder> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;
        let from = order.status;

        if from == new_status {
            let change = StatusChange::new(
                order_id,
                Some(from),
                new_status,
                operator.map(str::to_string),
                comment,
            );
            self.orders.append_history(&change).await?;
            info!(order_id, status = %new_status, "同状态重入,仅记历史");
            return Ok(order);
        }

        let restores_stock = match (from, new_status) {
            (OrderStatus::Dispatched, OrderStatus::Delivered) => false,
            (OrderStatus::Dispatched | OrderStatus::Delivered, to) if to.is_return_family() => {
                true
            }
            (from, to) if from.is_return_family() && to.is_return_family() => false,
            (from, to) => {
                return Err(EngineError::InvalidTransition { from, to });
            }
        };

        if restores_stock {
            self.allocator
                .restore(
                    &order.variant,
                    order.quantity,
                    StockEventType::Restore,
                    Some(order_id),
                    operator,
                )
                .await?;
        }

        let change = StatusChange::new(
            order_id,
            Some(from),
            new_status,
            operator.map(str::to_string),
            comment,
        );
        self.orders
            .update_status_with_history(order_id, new_status, &change)
            .await?;

        info!(order_id, from = %from, to = %new_status, restores_stock, "状态流转完成");

        let mut updated = order;
        updated.status = new_status;
        updated.updated_at = Utc::now();
        Ok(updated)
    }

    /// 管理员删除: 先冲销订单当前的库存净效应,再物理删除
    ///
    /// # 返回
    /// - true: 有库存冲销(原状态为 DISPATCHED/DELIVERED)
    /// - false: 无净效应(退货族已回补过)
    pub async fn delete_order(
        &self,
        order_id: &str,
        operator: Option<&str>,
    ) -> EngineResult<bool> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

        let reverses = !order.status.is_return_family();
        if reverses {
            self.allocator
                .restore(
                    &order.variant,
                    order.quantity,
                    StockEventType::DeleteReversal,
                    Some(order_id),
                    operator,
                )
                .await?;
        } else {
            warn!(order_id, status = %order.status, "退货族订单删除,无库存净效应");
        }

        self.orders.delete(order_id).await?;
        info!(order_id, stock_reversed = reverses, "订单已删除");
        Ok(reverses)
    }

    /// 订单历史(升序)
    pub async fn history(&self, order_id: &str) -> EngineResult<Vec<StatusChange>> {
        Ok(self.orders.list_history(order_id).await?)
    }

    /// 手工补充预留池(送达后的建议性操作,独立于状态流转)
    pub async fn refill_lock(
        &self,
        key: &VariantKey,
        amount: i64,
        min_required: i64,
        max_threshold: i64,
        operator: Option<&str>,
    ) -> EngineResult<VariantStock> {
        self.allocator
            .refill(key, amount, min_required, max_threshold, operator)
            .await
    }

    pub async fn find_order(&self, order_id: &str) -> EngineResult<Option<MarketplaceOrder>> {
        Ok(self.orders.find_by_id(order_id).await?)
    }

    pub async fn order_item_exists(&self, order_item_id: &str) -> EngineResult<bool> {
        Ok(self.orders.exists_order_item(order_item_id).await?)
    }
}
