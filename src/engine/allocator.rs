// ==========================================
// 市场订单接入系统 - 库存预留分配器
// ==========================================
// 职责: 双池库存分配决策(预留优先 → 确认动用主池 → 失败)
// 红线: 决策在引擎层,原子读改写在仓储层;拒绝即零变更
// 红线: 每次成功的库存变更都落一条审计流水
// ==========================================

use crate::domain::import::StockEvent;
use crate::domain::product::{VariantKey, VariantStock};
use crate::domain::types::StockEventType;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::audit_repo::StockEventRepository;
use crate::repository::catalog_repo::{ApplyOutcome, InventoryCatalog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// 并发竞争下守卫更新被拒后的重读上限
const MAX_GUARD_RETRIES: usize = 3;

// ==========================================
// ReservedShortfall - 预留不足明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedShortfall {
    pub variant: VariantKey,
    pub reserved_stock: i64,
    pub main_stock: i64,
    pub required: i64,
    /// 需从主池补足的件数 = required - reserved_stock
    pub deficit: i64,
}

// ==========================================
// PendingAllocation - 挂起待确认的分配
// ==========================================
// 令牌式挂起: 不持有任何全局状态,恢复时重读库存重新计算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAllocation {
    pub token: String,
    pub variant: VariantKey,
    pub quantity: i64,
    pub shortfall: ReservedShortfall,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// AllocationOutcome - 分配结果
// ==========================================
#[derive(Debug, Clone)]
pub enum AllocationOutcome {
    /// 分配完成(emergency 表示动用了主池)
    Allocated {
        stock_after: VariantStock,
        emergency: bool,
    },
    /// 预留不足但主池可补,挂起等操作员确认
    NeedsConfirmation(PendingAllocation),
    /// 两池合计仍不足,零变更
    Insufficient {
        variant: VariantKey,
        reserved: i64,
        main: i64,
        required: i64,
    },
}

// ==========================================
// StockAllocator - 分配器接口
// ==========================================
#[async_trait]
pub trait StockAllocator: Send + Sync {
    /// 静默路径: 预留充足直接扣减;不足则挂起或失败(零变更)
    async fn allocate(
        &self,
        key: &VariantKey,
        quantity: i64,
        order_id: Option<&str>,
        operator: Option<&str>,
    ) -> EngineResult<AllocationOutcome>;

    /// 确认路径: 操作员同意动用主池,吃光预留 + 主池补差额
    async fn confirm_use_main(
        &self,
        pending: &PendingAllocation,
        order_id: Option<&str>,
        operator: Option<&str>,
    ) -> EngineResult<AllocationOutcome>;

    /// 回补: 退货/取消/删除时预留池与总量同加
    async fn restore(
        &self,
        key: &VariantKey,
        quantity: i64,
        event_type: StockEventType,
        order_id: Option<&str>,
        operator: Option<&str>,
    ) -> EngineResult<VariantStock>;

    /// 手工补充预留池(主池 → 预留池的口径重分类)
    async fn refill(
        &self,
        key: &VariantKey,
        amount: i64,
        min_required: i64,
        max_threshold: i64,
        operator: Option<&str>,
    ) -> EngineResult<VariantStock>;
}

// ==========================================
// ReservationAllocator - 默认实现
// ==========================================
pub struct ReservationAllocator<C, A>
where
    C: InventoryCatalog,
    A: StockEventRepository,
{
    catalog: Arc<C>,
    events: Arc<A>,
}

impl<C, A> ReservationAllocator<C, A>
where
    C: InventoryCatalog,
    A: StockEventRepository,
{
    pub fn new(catalog: Arc<C>, events: Arc<A>) -> Self {
        Self { catalog, events }
    }

    async fn require_variant(&self, key: &VariantKey) -> EngineResult<VariantStock> {
        self.catalog
            .find_variant(key)
            .await?
            .ok_or_else(|| EngineError::VariantNotFound(key.to_string()))
    }

    /// 按当前计数做一次分配决策(不落库)
    fn decide(stock: &VariantStock, quantity: i64) -> Decision {
        if stock.locked_stock >= quantity {
            return Decision::ReservedOnly;
        }
        let deficit = quantity - stock.locked_stock;
        if stock.available_stock() >= deficit {
            Decision::NeedsMain { deficit }
        } else {
            Decision::Impossible
        }
    }
}

enum Decision {
    ReservedOnly,
    NeedsMain { deficit: i64 },
    Impossible,
}

#[async_trait]
impl<C, A> StockAllocator for ReservationAllocator<C, A>
where
    C: InventoryCatalog,
    A: StockEventRepository,
{
    async fn allocate(
        &self,
        key: &VariantKey,
        quantity: i64,
        order_id: Option<&str>,
        operator: Option<&str>,
    ) -> EngineResult<AllocationOutcome> {
        let mut stock = self.require_variant(key).await?;

        for _ in 0..MAX_GUARD_RETRIES {
            match Self::decide(&stock, quantity) {
                Decision::ReservedOnly => {
                    match self.catalog.apply_allocation(key, quantity, 0).await? {
                        ApplyOutcome::Applied(after) => {
                            self.events
                                .append(StockEvent::new(
                                    StockEventType::Allocate,
                                    key.clone(),
                                    quantity,
                                    order_id.map(str::to_string),
                                    None,
                                    operator.map(str::to_string),
                                ))
                                .await?;
                            info!(variant = %key, quantity, "预留池分配完成");
                            return Ok(AllocationOutcome::Allocated {
                                stock_after: after,
                                emergency: false,
                            });
                        }
                        // 守卫被拒说明计数已被并发修改,用最新计数重新决策
                        ApplyOutcome::Rejected(fresh) => {
                            warn!(variant = %key, "分配守卫被拒,按最新计数重试");
                            stock = fresh;
                        }
                    }
                }
                Decision::NeedsMain { deficit } => {
                    info!(
                        variant = %key,
                        quantity,
                        reserved = stock.locked_stock,
                        deficit,
                        "预留不足,挂起等待确认"
                    );
                    return Ok(AllocationOutcome::NeedsConfirmation(PendingAllocation {
                        token: Uuid::new_v4().to_string(),
                        variant: key.clone(),
                        quantity,
                        shortfall: ReservedShortfall {
                            variant: key.clone(),
                            reserved_stock: stock.locked_stock,
                            main_stock: stock.available_stock(),
                            required: quantity,
                            deficit,
                        },
                        created_at: Utc::now(),
                    }));
                }
                Decision::Impossible => {
                    return Ok(AllocationOutcome::Insufficient {
                        variant: key.clone(),
                        reserved: stock.locked_stock,
                        main: stock.available_stock(),
                        required: quantity,
                    });
                }
            }
        }

        Err(EngineError::Other(anyhow::anyhow!(
            "变体 {} 分配重试超限(持续并发冲突)",
            key
        )))
    }

    async fn confirm_use_main(
        &self,
        pending: &PendingAllocation,
        order_id: Option<&str>,
        operator: Option<&str>,
    ) -> EngineResult<AllocationOutcome> {
        let key = &pending.variant;
        let quantity = pending.quantity;
        // 挂起期间库存可能已变化,按最新计数重新计算两池扣减
        let mut stock = self.require_variant(key).await?;

        for _ in 0..MAX_GUARD_RETRIES {
            let from_reserved = stock.locked_stock.min(quantity);
            let from_main = quantity - from_reserved;

            if stock.available_stock() < from_main {
                return Ok(AllocationOutcome::Insufficient {
                    variant: key.clone(),
                    reserved: stock.locked_stock,
                    main: stock.available_stock(),
                    required: quantity,
                });
            }

            match self
                .catalog
                .apply_allocation(key, from_reserved, from_main)
                .await?
            {
                ApplyOutcome::Applied(after) => {
                    let emergency = from_main > 0;
                    let event_type = if emergency {
                        StockEventType::EmergencyTransfer
                    } else {
                        // 挂起期间预留被补足,实际未动主池
                        StockEventType::Allocate
                    };
                    self.events
                        .append(StockEvent::new(
                            event_type,
                            key.clone(),
                            quantity,
                            order_id.map(str::to_string),
                            emergency.then(|| format!("动用主池 {} 件", from_main)),
                            operator.map(str::to_string),
                        ))
                        .await?;
                    info!(
                        variant = %key,
                        quantity,
                        from_reserved,
                        from_main,
                        "确认分配完成"
                    );
                    return Ok(AllocationOutcome::Allocated {
                        stock_after: after,
                        emergency,
                    });
                }
                ApplyOutcome::Rejected(fresh) => {
                    warn!(variant = %key, "确认分配守卫被拒,按最新计数重试");
                    stock = fresh;
                }
            }
        }

        Err(EngineError::Other(anyhow::anyhow!(
            "变体 {} 确认分配重试超限(持续并发冲突)",
            key
        )))
    }

    async fn restore(
        &self,
        key: &VariantKey,
        quantity: i64,
        event_type: StockEventType,
        order_id: Option<&str>,
        operator: Option<&str>,
    ) -> EngineResult<VariantStock> {
        let after = self.catalog.apply_restore(key, quantity).await?;
        self.events
            .append(StockEvent::new(
                event_type,
                key.clone(),
                quantity,
                order_id.map(str::to_string),
                None,
                operator.map(str::to_string),
            ))
            .await?;
        info!(variant = %key, quantity, event = %event_type, "库存回补完成");
        Ok(after)
    }

    async fn refill(
        &self,
        key: &VariantKey,
        amount: i64,
        min_required: i64,
        max_threshold: i64,
        operator: Option<&str>,
    ) -> EngineResult<VariantStock> {
        if amount < min_required {
            return Err(EngineError::RefillTooSmall {
                amount,
                min_required,
            });
        }

        match self.catalog.refill_lock(key, amount, max_threshold).await? {
            ApplyOutcome::Applied(after) => {
                self.events
                    .append(StockEvent::new(
                        StockEventType::Refill,
                        key.clone(),
                        amount,
                        None,
                        None,
                        operator.map(str::to_string),
                    ))
                    .await?;
                info!(variant = %key, amount, "预留池补充完成");
                Ok(after)
            }
            ApplyOutcome::Rejected(fresh) => {
                // 区分两种拒因: 超上限 vs 总量不够重分类
                if fresh.locked_stock + amount > max_threshold {
                    Err(EngineError::ThresholdExceeded {
                        variant: key.clone(),
                        locked: fresh.locked_stock,
                        amount,
                        max_threshold,
                    })
                } else {
                    Err(EngineError::InsufficientStock {
                        variant: key.clone(),
                        reserved: fresh.locked_stock,
                        main: fresh.available_stock(),
                        required: amount,
                    })
                }
            }
        }
    }
}
