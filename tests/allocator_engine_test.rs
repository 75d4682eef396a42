// ==========================================
// 库存预留分配器 - 集成测试
// ==========================================
// 覆盖: 静默路径 / 确认路径 / 不足失败 / 回补逆操作 / 手工补充
// ==========================================


use marketplace_oms::domain::product::VariantKey;
use marketplace_oms::domain::types::StockEventType;
use marketplace_oms::engine::allocator::{
    AllocationOutcome, ReservationAllocator, StockAllocator,
};
use marketplace_oms::engine::error::EngineError;
use marketplace_oms::repository::{InventoryCatalog, StockEventRepository};
use test_helpers::setup_db;

fn khakhi_m() -> VariantKey {
    VariantKey::new("D11", "KHAKHI", "M")
}

#[tokio::test]
async fn test_allocate_silent_path_from_reserved() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    // 预留 5 >= 需求 3: 静默扣减
    let outcome = allocator
        .allocate(&khakhi_m(), 3, Some("O-1"), Some("tester"))
        .await
        .unwrap();

    match outcome {
        AllocationOutcome::Allocated {
            stock_after,
            emergency,
        } => {
            assert!(!emergency);
            assert_eq!(stock_after.current_stock, 7);
            assert_eq!(stock_after.locked_stock, 2);
        }
        other => panic!("应为 Allocated,实际: {:?}", other),
    }

    // 落了一条 ALLOCATE 流水
    let events = db.events().list_by_variant(&khakhi_m(), 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, StockEventType::Allocate);
    assert_eq!(events[0].quantity, 3);
    assert_eq!(events[0].order_id.as_deref(), Some("O-1"));
}

#[tokio::test]
async fn test_allocate_needs_confirmation_without_mutation() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    // 预留 5 < 需求 8,可用 5 >= 差额 3: 挂起,零变更
    let outcome = allocator.allocate(&khakhi_m(), 8, None, None).await.unwrap();

    let pending = match outcome {
        AllocationOutcome::NeedsConfirmation(p) => p,
        other => panic!("应为 NeedsConfirmation,实际: {:?}", other),
    };
    assert_eq!(pending.shortfall.reserved_stock, 5);
    assert_eq!(pending.shortfall.main_stock, 5);
    assert_eq!(pending.shortfall.required, 8);
    assert_eq!(pending.shortfall.deficit, 3);

    // 挂起不动库存
    let stock = catalog.find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 10);
    assert_eq!(stock.locked_stock, 5);
    assert!(db.events().list_by_variant(&khakhi_m(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_confirm_use_main_consumes_all_reserved_plus_deficit() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    let pending = match allocator.allocate(&khakhi_m(), 8, None, None).await.unwrap() {
        AllocationOutcome::NeedsConfirmation(p) => p,
        other => panic!("应为 NeedsConfirmation,实际: {:?}", other),
    };

    let outcome = allocator
        .confirm_use_main(&pending, Some("O-2"), Some("tester"))
        .await
        .unwrap();

    match outcome {
        AllocationOutcome::Allocated {
            stock_after,
            emergency,
        } => {
            assert!(emergency);
            // 预留吃光(5),主池补 3,总量 10-8=2
            assert_eq!(stock_after.locked_stock, 0);
            assert_eq!(stock_after.current_stock, 2);
        }
        other => panic!("应为 Allocated,实际: {:?}", other),
    }

    let events = db.events().list_by_variant(&khakhi_m(), 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, StockEventType::EmergencyTransfer);
    assert!(events[0].detail.as_deref().unwrap().contains("3"));
}

#[tokio::test]
async fn test_allocate_insufficient_reports_both_pools() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    // 需求 20 > 预留 5 + 可用 5: 失败,零变更
    let outcome = allocator.allocate(&khakhi_m(), 20, None, None).await.unwrap();

    match outcome {
        AllocationOutcome::Insufficient {
            reserved,
            main,
            required,
            ..
        } => {
            assert_eq!(reserved, 5);
            assert_eq!(main, 5);
            assert_eq!(required, 20);
        }
        other => panic!("应为 Insufficient,实际: {:?}", other),
    }

    let stock = catalog.find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 10);
    assert_eq!(stock.locked_stock, 5);
}

#[tokio::test]
async fn test_restore_is_inverse_of_allocate() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    allocator.allocate(&khakhi_m(), 3, None, None).await.unwrap();
    let after = allocator
        .restore(&khakhi_m(), 3, StockEventType::Restore, None, None)
        .await
        .unwrap();

    // 回到分配前
    assert_eq!(after.current_stock, 10);
    assert_eq!(after.locked_stock, 5);

    let events = db.events().list_by_variant(&khakhi_m(), 10).await.unwrap();
    assert_eq!(events.len(), 2);
    // 降序: 最近的是 RESTORE
    assert_eq!(events[0].event_type, StockEventType::Restore);
}

#[tokio::test]
async fn test_restore_always_credits_reserved_pool() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    // 经确认路径动用主池后回补: 仍然全额记入预留池
    let pending = match allocator.allocate(&khakhi_m(), 8, None, None).await.unwrap() {
        AllocationOutcome::NeedsConfirmation(p) => p,
        other => panic!("应为 NeedsConfirmation,实际: {:?}", other),
    };
    allocator.confirm_use_main(&pending, None, None).await.unwrap();

    let after = allocator
        .restore(&khakhi_m(), 8, StockEventType::Restore, None, None)
        .await
        .unwrap();
    assert_eq!(after.current_stock, 10);
    // 原预留 5,回补后预留变 8(不按来源拆分)
    assert_eq!(after.locked_stock, 8);
}

#[tokio::test]
async fn test_refill_moves_main_to_reserved() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    let after = allocator
        .refill(&khakhi_m(), 2, 1, 50, Some("tester"))
        .await
        .unwrap();

    // 仅口径重分类: 锁定 +2,总量不变
    assert_eq!(after.locked_stock, 7);
    assert_eq!(after.current_stock, 10);

    let events = db.events().list_by_variant(&khakhi_m(), 10).await.unwrap();
    assert_eq!(events[0].event_type, StockEventType::Refill);
}

#[tokio::test]
async fn test_refill_rejects_below_min_required() {
    let db = setup_db();
    let allocator = ReservationAllocator::new(db.catalog(), db.events());

    let err = allocator.refill(&khakhi_m(), 1, 3, 50, None).await.unwrap_err();
    assert!(matches!(err, EngineError::RefillTooSmall { amount: 1, min_required: 3 }));
}

#[tokio::test]
async fn test_refill_rejects_over_threshold() {
    let db = setup_db();
    let catalog = db.catalog();
    let allocator = ReservationAllocator::new(catalog.clone(), db.events());

    // 5 + 3 > 上限 6
    let err = allocator.refill(&khakhi_m(), 3, 1, 6, None).await.unwrap_err();
    assert!(matches!(err, EngineError::ThresholdExceeded { .. }));

    // 零变更
    let stock = catalog.find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.locked_stock, 5);
}

#[tokio::test]
async fn test_refill_rejects_beyond_physical_stock() {
    let db = setup_db();
    let allocator = ReservationAllocator::new(db.catalog(), db.events());

    // 5 + 6 = 11 > 总量 10,阈值放行也不行
    let err = allocator.refill(&khakhi_m(), 6, 1, 50, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));
}

#[tokio::test]
async fn test_allocate_unknown_variant() {
    let db = setup_db();
    let allocator = ReservationAllocator::new(db.catalog(), db.events());

    let err = allocator
        .allocate(&VariantKey::new("D99", "RED", "M"), 1, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::VariantNotFound(_)));
}
