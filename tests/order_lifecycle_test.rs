// ==========================================
// 订单生命周期引擎 - 集成测试
// ==========================================
// 覆盖: 建单 / 查重 / 状态机合法性 / 回补 / 删除冲销 / 历史追加
// ==========================================


use chrono::NaiveDate;
use marketplace_oms::domain::product::VariantKey;
use marketplace_oms::domain::types::{OrderStatus, StockEventType};
use marketplace_oms::engine::error::EngineError;
use marketplace_oms::engine::lifecycle::{
    CreateOrderOutcome, CreateOrderRequest, OrderLifecycle,
};
use marketplace_oms::repository::{InventoryCatalog, StockEventRepository};
use test_helpers::setup_db;

fn khakhi_m() -> VariantKey {
    VariantKey::new("D11", "KHAKHI", "M")
}

fn request(order_item_id: &str, quantity: i64) -> CreateOrderRequest {
    CreateOrderRequest {
        account_name: "ACME".to_string(),
        marketplace_order_id: Some("OD-1".to_string()),
        order_item_id: order_item_id.to_string(),
        variant: khakhi_m(),
        quantity,
        sale_date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
    }
}

fn lifecycle(
    db: &test_helpers::TestDb,
) -> OrderLifecycle<
    marketplace_oms::repository::SqliteInventoryCatalog,
    marketplace_oms::repository::SqliteOrderRepository,
    marketplace_oms::repository::SqliteStockEventRepository,
> {
    OrderLifecycle::new(db.catalog(), db.orders(), db.events())
}

async fn create_dispatched(
    lifecycle: &OrderLifecycle<
        marketplace_oms::repository::SqliteInventoryCatalog,
        marketplace_oms::repository::SqliteOrderRepository,
        marketplace_oms::repository::SqliteStockEventRepository,
    >,
    order_item_id: &str,
    quantity: i64,
) -> String {
    match lifecycle
        .create_order(request(order_item_id, quantity), Some("tester"))
        .await
        .unwrap()
    {
        CreateOrderOutcome::Created { order, .. } => order.order_id,
        other => panic!("应为 Created,实际: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_order_allocates_and_writes_first_history() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);

    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    let order = lifecycle.find_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Dispatched);
    assert_eq!(order.quantity, 3);

    let history = lifecycle.history(&order_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_status, None);
    assert_eq!(history[0].new_status, OrderStatus::Dispatched);

    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 7);
    assert_eq!(stock.locked_stock, 2);
}

#[tokio::test]
async fn test_duplicate_order_item_rejected_before_allocation() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);

    create_dispatched(&lifecycle, "ITEM-1", 2).await;
    let err = lifecycle
        .create_order(request("ITEM-1", 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateOrder(_)));

    // 第二次未再扣库存
    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 8);
}

#[tokio::test]
async fn test_failed_creation_leaves_no_order_and_no_stock_change() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);

    let outcome = lifecycle
        .create_order(request("ITEM-1", 99), None)
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOrderOutcome::Failed { .. }));

    assert!(!lifecycle.order_item_exists("ITEM-1").await.unwrap());
    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 10);
    assert_eq!(stock.locked_stock, 5);
}

#[tokio::test]
async fn test_delivered_transition_does_not_touch_stock() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    let order = lifecycle
        .transition(&order_id, OrderStatus::Delivered, Some("tester"), None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);

    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 7);
    assert_eq!(stock.locked_stock, 2);

    let history = lifecycle.history(&order_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].previous_status, Some(OrderStatus::Dispatched));
    assert_eq!(history[1].new_status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_return_restores_reserved_pool() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    lifecycle
        .transition(&order_id, OrderStatus::Returned, None, Some("客户退回".to_string()))
        .await
        .unwrap();

    // 回补后回到建单前
    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 10);
    assert_eq!(stock.locked_stock, 5);

    let events = db.events().list_by_variant(&khakhi_m(), 10).await.unwrap();
    assert_eq!(events[0].event_type, StockEventType::Restore);
}

#[tokio::test]
async fn test_return_family_is_terminal_for_stock() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    lifecycle
        .transition(&order_id, OrderStatus::Returned, None, None)
        .await
        .unwrap();
    // 退货族内互转: 状态变,库存不再动
    lifecycle
        .transition(&order_id, OrderStatus::WrongReturn, None, None)
        .await
        .unwrap();

    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 10);
    assert_eq!(stock.locked_stock, 5);

    let order = lifecycle.find_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::WrongReturn);
}

#[tokio::test]
async fn test_same_status_reentry_appends_history_only() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    lifecycle
        .transition(
            &order_id,
            OrderStatus::Dispatched,
            Some("tester"),
            Some("重复同步".to_string()),
        )
        .await
        .unwrap();

    let history = lifecycle.history(&order_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].previous_status, Some(OrderStatus::Dispatched));
    assert_eq!(history[1].comment.as_deref(), Some("重复同步"));

    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 7);
}

#[tokio::test]
async fn test_illegal_transitions_rejected() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    lifecycle
        .transition(&order_id, OrderStatus::Returned, None, None)
        .await
        .unwrap();

    // 退货族 → 发货/送达 非法
    let err = lifecycle
        .transition(&order_id, OrderStatus::Delivered, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: OrderStatus::Returned,
            to: OrderStatus::Delivered,
        }
    ));
}

#[tokio::test]
async fn test_delete_dispatched_reverses_stock() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    let reversed = lifecycle.delete_order(&order_id, Some("admin")).await.unwrap();
    assert!(reversed);

    assert!(lifecycle.find_order(&order_id).await.unwrap().is_none());
    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 10);
    assert_eq!(stock.locked_stock, 5);

    let events = db.events().list_by_variant(&khakhi_m(), 10).await.unwrap();
    assert_eq!(events[0].event_type, StockEventType::DeleteReversal);
}

#[tokio::test]
async fn test_delete_returned_order_has_no_net_effect() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    lifecycle
        .transition(&order_id, OrderStatus::Returned, None, None)
        .await
        .unwrap();
    let reversed = lifecycle.delete_order(&order_id, Some("admin")).await.unwrap();
    assert!(!reversed);

    // 回补只发生过一次
    let stock = db.catalog().find_variant(&khakhi_m()).await.unwrap().unwrap();
    assert_eq!(stock.current_stock, 10);
    assert_eq!(stock.locked_stock, 5);
}

#[tokio::test]
async fn test_delivered_then_refill_lock() {
    let db = setup_db();
    let lifecycle = lifecycle(&db);
    let order_id = create_dispatched(&lifecycle, "ITEM-1", 3).await;

    lifecycle
        .transition(&order_id, OrderStatus::Delivered, None, None)
        .await
        .unwrap();

    // 送达后的建议性补充: 把送达件数重新锁回预留池
    let stock = lifecycle
        .refill_lock(&khakhi_m(), 3, 1, 50, Some("tester"))
        .await
        .unwrap();
    assert_eq!(stock.locked_stock, 5);
    assert_eq!(stock.current_stock, 7);
}
