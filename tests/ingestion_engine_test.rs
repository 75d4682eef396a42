// ==========================================
// 导入摄取引擎 - 集成测试
// ==========================================
// 覆盖: 批次判别 / 行校验 / 解析与映射命中 / 未解析聚合 / 幂等
// ==========================================


use marketplace_oms::domain::import::{RawOrderRow, ResolutionSource};
use marketplace_oms::domain::product::VariantKey;
use marketplace_oms::domain::types::{BatchKind, MappingSource};
use marketplace_oms::engine::error::EngineError;
use marketplace_oms::engine::ingestion::ImportIngestionEngine;
use marketplace_oms::domain::mapping::SkuMapping;
use marketplace_oms::repository::SkuMappingStore;
use test_helpers::{raw_row, setup_db};

fn engine(
    db: &test_helpers::TestDb,
) -> ImportIngestionEngine<
    marketplace_oms::repository::SqliteSkuMappingStore,
    marketplace_oms::repository::SqliteInventoryCatalog,
    marketplace_oms::config::ConfigManager,
> {
    ImportIngestionEngine::new(db.mappings(), db.catalog(), db.settings())
}

#[tokio::test]
async fn test_mixed_batch_rejected_outright() {
    let db = setup_db();
    let engine = engine(&db);

    let rows = vec![
        raw_row(2, "I-1", "D11-KHAKHI_34", 1, "Ready to Ship"),
        raw_row(3, "I-2", "D11-KHAKHI_34", 1, "Shipped"),
    ];

    let err = engine.preview("ACME", &rows).await.unwrap_err();
    match err {
        EngineError::MixedBatch {
            pending_statuses,
            dispatched_statuses,
        } => {
            assert_eq!(pending_statuses, vec!["Ready to Ship".to_string()]);
            assert_eq!(dispatched_statuses, vec!["Shipped".to_string()]);
        }
        other => panic!("应为 MixedBatch,实际: {}", other),
    }
}

#[tokio::test]
async fn test_skip_statuses_do_not_poison_classification() {
    let db = setup_db();
    let engine = engine(&db);

    // Returned 属跳过状态,不参与批次判别
    let rows = vec![
        raw_row(2, "I-1", "D11-KHAKHI_34", 1, "Ready to Ship"),
        raw_row(3, "I-2", "D11-KHAKHI_34", 1, "Returned"),
    ];

    let preview = engine.preview("ACME", &rows).await.unwrap();
    assert_eq!(preview.batch_kind, BatchKind::PendingHandover);
    assert_eq!(preview.resolved_rows.len(), 1);
    assert_eq!(preview.skipped_rows.len(), 1);
    assert_eq!(preview.skipped_rows[0].status_text, "Returned");
}

#[tokio::test]
async fn test_direct_parse_with_numeric_size_conversion() {
    let db = setup_db();
    let engine = engine(&db);

    // 规则1: D11-KHAKHI_34 → D11/KHAKHI/XL(34→XL)
    let rows = vec![raw_row(2, "I-1", "D11-KHAKHI_34", 2, "Shipped")];
    let preview = engine.preview("ACME", &rows).await.unwrap();

    assert_eq!(preview.batch_kind, BatchKind::Dispatched);
    assert_eq!(preview.resolved_rows.len(), 1);
    let row = &preview.resolved_rows[0];
    assert_eq!(row.variant, VariantKey::new("D11", "KHAKHI", "XL"));
    assert_eq!(row.resolved_by, ResolutionSource::DirectParse);
}

#[tokio::test]
async fn test_invalid_rows_keep_row_number_and_reason() {
    let db = setup_db();
    let engine = engine(&db);

    let rows = vec![
        // 未知状态
        raw_row(2, "I-1", "D11-KHAKHI_34", 1, "Weird Status"),
        // 数量非法
        RawOrderRow {
            quantity: Some(0),
            ..raw_row(3, "I-2", "D11-KHAKHI_34", 1, "Shipped")
        },
        // 缺订单行 ID
        RawOrderRow {
            order_item_id: None,
            ..raw_row(4, "I-3", "D11-KHAKHI_34", 1, "Shipped")
        },
        // 缺状态
        RawOrderRow {
            status_text: None,
            ..raw_row(5, "I-4", "D11-KHAKHI_34", 1, "Shipped")
        },
    ];

    let preview = engine.preview("ACME", &rows).await.unwrap();
    assert!(preview.resolved_rows.is_empty());
    assert_eq!(preview.invalid_rows.len(), 4);
    assert_eq!(preview.invalid_rows[0].row_number, 2);
    assert!(preview.invalid_rows[0].reason.contains("Weird Status"));
    assert_eq!(preview.invalid_rows[1].row_number, 3);
}

#[tokio::test]
async fn test_unresolved_codes_aggregate_by_raw_code() {
    let db = setup_db();
    let engine = engine(&db);

    let rows = vec![
        raw_row(2, "I-1", "MYSTERY-CODE", 1, "Shipped"),
        raw_row(3, "I-2", "MYSTERY-CODE", 2, "Shipped"),
        // 可解析但目录不存在: 带建议进未解析
        raw_row(4, "I-3", "D11-MAROON_34", 1, "Shipped"),
    ];

    let preview = engine.preview("ACME", &rows).await.unwrap();
    assert!(!preview.fully_resolved());
    assert_eq!(preview.unresolved_codes.len(), 2);

    let mystery = preview
        .unresolved_codes
        .iter()
        .find(|c| c.sku_code == "MYSTERY-CODE")
        .unwrap();
    assert_eq!(mystery.occurrences, 2);
    assert_eq!(mystery.total_quantity, 3);

    let maroon = preview
        .unresolved_codes
        .iter()
        .find(|c| c.sku_code == "D11-MAROON_34")
        .unwrap();
    let suggestion = maroon.suggestion.as_ref().unwrap();
    assert_eq!(suggestion.design, "D11");
    assert_eq!(suggestion.color, "MAROON");
    assert_eq!(suggestion.size, "XL");
}

#[tokio::test]
async fn test_mapping_hit_resolves_on_second_pass() {
    let db = setup_db();
    let engine = engine(&db);
    let rows = vec![raw_row(2, "I-1", "MYSTERY-CODE", 1, "Shipped")];

    // 第一遍: 未解析
    let preview = engine.preview("ACME", &rows).await.unwrap();
    assert!(!preview.fully_resolved());

    // 人工确认映射后第二遍: 命中映射
    let mapping = db
        .mappings()
        .create(SkuMapping::new(
            "MYSTERY-CODE",
            "ACME",
            VariantKey::new("D11", "BLACK", "L"),
            MappingSource::Manual,
        ))
        .await
        .unwrap();

    let preview = engine.preview("ACME", &rows).await.unwrap();
    assert!(preview.fully_resolved());
    assert_eq!(
        preview.resolved_rows[0].resolved_by,
        ResolutionSource::Mapping {
            mapping_id: mapping.mapping_id.clone()
        }
    );
    assert_eq!(
        preview.resolved_rows[0].variant,
        VariantKey::new("D11", "BLACK", "L")
    );
}

#[tokio::test]
async fn test_mapping_shared_read_across_accounts() {
    let db = setup_db();
    let engine = engine(&db);

    db.mappings()
        .create(SkuMapping::new(
            "MYSTERY-CODE",
            "ACME",
            VariantKey::new("D11", "BLACK", "L"),
            MappingSource::Manual,
        ))
        .await
        .unwrap();

    // 另一账号导入同编码: 读取共享
    let rows = vec![raw_row(2, "I-1", "MYSTERY-CODE", 1, "Shipped")];
    let preview = engine.preview("OTHER-SHOP", &rows).await.unwrap();
    assert!(preview.fully_resolved());
}

#[tokio::test]
async fn test_breakdown_aggregates_per_variant() {
    let db = setup_db();
    let engine = engine(&db);

    let rows = vec![
        raw_row(2, "I-1", "D11-KHAKHI_34", 2, "Shipped"),
        raw_row(3, "I-2", "D11-KHAKHI_34", 1, "Shipped"),
        raw_row(4, "I-3", "D12-NAVY_30", 1, "Shipped"),
    ];

    let preview = engine.preview("ACME", &rows).await.unwrap();
    assert_eq!(preview.breakdown.len(), 2);

    let khakhi_xl = &preview.breakdown[0];
    assert_eq!(khakhi_xl.variant, VariantKey::new("D11", "KHAKHI", "XL"));
    assert_eq!(khakhi_xl.total_quantity, 3);
    assert_eq!(khakhi_xl.order_count, 2);

    let navy_m = &preview.breakdown[1];
    assert_eq!(navy_m.variant, VariantKey::new("D12", "NAVY", "M"));
    assert_eq!(navy_m.total_quantity, 1);
}

#[tokio::test]
async fn test_preview_is_idempotent_and_side_effect_free() {
    let db = setup_db();
    let engine = engine(&db);
    let catalog = db.catalog();

    let rows = vec![
        raw_row(2, "I-1", "D11-KHAKHI_34", 2, "Shipped"),
        raw_row(3, "I-2", "MYSTERY-CODE", 1, "Shipped"),
    ];

    let first = engine.preview("ACME", &rows).await.unwrap();
    let second = engine.preview("ACME", &rows).await.unwrap();

    assert_eq!(first.resolved_rows.len(), second.resolved_rows.len());
    assert_eq!(first.unresolved_codes.len(), second.unresolved_codes.len());

    // 库存分毫未动
    use marketplace_oms::repository::InventoryCatalog;
    let stock = catalog
        .find_variant(&VariantKey::new("D11", "KHAKHI", "XL"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stock.current_stock, 8);
    assert_eq!(stock.locked_stock, 3);
}
