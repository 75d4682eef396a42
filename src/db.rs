// ==========================================
// 市场订单接入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建表入口（本系统自持 schema，无独立迁移目录）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
///
/// # 表清单
/// - product / color_variant / size_variant: 商品目录与双池库存计数
/// - marketplace_account: 市场账号配置（只读消费）
/// - sku_mapping: 市场编码 → 内部变体 的确认映射
/// - marketplace_order / order_status_history: 订单与状态流转历史（仅追加）
/// - stock_event: 库存变动审计流水（仅追加）
/// - global_config: 键值配置
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS product (
            design      TEXT PRIMARY KEY,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS color_variant (
            design          TEXT NOT NULL REFERENCES product(design) ON DELETE CASCADE,
            color           TEXT NOT NULL,
            wholesale_price REAL NOT NULL DEFAULT 0,
            retail_price    REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (design, color)
        );

        CREATE TABLE IF NOT EXISTS size_variant (
            design        TEXT NOT NULL,
            color         TEXT NOT NULL,
            size          TEXT NOT NULL,
            current_stock INTEGER NOT NULL DEFAULT 0,
            locked_stock  INTEGER NOT NULL DEFAULT 0,
            reorder_point INTEGER NOT NULL DEFAULT 0,
            updated_at    TEXT,
            PRIMARY KEY (design, color, size),
            FOREIGN KEY (design, color) REFERENCES color_variant(design, color) ON DELETE CASCADE,
            CHECK (locked_stock >= 0 AND locked_stock <= current_stock AND current_stock >= 0)
        );

        CREATE TABLE IF NOT EXISTS marketplace_account (
            account_name TEXT PRIMARY KEY,
            platform     TEXT,
            is_active    INTEGER NOT NULL DEFAULT 1,
            is_default   INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS sku_mapping (
            mapping_id      TEXT PRIMARY KEY,
            marketplace_sku TEXT NOT NULL UNIQUE,
            account_name    TEXT NOT NULL,
            design          TEXT NOT NULL,
            color           TEXT NOT NULL,
            size            TEXT NOT NULL,
            usage_count     INTEGER NOT NULL DEFAULT 0,
            last_used_at    TEXT,
            mapping_source  TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS marketplace_order (
            order_id             TEXT PRIMARY KEY,
            account_name         TEXT NOT NULL,
            marketplace_order_id TEXT,
            order_item_id        TEXT NOT NULL UNIQUE,
            design               TEXT NOT NULL,
            color                TEXT NOT NULL,
            size                 TEXT NOT NULL,
            quantity             INTEGER NOT NULL,
            status               TEXT NOT NULL,
            sale_date            TEXT NOT NULL,
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS order_status_history (
            history_id      TEXT PRIMARY KEY,
            order_id        TEXT NOT NULL REFERENCES marketplace_order(order_id) ON DELETE CASCADE,
            previous_status TEXT,
            new_status      TEXT NOT NULL,
            changed_at      TEXT NOT NULL,
            changed_by      TEXT,
            comment         TEXT
        );

        CREATE TABLE IF NOT EXISTS stock_event (
            event_id   TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            design     TEXT NOT NULL,
            color      TEXT NOT NULL,
            size       TEXT NOT NULL,
            quantity   INTEGER NOT NULL,
            order_id   TEXT,
            detail     TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS global_config (
            config_key   TEXT PRIMARY KEY,
            config_value TEXT NOT NULL,
            updated_at   TEXT
        );

        CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER NOT NULL,
            applied_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_order_status ON marketplace_order(status);
        CREATE INDEX IF NOT EXISTS idx_order_account ON marketplace_order(account_name);
        CREATE INDEX IF NOT EXISTS idx_history_order ON order_status_history(order_id);
        CREATE INDEX IF NOT EXISTS idx_stock_event_variant ON stock_event(design, color, size);
        "#,
    )?;

    // 记录 schema_version（仅在空表时写入）
    let existing = read_schema_version(conn)?;
    if existing.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![CURRENT_SCHEMA_VERSION, chrono::Utc::now().to_rfc3339()],
        )?;
    }

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
