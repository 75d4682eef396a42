// ==========================================
// 市场订单接入系统 - 库存审计流水仓储
// ==========================================
// 职责: stock_event 表的追加与查询
// 红线: 仅追加,不支持更新/删除 —— 审计可追溯
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import::StockEvent;
use crate::domain::product::VariantKey;
use crate::domain::types::StockEventType;
use crate::repository::error::{corrupt_column, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// StockEventRepository - 审计流水接口
// ==========================================
#[async_trait]
pub trait StockEventRepository: Send + Sync {
    /// 追加一条库存事件
    async fn append(&self, event: StockEvent) -> RepositoryResult<()>;

    /// 按变体查询最近事件(时间降序)
    async fn list_by_variant(
        &self,
        key: &VariantKey,
        limit: i64,
    ) -> RepositoryResult<Vec<StockEvent>>;

    /// 最近事件(时间降序)
    async fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<StockEvent>>;
}

// ==========================================
// SqliteStockEventRepository - SQLite 实现
// ==========================================
pub struct SqliteStockEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStockEventRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn row_to_event(row: &Row<'_>) -> rusqlite::Result<StockEvent> {
        let event_type: String = row.get(1)?;
        let created_at: String = row.get(9)?;
        Ok(StockEvent {
            event_id: row.get(0)?,
            event_type: StockEventType::from_str(&event_type)
                .map_err(|e| corrupt_column(1, e))?,
            variant: VariantKey {
                design: row.get(2)?,
                color: row.get(3)?,
                size: row.get(4)?,
            },
            quantity: row.get(5)?,
            order_id: row.get(6)?,
            detail: row.get(7)?,
            created_by: row.get(8)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| corrupt_column(9, e.to_string()))?,
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        SELECT event_id, event_type, design, color, size,
               quantity, order_id, detail, created_by, created_at
        FROM stock_event
    "#;
}

#[async_trait]
impl StockEventRepository for SqliteStockEventRepository {
    async fn append(&self, event: StockEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO stock_event (
                event_id, event_type, design, color, size,
                quantity, order_id, detail, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                event.event_id,
                event.event_type.to_string(),
                event.variant.design,
                event.variant.color,
                event.variant.size,
                event.quantity,
                event.order_id,
                event.detail,
                event.created_by,
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_by_variant(
        &self,
        key: &VariantKey,
        limit: i64,
    ) -> RepositoryResult<Vec<StockEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE design = ?1 AND color = ?2 AND size = ?3 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?4",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![key.design, key.color, key.size, limit.max(1)],
            Self::row_to_event,
        )?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    async fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<StockEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit.max(1)], Self::row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> SqliteStockEventRepository {
        let conn = Connection::open_in_memory().expect("内存库打开失败");
        init_schema(&conn).expect("建表失败");
        SqliteStockEventRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_corrupt_event_type_surfaces_field_error() {
        let repo = repo();
        let event = StockEvent::new(
            StockEventType::Allocate,
            VariantKey::new("D11", "KHAKHI", "M"),
            2,
            None,
            None,
            None,
        );
        repo.append(event.clone()).await.unwrap();

        // 绕过仓储接口直接写坏 event_type 列
        {
            let conn = repo.conn.lock().unwrap();
            conn.execute(
                "UPDATE stock_event SET event_type = 'GARBAGE' WHERE event_id = ?1",
                params![event.event_id],
            )
            .unwrap();
        }

        // 损坏数据必须上浮为字段错误,而不是静默当作 ALLOCATE
        let err = repo.list_recent(10).await.unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));
    }
}
