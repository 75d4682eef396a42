// ==========================================
// 市场订单接入系统 - 订单仓储
// ==========================================
// 职责: marketplace_order / order_status_history 的数据访问
// 红线: 订单落库与首条历史同事务;状态更新与历史追加同事务;
//       历史仅追加,永不更新/删除(订单级联删除除外)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::order::{MarketplaceOrder, StatusChange};
use crate::domain::product::VariantKey;
use crate::domain::types::OrderStatus;
use crate::repository::error::{corrupt_column, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// OrderRepository - 订单存储接口
// ==========================================
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 订单 + 首条状态历史 同事务落库
    async fn insert_with_history(
        &self,
        order: &MarketplaceOrder,
        change: &StatusChange,
    ) -> RepositoryResult<()>;

    /// 按内部 ID 查询订单
    async fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<MarketplaceOrder>>;

    /// order_item_id 是否已存在(导入查重)
    async fn exists_order_item(&self, order_item_id: &str) -> RepositoryResult<bool>;

    /// 状态更新 + 历史追加 同事务
    async fn update_status_with_history(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        change: &StatusChange,
    ) -> RepositoryResult<()>;

    /// 仅追加一条历史(同状态重入场景)
    async fn append_history(&self, change: &StatusChange) -> RepositoryResult<()>;

    /// 订单的全部历史(时间升序)
    async fn list_history(&self, order_id: &str) -> RepositoryResult<Vec<StatusChange>>;

    /// 物理删除订单(历史级联删除);调用方负责先冲销库存
    async fn delete(&self, order_id: &str) -> RepositoryResult<()>;
}

// ==========================================
// SqliteOrderRepository - SQLite 实现
// ==========================================
pub struct SqliteOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOrderRepository {
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

    fn row_to_order(row: &Row<'_>) -> rusqlite::Result<MarketplaceOrder> {
        let status_text: String = row.get(8)?;
        let sale_date: String = row.get(9)?;
        let created_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;
        Ok(MarketplaceOrder {
            order_id: row.get(0)?,
            account_name: row.get(1)?,
            marketplace_order_id: row.get(2)?,
            order_item_id: row.get(3)?,
            variant: VariantKey {
                design: row.get(4)?,
                color: row.get(5)?,
                size: row.get(6)?,
            },
            quantity: row.get(7)?,
            status: parse_status(&status_text, 8)?,
            sale_date: NaiveDate::parse_from_str(&sale_date, "%Y-%m-%d")
                .map_err(|e| corrupt_column(9, e.to_string()))?,
            created_at: parse_utc(&created_at, 10)?,
            updated_at: parse_utc(&updated_at, 11)?,
        })
    }

    fn insert_history(tx: &Connection, change: &StatusChange) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO order_status_history (
                history_id, order_id, previous_status, new_status,
                changed_at, changed_by, comment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                change.history_id,
                change.order_id,
                change.previous_status.map(|s| s.to_string()),
                change.new_status.to_string(),
                change.changed_at.to_rfc3339(),
                change.changed_by,
                change.comment,
            ],
        )?;
        Ok(())
    }
}

// 损坏的持久化值不兜底,直接以字段错误上浮
fn parse_status(s: &str, index: usize) -> rusqlite::Result<OrderStatus> {
    OrderStatus::from_str(s).map_err(|e| corrupt_column(index, e))
}

fn parse_utc(s: &str, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt_column(index, e.to_string()))
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn insert_with_history(
        &self,
        order: &MarketplaceOrder,
        change: &StatusChange,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO marketplace_order (
                order_id, account_name, marketplace_order_id, order_item_id,
                design, color, size, quantity, status, sale_date,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                order.order_id,
                order.account_name,
                order.marketplace_order_id,
                order.order_item_id,
                order.variant.design,
                order.variant.color,
                order.variant.size,
                order.quantity,
                order.status.to_string(),
                order.sale_date.to_string(),
                order.created_at.to_rfc3339(),
                order.updated_at.to_rfc3339(),
            ],
        )?;

        Self::insert_history(&tx, change)?;
        tx.commit()?;
        Ok(())
    }

    async fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<MarketplaceOrder>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, account_name, marketplace_order_id, order_item_id,
                   design, color, size, quantity, status, sale_date,
                   created_at, updated_at
            FROM marketplace_order
            WHERE order_id = ?1
            "#,
        )?;

        match stmt.query_row(params![order_id], Self::row_to_order) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists_order_item(&self, order_item_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM marketplace_order WHERE order_item_id = ?1",
            params![order_item_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn update_status_with_history(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        change: &StatusChange,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let affected = tx.execute(
            "UPDATE marketplace_order SET status = ?2, updated_at = ?3 WHERE order_id = ?1",
            params![order_id, new_status.to_string(), Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MarketplaceOrder".to_string(),
                id: order_id.to_string(),
            });
        }

        Self::insert_history(&tx, change)?;
        tx.commit()?;
        Ok(())
    }

    async fn append_history(&self, change: &StatusChange) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_history(&conn, change)
    }

    async fn list_history(&self, order_id: &str) -> RepositoryResult<Vec<StatusChange>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT history_id, order_id, previous_status, new_status,
                   changed_at, changed_by, comment
            FROM order_status_history
            WHERE order_id = ?1
            ORDER BY changed_at ASC, rowid ASC
            "#,
        )?;

        let rows = stmt.query_map(params![order_id], |row| {
            let previous: Option<String> = row.get(2)?;
            let new_status: String = row.get(3)?;
            let changed_at: String = row.get(4)?;
            Ok(StatusChange {
                history_id: row.get(0)?,
                order_id: row.get(1)?,
                previous_status: previous.map(|s| parse_status(&s, 2)).transpose()?,
                new_status: parse_status(&new_status, 3)?,
                changed_at: parse_utc(&changed_at, 4)?,
                changed_by: row.get(5)?,
                comment: row.get(6)?,
            })
        })?;

        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }
        Ok(history)
    }

    async fn delete(&self, order_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM marketplace_order WHERE order_id = ?1",
            params![order_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MarketplaceOrder".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }
}
