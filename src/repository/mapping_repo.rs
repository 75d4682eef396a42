// ==========================================
// 市场订单接入系统 - SKU 映射仓储
// ==========================================
// 职责: sku_mapping 表的 CRUD 与使用计数
// 说明: 映射创建时记录归属账号,读取对租户内所有账号共享
//       (产品文档确认的既定设计) —— lookup 不按账号过滤
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::mapping::SkuMapping;
use crate::domain::product::VariantKey;
use crate::domain::types::MappingSource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// SkuMappingStore - 映射存储接口
// ==========================================
#[async_trait]
pub trait SkuMappingStore: Send + Sync {
    /// 按原始编码查询映射
    ///
    /// account_name 仅为接口对齐保留;读取共享,不参与过滤
    async fn lookup(
        &self,
        account_name: &str,
        marketplace_sku: &str,
    ) -> RepositoryResult<Option<SkuMapping>>;

    /// 批量查询(一次扫描,供导入预览使用)
    async fn bulk_lookup(
        &self,
        marketplace_skus: &[String],
    ) -> RepositoryResult<HashMap<String, SkuMapping>>;

    /// 落库一条新映射
    async fn create(&self, mapping: SkuMapping) -> RepositoryResult<SkuMapping>;

    /// 删除映射(下次遇到该编码将强制重新解析)
    async fn delete(&self, mapping_id: &str) -> RepositoryResult<()>;

    /// 复用计数 +1 并刷新 last_used_at
    async fn touch_usage(&self, mapping_id: &str) -> RepositoryResult<()>;
}

// ==========================================
// SqliteSkuMappingStore - SQLite 实现
// ==========================================
pub struct SqliteSkuMappingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSkuMappingStore {
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

    fn row_to_mapping(row: &Row<'_>) -> rusqlite::Result<SkuMapping> {
        let source_text: String = row.get(8)?;
        let last_used_at: Option<String> = row.get(6)?;
        let created_at: String = row.get(9)?;
        Ok(SkuMapping {
            mapping_id: row.get(0)?,
            marketplace_sku: row.get(1)?,
            account_name: row.get(2)?,
            variant: VariantKey {
                design: row.get(3)?,
                color: row.get(4)?,
                size: row.get(5)?,
            },
            usage_count: row.get(7)?,
            last_used_at: last_used_at
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            mapping_source: MappingSource::from_str(&source_text)
                .unwrap_or(MappingSource::Manual),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        SELECT mapping_id, marketplace_sku, account_name,
               design, color, size,
               last_used_at, usage_count, mapping_source, created_at
        FROM sku_mapping
    "#;
}

#[async_trait]
impl SkuMappingStore for SqliteSkuMappingStore {
    async fn lookup(
        &self,
        _account_name: &str,
        marketplace_sku: &str,
    ) -> RepositoryResult<Option<SkuMapping>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE marketplace_sku = ?1", Self::SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![marketplace_sku], Self::row_to_mapping) {
            Ok(mapping) => Ok(Some(mapping)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn bulk_lookup(
        &self,
        marketplace_skus: &[String],
    ) -> RepositoryResult<HashMap<String, SkuMapping>> {
        if marketplace_skus.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.get_conn()?;
        let placeholders = (1..=marketplace_skus.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "{} WHERE marketplace_sku IN ({})",
            Self::SELECT_COLUMNS,
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(
            rusqlite::params_from_iter(marketplace_skus.iter()),
            Self::row_to_mapping,
        )?;

        let mut result = HashMap::with_capacity(marketplace_skus.len());
        for row in rows {
            let mapping = row?;
            result.insert(mapping.marketplace_sku.clone(), mapping);
        }
        Ok(result)
    }

    async fn create(&self, mapping: SkuMapping) -> RepositoryResult<SkuMapping> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO sku_mapping (
                mapping_id, marketplace_sku, account_name,
                design, color, size,
                usage_count, last_used_at, mapping_source, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                mapping.mapping_id,
                mapping.marketplace_sku,
                mapping.account_name,
                mapping.variant.design,
                mapping.variant.color,
                mapping.variant.size,
                mapping.usage_count,
                mapping.last_used_at.map(|dt| dt.to_rfc3339()),
                mapping.mapping_source.to_string(),
                mapping.created_at.to_rfc3339(),
            ],
        )?;
        Ok(mapping)
    }

    async fn delete(&self, mapping_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM sku_mapping WHERE mapping_id = ?1",
            params![mapping_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "SkuMapping".to_string(),
                id: mapping_id.to_string(),
            });
        }
        Ok(())
    }

    async fn touch_usage(&self, mapping_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE sku_mapping
            SET usage_count = usage_count + 1,
                last_used_at = ?2
            WHERE mapping_id = ?1
            "#,
            params![mapping_id, Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "SkuMapping".to_string(),
                id: mapping_id.to_string(),
            });
        }
        Ok(())
    }
}
