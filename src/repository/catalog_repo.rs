// ==========================================
// 市场订单接入系统 - 商品目录仓储
// ==========================================
// 职责: 商品/变体树只读查询 + 双池库存计数的原子读改写
// 红线: 不含业务决策逻辑;分配/回补/补充仅执行带守卫的
//       条件更新,成败与最新计数一并返回,由引擎层解释
// 红线: 单行操作要么全部生效,要么零变更(无部分分配态)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::product::{ColorVariant, Product, SizeVariant, VariantKey, VariantStock};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ApplyOutcome - 守卫更新结果
// ==========================================
// Rejected 携带拒绝时刻的最新计数,供引擎层组装可解释的错误
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(VariantStock),
    Rejected(VariantStock),
}

// ==========================================
// InventoryCatalog - 目录协作方接口
// ==========================================
/// 商品目录协作方
///
/// # 并发约定
/// - 同一变体上的库存操作由实现方串行化(SQLite 单写者事务)
/// - 每个操作是一次原子读改写;调用方不得在无此保证下交错两次分配
#[async_trait]
pub trait InventoryCatalog: Send + Sync {
    /// 按三元组查询变体库存
    async fn find_variant(&self, key: &VariantKey) -> RepositoryResult<Option<VariantStock>>;

    /// 商品/颜色/尺码 全树(用于映射工作流的级联下拉)
    async fn list_products(&self) -> RepositoryResult<Vec<Product>>;

    /// 原子分配: 预留池扣 from_reserved,主池扣 from_main
    ///
    /// 守卫: locked_stock >= from_reserved 且 available >= from_main,
    /// 不满足时零变更并返回 Rejected(最新计数)
    async fn apply_allocation(
        &self,
        key: &VariantKey,
        from_reserved: i64,
        from_main: i64,
    ) -> RepositoryResult<ApplyOutcome>;

    /// 原子回补: locked_stock 与 current_stock 同加 quantity
    ///
    /// 回补总是记入预留池(与当初从哪个池扣减无关)
    async fn apply_restore(&self, key: &VariantKey, quantity: i64) -> RepositoryResult<VariantStock>;

    /// 原子补充预留池: locked_stock += amount(无物理变动,仅池间重分类)
    ///
    /// 守卫: locked + amount <= max_threshold 且 locked + amount <= current
    async fn refill_lock(
        &self,
        key: &VariantKey,
        amount: i64,
        max_threshold: i64,
    ) -> RepositoryResult<ApplyOutcome>;
}

// ==========================================
// SqliteInventoryCatalog - SQLite 实现
// ==========================================
pub struct SqliteInventoryCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteInventoryCatalog {
    /// 创建新的目录仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn read_variant(conn: &Connection, key: &VariantKey) -> RepositoryResult<Option<VariantStock>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT current_stock, locked_stock, reorder_point
            FROM size_variant
            WHERE design = ?1 AND color = ?2 AND size = ?3
            "#,
        )?;

        let result = stmt.query_row(params![key.design, key.color, key.size], |row| {
            Ok(VariantStock {
                key: key.clone(),
                current_stock: row.get(0)?,
                locked_stock: row.get(1)?,
                reorder_point: row.get(2)?,
            })
        });

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn require_variant(conn: &Connection, key: &VariantKey) -> RepositoryResult<VariantStock> {
        Self::read_variant(conn, key)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "SizeVariant".to_string(),
            id: key.to_string(),
        })
    }
}

#[async_trait]
impl InventoryCatalog for SqliteInventoryCatalog {
    async fn find_variant(&self, key: &VariantKey) -> RepositoryResult<Option<VariantStock>> {
        let conn = self.get_conn()?;
        Self::read_variant(&conn, key)
    }

    async fn list_products(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT sv.design, sv.color, cv.wholesale_price, cv.retail_price,
                   sv.size, sv.current_stock, sv.locked_stock, sv.reorder_point
            FROM size_variant sv
            JOIN color_variant cv ON cv.design = sv.design AND cv.color = sv.color
            ORDER BY sv.design, sv.color, sv.rowid
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                SizeVariant {
                    size: row.get(4)?,
                    current_stock: row.get(5)?,
                    locked_stock: row.get(6)?,
                    reorder_point: row.get(7)?,
                },
            ))
        })?;

        // 按 design → color 聚合成树(保持查询顺序)
        let mut products: Vec<Product> = Vec::new();
        for row in rows {
            let (design, color, wholesale_price, retail_price, size_variant) = row?;

            if products.last().map(|p| p.design != design).unwrap_or(true) {
                products.push(Product {
                    design: design.clone(),
                    colors: Vec::new(),
                });
            }
            let product = products.last_mut().expect("上一行刚插入");

            if product
                .colors
                .last()
                .map(|c| c.color != color)
                .unwrap_or(true)
            {
                product.colors.push(ColorVariant {
                    color: color.clone(),
                    wholesale_price,
                    retail_price,
                    sizes: Vec::new(),
                });
            }
            product
                .colors
                .last_mut()
                .expect("上一色刚插入")
                .sizes
                .push(size_variant);
        }

        Ok(products)
    }

    async fn apply_allocation(
        &self,
        key: &VariantKey,
        from_reserved: i64,
        from_main: i64,
    ) -> RepositoryResult<ApplyOutcome> {
        if from_reserved < 0 || from_main < 0 || from_reserved + from_main <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "quantity".to_string(),
                message: format!(
                    "分配数量非法: from_reserved={}, from_main={}",
                    from_reserved, from_main
                ),
            });
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        // 守卫式条件更新: 不满足守卫 → 0 行受影响 → 零变更
        let affected = tx.execute(
            r#"
            UPDATE size_variant
            SET locked_stock = locked_stock - ?4,
                current_stock = current_stock - (?4 + ?5),
                updated_at = ?6
            WHERE design = ?1 AND color = ?2 AND size = ?3
              AND locked_stock >= ?4
              AND (current_stock - locked_stock) >= ?5
            "#,
            params![
                key.design,
                key.color,
                key.size,
                from_reserved,
                from_main,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let fresh = Self::require_variant(&tx, key)?;
        tx.commit()?;

        if affected == 1 {
            Ok(ApplyOutcome::Applied(fresh))
        } else {
            Ok(ApplyOutcome::Rejected(fresh))
        }
    }

    async fn apply_restore(&self, key: &VariantKey, quantity: i64) -> RepositoryResult<VariantStock> {
        if quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "quantity".to_string(),
                message: format!("回补数量非法: {}", quantity),
            });
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let affected = tx.execute(
            r#"
            UPDATE size_variant
            SET locked_stock = locked_stock + ?4,
                current_stock = current_stock + ?4,
                updated_at = ?5
            WHERE design = ?1 AND color = ?2 AND size = ?3
            "#,
            params![
                key.design,
                key.color,
                key.size,
                quantity,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "SizeVariant".to_string(),
                id: key.to_string(),
            });
        }

        let fresh = Self::require_variant(&tx, key)?;
        tx.commit()?;
        Ok(fresh)
    }

    async fn refill_lock(
        &self,
        key: &VariantKey,
        amount: i64,
        max_threshold: i64,
    ) -> RepositoryResult<ApplyOutcome> {
        if amount <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "amount".to_string(),
                message: format!("补充数量非法: {}", amount),
            });
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let affected = tx.execute(
            r#"
            UPDATE size_variant
            SET locked_stock = locked_stock + ?4,
                updated_at = ?6
            WHERE design = ?1 AND color = ?2 AND size = ?3
              AND locked_stock + ?4 <= ?5
              AND locked_stock + ?4 <= current_stock
            "#,
            params![
                key.design,
                key.color,
                key.size,
                amount,
                max_threshold,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let fresh = Self::require_variant(&tx, key)?;
        tx.commit()?;

        if affected == 1 {
            Ok(ApplyOutcome::Applied(fresh))
        } else {
            Ok(ApplyOutcome::Rejected(fresh))
        }
    }
}
