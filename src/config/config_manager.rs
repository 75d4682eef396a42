// ==========================================
// 市场订单接入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: global_config 表 (key-value)
// ==========================================

use crate::config::settings_trait::{ImportColumnMap, SettingsReader};
use crate::db::open_sqlite_connection;
use crate::domain::product::StockLockSettings;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ===== 配置键 =====
const KEY_STOCK_LOCK_SETTINGS: &str = "stock_lock_settings";
const KEY_PENDING_STATUSES: &str = "import/pending_handover_statuses";
const KEY_DISPATCHED_STATUSES: &str = "import/dispatched_statuses";
const KEY_SKIP_STATUSES: &str = "import/skip_statuses";
const KEY_COLUMN_MAP: &str = "import/column_map";

// ===== 状态词表默认值 =====
const DEFAULT_PENDING_STATUSES: &[&str] = &["Ready to Ship", "Ready to dispatch", "Pending"];
const DEFAULT_DISPATCHED_STATUSES: &[&str] =
    &["Shipped", "Dispatched", "In Transit", "Delivered"];
const DEFAULT_SKIP_STATUSES: &[&str] = &[
    "Returned",
    "RTO",
    "RTO Complete",
    "Cancelled",
    "Return Initiated",
    "Exchange",
];

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 global_config 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT config_value FROM global_config WHERE config_key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入(覆盖)配置值
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO global_config (config_key, config_value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(config_key) DO UPDATE SET
                config_value = excluded.config_value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// 写入预留池设置(JSON 序列化后存储)
    pub fn set_stock_lock_settings(
        &self,
        settings: &StockLockSettings,
    ) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string(settings)?;
        self.set_config_value(KEY_STOCK_LOCK_SETTINGS, &json)
    }

    /// 读取字符串列表配置(JSON 数组存储),缺省返回默认词表
    fn get_string_list(
        &self,
        key: &str,
        defaults: &[&str],
    ) -> Result<Vec<String>, Box<dyn Error>> {
        match self.get_config_value(key)? {
            Some(raw) => {
                let list: Vec<String> = serde_json::from_str(&raw)?;
                Ok(list)
            }
            None => Ok(defaults.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl SettingsReader for ConfigManager {
    async fn get_stock_lock_settings(&self) -> Result<StockLockSettings, Box<dyn Error>> {
        match self.get_config_value(KEY_STOCK_LOCK_SETTINGS)? {
            Some(raw) => {
                let settings: StockLockSettings = serde_json::from_str(&raw)?;
                Ok(settings)
            }
            None => Ok(StockLockSettings {
                enabled: true,
                lock_value: 0,
                max_threshold: 50,
            }),
        }
    }

    async fn get_pending_handover_statuses(&self) -> Result<Vec<String>, Box<dyn Error>> {
        self.get_string_list(KEY_PENDING_STATUSES, DEFAULT_PENDING_STATUSES)
    }

    async fn get_dispatched_statuses(&self) -> Result<Vec<String>, Box<dyn Error>> {
        self.get_string_list(KEY_DISPATCHED_STATUSES, DEFAULT_DISPATCHED_STATUSES)
    }

    async fn get_skip_statuses(&self) -> Result<Vec<String>, Box<dyn Error>> {
        self.get_string_list(KEY_SKIP_STATUSES, DEFAULT_SKIP_STATUSES)
    }

    async fn get_column_map(&self) -> Result<ImportColumnMap, Box<dyn Error>> {
        match self.get_config_value(KEY_COLUMN_MAP)? {
            Some(raw) => {
                let map: ImportColumnMap = serde_json::from_str(&raw)?;
                Ok(map)
            }
            None => Ok(ImportColumnMap::default()),
        }
    }
}
