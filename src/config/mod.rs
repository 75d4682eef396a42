// ==========================================
// 市场订单接入系统 - 配置层
// ==========================================

pub mod config_manager;
pub mod settings_trait;

pub use config_manager::ConfigManager;
pub use settings_trait::{ImportColumnMap, SettingsReader};
