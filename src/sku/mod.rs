// ==========================================
// 市场订单接入系统 - SKU 解析层
// ==========================================
// 职责: 市场编码解析与模板推断,全部为纯函数
// ==========================================

pub mod parser;
pub mod pattern;

pub use parser::{convert_numeric_size, parse_sku, ParsedSku};
pub use pattern::{detect_pattern, MIN_PATTERN_SAMPLES};
