// ==========================================
// 市场订单接入系统 - 报表文件读取
// ==========================================
// 支持: Excel (.xlsx) / CSV (.csv)
// 职责: 文件 → 原始键值记录 → RawOrderRow(列名按配置映射)
// ==========================================

use crate::config::settings_trait::ImportColumnMap;
use crate::domain::import::RawOrderRow;
use crate::engine::error::{EngineError, EngineResult};
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

// ==========================================
// FileParser - 文件解析接口
// ==========================================
pub trait FileParser {
    /// 解析文件为"表头 → 值"的键值记录列表(跳过全空行)
    fn parse_to_raw_records(&self, file_path: &Path)
        -> EngineResult<Vec<HashMap<String, String>>>;
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_records(
        &self,
        file_path: &Path,
    ) -> EngineResult<Vec<HashMap<String, String>>> {
        let path = file_path;

        if !path.exists() {
            return Err(EngineError::FileNotFound(path.display().to_string()));
        }

        if let Some(ext) = path.extension() {
            if ext != "csv" {
                return Err(EngineError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_raw_records(
        &self,
        file_path: &Path,
    ) -> EngineResult<Vec<HashMap<String, String>>> {
        let path = file_path;

        if !path.exists() {
            return Err(EngineError::FileNotFound(path.display().to_string()));
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext != "xlsx" && ext != "xls" {
            return Err(EngineError::UnsupportedFormat(ext.to_string()));
        }

        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e: calamine::XlsxError| EngineError::ExcelParse(e.to_string()))?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(EngineError::ExcelParse("Excel 文件无工作表".to_string()));
        }

        let sheet_name = sheet_names[0].clone();
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| EngineError::ExcelParse(e.to_string()))?;

        // 提取表头（第一行）
        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| EngineError::ExcelParse("Excel 文件无数据行".to_string()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut records = Vec::new();
        for data_row in rows {
            let mut row_map = HashMap::new();

            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    let value = cell.to_string().trim().to_string();
                    row_map.insert(header.clone(), value);
                }
            }

            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(
        &self,
        file_path: P,
    ) -> EngineResult<Vec<HashMap<String, String>>> {
        let path = file_path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse_to_raw_records(path),
            "xlsx" | "xls" => ExcelParser.parse_to_raw_records(path),
            _ => Err(EngineError::UnsupportedFormat(ext)),
        }
    }
}

// ==========================================
// 键值记录 → RawOrderRow
// ==========================================

/// 按列名映射把键值记录转为导入原始行
///
/// # 说明
/// - 行号从 2 起(第 1 行为表头),与操作员在表格软件里看到的一致
/// - 空白单元格记为 None;数量解析失败也记为 None(预览阶段判无效)
pub fn rows_from_records(
    records: Vec<HashMap<String, String>>,
    columns: &ImportColumnMap,
) -> Vec<RawOrderRow> {
    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let get = |name: &str| -> Option<String> {
                record
                    .get(name)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };

            let quantity = get(&columns.quantity).and_then(|v| {
                // Excel 数字单元格常带 ".0" 尾巴;非整数值不截断,按无效行处理
                v.parse::<i64>().ok().or_else(|| {
                    v.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
            });

            RawOrderRow {
                row_number: idx + 2,
                external_order_id: get(&columns.external_order_id),
                order_item_id: get(&columns.order_item_id),
                sku_code: get(&columns.sku_code),
                quantity,
                status_text: get(&columns.status),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(f, "{}", content).unwrap();
        f
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let f = csv_file("Order No,SKU,Quantity\nOD1,D11-KHAKHI_XL,1\nOD2,D12-BLACK_M,2\n");

        let records = CsvParser.parse_to_raw_records(f.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("SKU"), Some(&"D11-KHAKHI_XL".to_string()));
        assert_eq!(records[1].get("Quantity"), Some(&"2".to_string()));
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result = CsvParser.parse_to_raw_records(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(EngineError::FileNotFound(_))));
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let f = csv_file("SKU,Quantity\nA,1\n,\nB,2\n");

        let records = CsvParser.parse_to_raw_records(f.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let result = UniversalFileParser.parse("orders.pdf");
        assert!(matches!(result, Err(EngineError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_rows_from_records_column_mapping() {
        let mut record = HashMap::new();
        record.insert("Order No".to_string(), "OD-9".to_string());
        record.insert("Order Item ID".to_string(), "ITEM-9".to_string());
        record.insert("SKU".to_string(), "D11-KHAKHI_XL".to_string());
        record.insert("Quantity".to_string(), "3.0".to_string());
        record.insert("Order Status".to_string(), "Shipped".to_string());

        let rows = rows_from_records(vec![record], &ImportColumnMap::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].order_item_id.as_deref(), Some("ITEM-9"));
        assert_eq!(rows[0].quantity, Some(3));
        assert_eq!(rows[0].status_text.as_deref(), Some("Shipped"));
    }

    #[test]
    fn test_rows_from_records_fractional_quantity_rejected() {
        let mut record = HashMap::new();
        record.insert("SKU".to_string(), "D11-KHAKHI_XL".to_string());
        record.insert("Quantity".to_string(), "3.7".to_string());

        let rows = rows_from_records(vec![record], &ImportColumnMap::default());

        // 不截断成 3,记为缺失让预览判无效行
        assert!(rows[0].quantity.is_none());
    }

    #[test]
    fn test_rows_from_records_blank_cells_become_none() {
        let mut record = HashMap::new();
        record.insert("SKU".to_string(), "  ".to_string());
        record.insert("Quantity".to_string(), "abc".to_string());

        let rows = rows_from_records(vec![record], &ImportColumnMap::default());

        assert!(rows[0].sku_code.is_none());
        assert!(rows[0].quantity.is_none());
        assert!(rows[0].order_item_id.is_none());
    }
}
