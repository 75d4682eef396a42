// ==========================================
// 市场订单接入系统 - SKU 解析器
// ==========================================
// 职责: 市场商品编码 → (款号, 颜色, 尺码) 候选三元组
// 红线: 纯函数,确定性,零副作用;解析失败不是错误,
//       而是路由到人工映射的正常分支
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// ParsedSku - 解析候选三元组
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSku {
    pub design: String,
    pub color: String,
    pub size: String,
}

/// 数字尺码 → 字母尺码 固定转换表
///
/// 未知数字原样透传(passthrough)
pub fn convert_numeric_size(raw: &str) -> String {
    match raw.trim() {
        "28" => "S".to_string(),
        "30" => "M".to_string(),
        "32" => "L".to_string(),
        "34" => "XL".to_string(),
        "36" => "XXL".to_string(),
        "38" => "XXXL".to_string(),
        other => other.to_string(),
    }
}

/// 解析市场商品编码
///
/// # 规则(按顺序尝试)
/// 1. 末段形如 `Color_Size`: 按 `-` 切分后,末段含 `_` 时,
///    款号 = 除末段外全部段(保留 `-` 连接),末段按 `_` 拆出颜色与数字尺码,
///    数字尺码经固定表转换(28→S/30→M/32→L/34→XL/36→XXL/38→XXXL,未知透传)
/// 2. 首段为字面 `D` 且第二段纯数字: 款号 = 两段拼接(如 D-11 → D11),
///    中间段(空格连接)为颜色,末段为尺码
/// 3. 首段本身形如 `D<数字>`: 款号 = 该段,中间段为颜色,末段为尺码
/// 4. 多段兜底: 末段为尺码,倒数第二段为颜色,其余段(保留 `-`)为款号
///
/// 颜色统一做 `.` → 空格 替换并去首尾空白。
/// 任一字段为空 → 解析失败(返回 None),由调用方路由到人工映射。
///
/// # 返回
/// - Some(ParsedSku): 三元组候选(是否存在于目录由调用方校验)
/// - None: 解析失败
pub fn parse_sku(raw: &str) -> Option<ParsedSku> {
    let code = raw.trim();
    if code.is_empty() {
        return None;
    }

    let segments: Vec<&str> = code.split('-').collect();

    // === 规则 1: 末段形如 Color_Size ===
    if segments.len() >= 2 {
        let last = segments[segments.len() - 1];
        if last.contains('_') {
            let mut parts = last.splitn(2, '_');
            let color_part = parts.next().unwrap_or("");
            let size_part = parts.next().unwrap_or("");
            let design = segments[..segments.len() - 1].join("-");
            let color = clean_color(color_part);
            let size = convert_numeric_size(size_part);
            return build(design, color, size);
        }
    }

    // === 规则 2: D-<数字>-颜色...-尺码 ===
    if segments.len() >= 4
        && segments[0].eq_ignore_ascii_case("D")
        && is_pure_numeric(segments[1])
    {
        let design = format!("{}{}", segments[0], segments[1]);
        let color = clean_color(&segments[2..segments.len() - 1].join(" "));
        let size = segments[segments.len() - 1].trim().to_string();
        return build(design, color, size);
    }

    // === 规则 3: D<数字>-颜色...-尺码 ===
    if segments.len() >= 3 && is_design_token(segments[0]) {
        let design = segments[0].trim().to_string();
        let color = clean_color(&segments[1..segments.len() - 1].join(" "));
        let size = segments[segments.len() - 1].trim().to_string();
        return build(design, color, size);
    }

    // === 规则 4: 多段兜底 ===
    if segments.len() >= 3 {
        let design = segments[..segments.len() - 2].join("-");
        let color = clean_color(segments[segments.len() - 2]);
        let size = segments[segments.len() - 1].trim().to_string();
        return build(design, color, size);
    }

    None
}

/// 颜色清洗: `.` → 空格,去首尾空白
fn clean_color(raw: &str) -> String {
    raw.replace('.', " ").trim().to_string()
}

/// 是否纯数字段(非空)
fn is_pure_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// 是否形如 D<数字> 的单段款号
fn is_design_token(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some('D') | Some('d')) && {
        let rest: String = chars.collect();
        is_pure_numeric(&rest)
    }
}

/// 三字段均非空才算解析成功
fn build(design: String, color: String, size: String) -> Option<ParsedSku> {
    let design = design.trim().to_string();
    let size = size.trim().to_string();
    if design.is_empty() || color.is_empty() || size.is_empty() {
        return None;
    }
    Some(ParsedSku { design, color, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule1_color_underscore_numeric_size() {
        // 数字尺码 30 映射为 M
        let parsed = parse_sku("ABC-123-RED_30").unwrap();
        assert_eq!(parsed.design, "ABC-123");
        assert_eq!(parsed.color, "RED");
        assert_eq!(parsed.size, "M");
    }

    #[test]
    fn test_rule1_unknown_numeric_passthrough() {
        let parsed = parse_sku("ABC-RED_44").unwrap();
        assert_eq!(parsed.design, "ABC");
        assert_eq!(parsed.color, "RED");
        assert_eq!(parsed.size, "44"); // 表外数字透传
    }

    #[test]
    fn test_rule2_d_dash_numeric() {
        let parsed = parse_sku("D-11-KHAKHI-XL").unwrap();
        assert_eq!(parsed.design, "D11");
        assert_eq!(parsed.color, "KHAKHI");
        assert_eq!(parsed.size, "XL");
    }

    #[test]
    fn test_rule2_multi_segment_color() {
        let parsed = parse_sku("D-7-DARK-GREEN-L").unwrap();
        assert_eq!(parsed.design, "D7");
        assert_eq!(parsed.color, "DARK GREEN");
        assert_eq!(parsed.size, "L");
    }

    #[test]
    fn test_rule3_design_token() {
        let parsed = parse_sku("D23-NAVY-XXL").unwrap();
        assert_eq!(parsed.design, "D23");
        assert_eq!(parsed.color, "NAVY");
        assert_eq!(parsed.size, "XXL");
    }

    #[test]
    fn test_rule4_fallback() {
        let parsed = parse_sku("SUMMER-TEE-BLUE-M").unwrap();
        assert_eq!(parsed.design, "SUMMER-TEE");
        assert_eq!(parsed.color, "BLUE");
        assert_eq!(parsed.size, "M");
    }

    #[test]
    fn test_color_dot_replaced_with_space() {
        let parsed = parse_sku("D5-SKY.BLUE-S").unwrap();
        assert_eq!(parsed.color, "SKY BLUE");
    }

    #[test]
    fn test_parse_failure_returns_none() {
        assert_eq!(parse_sku(""), None);
        assert_eq!(parse_sku("PLAIN"), None);
        assert_eq!(parse_sku("AB-CD"), None); // 仅两段且无 `_`
        assert_eq!(parse_sku("A-_30"), None); // 颜色为空
    }

    #[test]
    fn test_parser_is_deterministic() {
        // 重复调用结果一致(纯函数)
        let codes = ["D-11-KHAKHI-XL", "ABC-123-RED_30", "SUMMER-TEE-BLUE-M"];
        for code in codes {
            let first = parse_sku(code);
            for _ in 0..10 {
                assert_eq!(parse_sku(code), first);
            }
        }
    }

    #[test]
    fn test_size_table_full_coverage() {
        for (num, letter) in [
            ("28", "S"),
            ("30", "M"),
            ("32", "L"),
            ("34", "XL"),
            ("36", "XXL"),
            ("38", "XXXL"),
        ] {
            assert_eq!(convert_numeric_size(num), letter);
        }
    }
}
