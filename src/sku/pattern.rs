// ==========================================
// 市场订单接入系统 - 编码模板推断
// ==========================================
// 职责: 同一会话确认的多条映射 → 可复用的占位符模板
// 说明: 纯建议性输出;推断失败静默返回 None,永不阻塞管线
// ==========================================

use crate::domain::mapping::SkuPattern;
use crate::domain::product::VariantKey;
use crate::sku::parser::convert_numeric_size;

/// 模板推断所需的最少样本数
pub const MIN_PATTERN_SAMPLES: usize = 3;

/// 从一批已确认映射推断编码模板
///
/// # 参数
/// - confirmed: (原始编码, 已确认变体) 对,一般来自同一解析会话
///
/// # 返回
/// - Some(SkuPattern): 所有样本归一到同一模板时
/// - None: 样本不足,或模板不一致,或任一样本无法占位化
///
/// # 占位化规则
/// - 款号 token → `{design}`(兼容 D11 与 D-11 两种写法)
/// - 颜色 token → `{color}`(兼容 空格/`.`/`-` 三种连接)
/// - 可转换的数字尺码后缀 → `{size}`,并收集实际用到的转换表项
pub fn detect_pattern(confirmed: &[(String, VariantKey)]) -> Option<SkuPattern> {
    if confirmed.len() < MIN_PATTERN_SAMPLES {
        return None;
    }

    let mut templates: Vec<String> = Vec::with_capacity(confirmed.len());
    let mut size_table: Vec<(String, String)> = Vec::new();

    for (code, variant) in confirmed {
        let (template, exercised) = templatize(code, variant)?;
        templates.push(template);
        if let Some(entry) = exercised {
            if !size_table.contains(&entry) {
                size_table.push(entry);
            }
        }
    }

    // 所有样本必须归一到同一模板
    let first = &templates[0];
    if !templates.iter().all(|t| t == first) {
        return None;
    }

    size_table.sort();
    Some(SkuPattern {
        template: first.clone(),
        size_table,
        sample_count: confirmed.len(),
    })
}

/// 单条编码占位化
///
/// 返回 (模板, 本条实际exercised的尺码转换项)
fn templatize(code: &str, variant: &VariantKey) -> Option<(String, Option<(String, String)>)> {
    let mut template = code.trim().to_string();

    // === 尺码占位(先做,避免尺码字面与颜色/款号冲突) ===
    let mut exercised: Option<(String, String)> = None;
    let mut size_done = false;

    // 数字尺码后缀: `_30` / `-30` 且转换结果等于确认尺码
    for sep in ['_', '-'] {
        if size_done {
            break;
        }
        if let Some(idx) = template.rfind(sep) {
            let tail = template[idx + 1..].to_string();
            if !tail.is_empty() && convert_numeric_size(&tail) == variant.size && tail != variant.size
            {
                exercised = Some((tail.clone(), variant.size.clone()));
                template.replace_range(idx + 1.., "{size}");
                size_done = true;
            }
        }
    }

    // 字面尺码后缀
    if !size_done {
        for sep in ['_', '-'] {
            let suffix = format!("{}{}", sep, variant.size);
            if template.ends_with(&suffix) {
                let start = template.len() - variant.size.len();
                template.replace_range(start.., "{size}");
                size_done = true;
                break;
            }
        }
    }

    if !size_done {
        return None;
    }

    // === 款号占位(兼容 D11 / D-11) ===
    if !replace_first(&mut template, &variant.design, "{design}") {
        let dashed = dashed_design(&variant.design);
        match dashed {
            Some(d) if replace_first(&mut template, &d, "{design}") => {}
            _ => return None,
        }
    }

    // === 颜色占位(兼容 空格/`.`/`-`) ===
    let color_forms = [
        variant.color.clone(),
        variant.color.replace(' ', "."),
        variant.color.replace(' ', "-"),
    ];
    if !color_forms
        .iter()
        .any(|form| replace_first(&mut template, form, "{color}"))
    {
        return None;
    }

    Some((template, exercised))
}

/// 首次出现替换;找到返回 true
fn replace_first(haystack: &mut String, needle: &str, placeholder: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    if let Some(idx) = haystack.find(needle) {
        haystack.replace_range(idx..idx + needle.len(), placeholder);
        true
    } else {
        false
    }
}

/// D11 → D-11(字母前缀与数字之间补 `-`)
fn dashed_design(design: &str) -> Option<String> {
    let split_at = design.find(|c: char| c.is_ascii_digit())?;
    if split_at == 0 || split_at == design.len() {
        return None;
    }
    let (alpha, digits) = design.split_at(split_at);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}", alpha, digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(design: &str, color: &str, size: &str) -> VariantKey {
        VariantKey::new(design, color, size)
    }

    #[test]
    fn test_detect_pattern_numeric_size_suffix() {
        let confirmed = vec![
            ("ABC-RED_30".to_string(), key("ABC", "RED", "M")),
            ("ABC-BLUE_32".to_string(), key("ABC", "BLUE", "L")),
            ("ABC-GREEN_28".to_string(), key("ABC", "GREEN", "S")),
        ];
        let pattern = detect_pattern(&confirmed).unwrap();
        assert_eq!(pattern.template, "{design}-{color}_{size}");
        assert_eq!(pattern.sample_count, 3);
        // 实际exercised的转换表项
        assert!(pattern.size_table.contains(&("28".to_string(), "S".to_string())));
        assert!(pattern.size_table.contains(&("30".to_string(), "M".to_string())));
        assert!(pattern.size_table.contains(&("32".to_string(), "L".to_string())));
    }

    #[test]
    fn test_detect_pattern_dashed_design() {
        // 编码写 D-11,确认款号是 D11
        let confirmed = vec![
            ("D-11-KHAKHI-XL".to_string(), key("D11", "KHAKHI", "XL")),
            ("D-12-BLACK-XL".to_string(), key("D12", "BLACK", "XL")),
            ("D-13-NAVY-XL".to_string(), key("D13", "NAVY", "XL")),
        ];
        let pattern = detect_pattern(&confirmed).unwrap();
        assert_eq!(pattern.template, "{design}-{color}-{size}");
        assert!(pattern.size_table.is_empty()); // 无数字转换
    }

    #[test]
    fn test_too_few_samples() {
        let confirmed = vec![
            ("ABC-RED_30".to_string(), key("ABC", "RED", "M")),
            ("ABC-BLUE_32".to_string(), key("ABC", "BLUE", "L")),
        ];
        assert_eq!(detect_pattern(&confirmed), None);
    }

    #[test]
    fn test_inconsistent_templates_rejected() {
        let confirmed = vec![
            ("ABC-RED_30".to_string(), key("ABC", "RED", "M")),
            ("XYZ-BLUE-L".to_string(), key("XYZ", "BLUE", "L")),
            ("ABC-GREEN_28".to_string(), key("ABC", "GREEN", "S")),
        ];
        assert_eq!(detect_pattern(&confirmed), None);
    }
}
