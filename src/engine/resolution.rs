// ==========================================
// 市场订单接入系统 - 映射确认工作流
// ==========================================
// 职责: 未解析编码的人工确认(级联选择 → 落映射 → 模板建议)
// 约定: 确认落映射立即生效,同会话后续解析即可命中;
//       模板建议纯提示性,不阻塞管线
// ==========================================

use crate::domain::mapping::{SkuMapping, SkuPattern};
use crate::domain::product::{Product, VariantKey};
use crate::domain::types::MappingSource;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::catalog_repo::InventoryCatalog;
use crate::repository::mapping_repo::SkuMappingStore;
use crate::sku::pattern::detect_pattern;
use std::sync::Arc;
use tracing::info;

// ==========================================
// MappingSelection - 一条人工确认
// ==========================================
#[derive(Debug, Clone)]
pub struct MappingSelection {
    pub sku_code: String,
    pub variant: VariantKey,
}

// ==========================================
// ResolutionOutcome - 确认结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub confirmed: Vec<SkuMapping>,
    /// 同会话确认样本足够且归一到同一模板时给出
    pub pattern_proposal: Option<SkuPattern>,
}

// ==========================================
// 级联选择辅助(纯函数,供界面层组装下拉)
// ==========================================

/// 某款号下的颜色选项
pub fn color_options(products: &[Product], design: &str) -> Vec<String> {
    products
        .iter()
        .find(|p| p.design == design)
        .map(|p| p.colors.iter().map(|c| c.color.clone()).collect())
        .unwrap_or_default()
}

/// 某款号+颜色下的尺码选项
pub fn size_options(products: &[Product], design: &str, color: &str) -> Vec<String> {
    products
        .iter()
        .find(|p| p.design == design)
        .and_then(|p| p.colors.iter().find(|c| c.color == color))
        .map(|c| c.sizes.iter().map(|s| s.size.clone()).collect())
        .unwrap_or_default()
}

/// 三元组是否存在于商品树
pub fn variant_exists(products: &[Product], key: &VariantKey) -> bool {
    products
        .iter()
        .find(|p| p.design == key.design)
        .and_then(|p| p.colors.iter().find(|c| c.color == key.color))
        .map(|c| c.sizes.iter().any(|s| s.size == key.size))
        .unwrap_or(false)
}

// ==========================================
// MappingResolutionWorkflow - 确认工作流
// ==========================================
pub struct MappingResolutionWorkflow<M, C>
where
    M: SkuMappingStore,
    C: InventoryCatalog,
{
    mappings: Arc<M>,
    catalog: Arc<C>,
}

impl<M, C> MappingResolutionWorkflow<M, C>
where
    M: SkuMappingStore,
    C: InventoryCatalog,
{
    pub fn new(mappings: Arc<M>, catalog: Arc<C>) -> Self {
        Self { mappings, catalog }
    }

    /// 商品树(级联下拉数据源)
    pub async fn product_tree(&self) -> EngineResult<Vec<Product>> {
        Ok(self.catalog.list_products().await?)
    }

    /// 批量确认映射
    ///
    /// # 流程
    /// 1. 逐条校验所选变体在目录中存在(不存在即整批拒绝,零落库)
    /// 2. 逐条落映射(带账号归属与来源)
    /// 3. 样本 >= 3 时尝试推断编码模板
    ///
    /// # 说明
    /// - 整批校验先于任何落库,避免半确认状态
    pub async fn resolve_all(
        &self,
        account_name: &str,
        source: MappingSource,
        selections: Vec<MappingSelection>,
    ) -> EngineResult<ResolutionOutcome> {
        // 先整批校验
        for selection in &selections {
            if self.catalog.find_variant(&selection.variant).await?.is_none() {
                return Err(EngineError::VariantNotFound(selection.variant.to_string()));
            }
        }

        let mut confirmed = Vec::with_capacity(selections.len());
        let mut pairs: Vec<(String, VariantKey)> = Vec::with_capacity(selections.len());

        for selection in selections {
            let mapping = SkuMapping::new(
                selection.sku_code.clone(),
                account_name,
                selection.variant.clone(),
                source,
            );
            let mapping = self.mappings.create(mapping).await?;

            info!(
                sku = %mapping.marketplace_sku,
                variant = %mapping.variant,
                source = %mapping.mapping_source,
                "映射已确认"
            );

            pairs.push((selection.sku_code, selection.variant));
            confirmed.push(mapping);
        }

        let pattern_proposal = detect_pattern(&pairs);
        if let Some(pattern) = &pattern_proposal {
            info!(
                template = %pattern.template,
                samples = pattern.sample_count,
                "推断出编码模板(建议性)"
            );
        }

        Ok(ResolutionOutcome {
            confirmed,
            pattern_proposal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{ColorVariant, SizeVariant};

    fn sample_tree() -> Vec<Product> {
        vec![Product {
            design: "D11".to_string(),
            colors: vec![ColorVariant {
                color: "KHAKHI".to_string(),
                wholesale_price: 350.0,
                retail_price: 799.0,
                sizes: vec![
                    SizeVariant {
                        size: "M".to_string(),
                        current_stock: 10,
                        locked_stock: 2,
                        reorder_point: 3,
                    },
                    SizeVariant {
                        size: "XL".to_string(),
                        current_stock: 6,
                        locked_stock: 1,
                        reorder_point: 3,
                    },
                ],
            }],
        }]
    }

    #[test]
    fn test_cascade_options() {
        let tree = sample_tree();

        assert_eq!(color_options(&tree, "D11"), vec!["KHAKHI".to_string()]);
        assert_eq!(
            size_options(&tree, "D11", "KHAKHI"),
            vec!["M".to_string(), "XL".to_string()]
        );
        assert!(size_options(&tree, "D11", "BLACK").is_empty());
        assert!(color_options(&tree, "D99").is_empty());
    }

    #[test]
    fn test_variant_exists() {
        let tree = sample_tree();

        assert!(variant_exists(&tree, &VariantKey::new("D11", "KHAKHI", "M")));
        assert!(!variant_exists(&tree, &VariantKey::new("D11", "KHAKHI", "S")));
        assert!(!variant_exists(&tree, &VariantKey::new("D12", "KHAKHI", "M")));
    }
}
