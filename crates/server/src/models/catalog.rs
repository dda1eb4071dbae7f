//! Catalog models: products, variants and their stock counters.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use attireburg_core::{ProductId, StockKey, VariantId};

/// A product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    /// Product-level stock, used when the product has no variants.
    pub stock: i32,
}

/// A size/colour variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub size: String,
    pub color: Option<String>,
    pub attributes: VariantAttributes,
    /// Negative while backorders are waiting on this variant.
    pub stock: i32,
}

impl ProductVariant {
    #[must_use]
    pub const fn stock_key(&self) -> StockKey {
        StockKey::variant(self.product_id, self.id)
    }
}

/// Free-form variant attributes (`{"Size": "M", "Color": "Navy", ...}`).
///
/// Stored as JSONB. Only `Size` and `Color` carry meaning here; other keys
/// pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantAttributes(BTreeMap<String, String>);

impl VariantAttributes {
    pub const SIZE: &'static str = "Size";
    pub const COLOR: &'static str = "Color";

    #[must_use]
    pub const fn new(values: BTreeMap<String, String>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Non-empty `Size` attribute.
    #[must_use]
    pub fn size(&self) -> Option<&str> {
        self.get(Self::SIZE).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Non-empty `Color` attribute.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.get(Self::COLOR).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Human label such as `M / Navy`.
    #[must_use]
    pub fn display_label(&self) -> Option<String> {
        match (self.size(), self.color()) {
            (Some(size), Some(color)) => Some(format!("{size} / {color}")),
            (Some(size), None) => Some(size.to_owned()),
            (None, Some(color)) => Some(color.to_owned()),
            (None, None) => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Denormalised names for an item, used in emails and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLabel {
    pub product_name: String,
    pub product_slug: String,
    pub variant_sku: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(pairs: &[(&str, &str)]) -> VariantAttributes {
        VariantAttributes::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn test_known_keys() {
        let attrs = attributes(&[("Size", "M"), ("Color", "Navy"), ("Fit", "Slim")]);
        assert_eq!(attrs.size(), Some("M"));
        assert_eq!(attrs.color(), Some("Navy"));
        assert_eq!(attrs.get("Fit"), Some("Slim"));
        assert_eq!(attrs.display_label().as_deref(), Some("M / Navy"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let attrs = attributes(&[("Size", "  "), ("Color", "Red")]);
        assert_eq!(attrs.size(), None);
        assert_eq!(attrs.display_label().as_deref(), Some("Red"));
        assert_eq!(VariantAttributes::default().display_label(), None);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let attrs = attributes(&[("Size", "L")]);
        assert_eq!(
            serde_json::to_value(&attrs).unwrap_or_default(),
            serde_json::json!({"Size": "L"})
        );
    }
}
