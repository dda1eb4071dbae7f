//! Stock addressing.
//!
//! Stock lives either on a variant (size/colour combination) or, for products
//! without variants, on the product row itself. [`StockKey`] names one of the
//! two.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};

/// Where a quantity of stock is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

impl StockKey {
    /// Product-level key.
    #[must_use]
    pub const fn product(product_id: ProductId) -> Self {
        Self {
            product_id,
            variant_id: None,
        }
    }

    /// Variant-level key.
    #[must_use]
    pub const fn variant(product_id: ProductId, variant_id: VariantId) -> Self {
        Self {
            product_id,
            variant_id: Some(variant_id),
        }
    }

    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }

    #[must_use]
    pub const fn is_variant(&self) -> bool {
        self.variant_id.is_some()
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant_id {
            Some(variant_id) => write!(f, "product {} variant {variant_id}", self.product_id),
            None => write!(f, "product {}", self.product_id),
        }
    }
}

/// A quantity against a stock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine {
    #[serde(flatten)]
    pub key: StockKey,
    pub quantity: i32,
}

impl StockLine {
    #[must_use]
    pub const fn new(key: StockKey, quantity: i32) -> Self {
        Self { key, quantity }
    }
}

/// Sum quantities per key.
///
/// The result is ordered by key, which is also the order stock rows are
/// locked in.
#[must_use]
pub fn merge_lines(lines: &[StockLine]) -> BTreeMap<StockKey, i32> {
    let mut merged = BTreeMap::new();
    for line in lines {
        *merged.entry(line.key).or_insert(0) += line.quantity;
    }
    merged
}

/// A line that could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    #[serde(flatten)]
    pub key: StockKey,
    pub requested: i32,
    pub available: i32,
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: requested {}, available {}",
            self.key, self.requested, self.available
        )
    }
}
