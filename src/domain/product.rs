//! Product model for both sides of the sync.
//!
//! `SourceProductRecord` is what the source catalog hands us for one product,
//! `TargetProductPayload` is what we send to the storefront, and
//! `TargetRecord` is what the storefront reports back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform ids arrive either as JSON strings or as JSON numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

/// Identifier of a product on the source platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct SourceKey(String);

impl From<RawId> for SourceKey {
    fn from(raw: RawId) -> Self {
        Self(raw.into())
    }
}

impl From<SourceKey> for String {
    fn from(key: SourceKey) -> Self {
        key.0
    }
}

impl SourceKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for SourceKey {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of the mirrored record on the target platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct TargetKey(String);

impl From<RawId> for TargetKey {
    fn from(raw: RawId) -> Self {
        Self(raw.into())
    }
}

impl From<TargetKey> for String {
    fn from(key: TargetKey) -> Self {
        key.0
    }
}

impl TargetKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One quantity-break pricing rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    pub min_quantity: u32,
    pub unit_price: f64,
    pub inventory: Option<i64>,
}

impl PriceTier {
    pub fn new(min_quantity: u32, unit_price: f64, inventory: Option<i64>) -> Self {
        Self {
            min_quantity,
            unit_price,
            inventory,
        }
    }

    /// A tier can become a variant only with a positive threshold and price
    pub fn is_usable(&self) -> bool {
        self.min_quantity > 0 && self.unit_price.is_finite() && self.unit_price > 0.0
    }
}

/// Raw product detail as fetched from the source catalog.
///
/// Never cached: a fresh record is fetched every cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceProductRecord {
    pub source_key: Option<SourceKey>,
    pub title: Option<String>,
    pub description: String,
    pub main_images: Vec<String>,
    pub description_images: Vec<String>,
    pub video_url: Option<String>,
    pub price_tiers: Vec<PriceTier>,
}

/// One purchasable option on the target, derived from a price tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Quantity threshold label, e.g. "10+ pcs"
    #[serde(rename = "option1")]
    pub threshold: String,
    /// Unit price with at least two decimals
    pub price: String,
    #[serde(rename = "inventory_quantity", skip_serializing_if = "Option::is_none")]
    pub inventory: Option<i64>,
}

impl Variant {
    pub fn from_tier(tier: &PriceTier) -> Self {
        Self {
            threshold: format!("{}+ pcs", tier.min_quantity),
            price: format_price(tier.unit_price),
            inventory: tier.inventory,
        }
    }
}

/// Shortest exact decimal form, padded to two decimals ("8.5" -> "8.50").
/// Sub-cent prices keep every digit.
fn format_price(price: f64) -> String {
    let text = price.to_string();
    match text.split_once('.') {
        Some((_, fraction)) if fraction.len() >= 2 => text,
        Some((_, fraction)) => format!("{text}{}", "0".repeat(2 - fraction.len())),
        None => format!("{text}.00"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub src: String,
}

/// Normalized product shape sent to the target store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProductPayload {
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    pub tags: String,
    pub status: String,
    pub options: Vec<ProductOption>,
    pub images: Vec<ProductImage>,
    pub variants: Vec<Variant>,
}

/// Product as currently stored on the target platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: TargetKey,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body_html: String,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub tags: String,
}
