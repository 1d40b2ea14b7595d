//! Product Aggregate
//!
//! A product is loaded as a graph: the product row, its variants, and each variant's
//! metal and diamond links with their reference entities resolved.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Id = i64;

/// A reference-data row (metal, purity, tone, shape, category, ...) reduced to id and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedRef { pub id: Id, pub name: String }

impl NamedRef {
    pub fn new(id: Id, name: impl Into<String>) -> Self { Self { id, name: name.into() } }
}

/// Labor/markup configuration. Both parts may be present, in which case both apply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakingCharge {
    pub fixed_amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
}

impl MakingCharge {
    /// Build from the product columns, falling back to `making_charge_type` /
    /// `making_charge_value` metadata hints when neither column is set.
    pub fn resolve(fixed_amount: Option<Decimal>, percentage: Option<Decimal>, metadata: &Value) -> Self {
        if fixed_amount.is_some() || percentage.is_some() {
            return Self { fixed_amount, percentage };
        }
        let value = metadata.get("making_charge_value").and_then(decimal_from_json);
        match (metadata.get("making_charge_type").and_then(Value::as_str), value) {
            (Some("fixed"), Some(v)) => Self { fixed_amount: Some(v), percentage: None },
            (Some("percentage"), Some(v)) => Self { fixed_amount: None, percentage: Some(v) },
            _ => Self::default(),
        }
    }

    /// Making charge over a material cost (metal + diamond).
    pub fn amount(&self, material_cost: Decimal) -> Decimal {
        let mut total = Decimal::ZERO;
        if let Some(fixed) = self.fixed_amount { total += fixed; }
        if let Some(pct) = self.percentage { total += material_cost * pct / Decimal::ONE_HUNDRED; }
        total
    }
}

fn decimal_from_json(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Id,
    pub name: String,
    pub sku: String,
    pub uses_metal: bool,
    pub uses_diamond: bool,
    pub is_active: bool,
    pub base_price: Option<Decimal>,
    pub making_charge: MakingCharge,
    pub metadata: Value,
    pub category: Option<NamedRef>,
    pub brand: Option<NamedRef>,
    pub catalogs: Vec<NamedRef>,
    pub variants: Vec<Variant>,
    pub media: Vec<ProductMedia>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variant {
    pub id: Id,
    pub product_id: Id,
    pub label: Option<String>,
    pub sku: Option<String>,
    /// `None` means stock is not tracked.
    pub inventory_quantity: Option<i64>,
    pub is_default: bool,
    pub size: Option<NamedRef>,
    pub metadata: Value,
    pub metals: Vec<VariantMetal>,
    pub diamonds: Vec<VariantDiamond>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariantMetal {
    pub metal: Option<NamedRef>,
    pub purity: Option<NamedRef>,
    pub tone: Option<NamedRef>,
    pub weight: Option<Decimal>,
}

/// A metal link whose metal, purity and tone are all present.
#[derive(Clone, Copy, Debug)]
pub struct CompleteMetal<'a> {
    pub metal: &'a NamedRef,
    pub purity: &'a NamedRef,
    pub tone: &'a NamedRef,
    pub weight: Option<Decimal>,
}

impl VariantMetal {
    pub fn complete(&self) -> Option<CompleteMetal<'_>> {
        Some(CompleteMetal { metal: self.metal.as_ref()?, purity: self.purity.as_ref()?, tone: self.tone.as_ref()?, weight: self.weight })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diamond {
    pub id: Id,
    pub name: Option<String>,
    pub shape: Option<NamedRef>,
    pub color: Option<NamedRef>,
    pub clarity: Option<NamedRef>,
}

impl Diamond {
    /// Display name, or shape/color/clarity joined by a space.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => [&self.shape, &self.color, &self.clarity]
                .into_iter()
                .flatten()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariantDiamond {
    pub diamond: Option<Diamond>,
    pub count: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductMedia { pub id: Id, pub url: String, pub position: i32 }

impl Product {
    pub fn variant(&self, id: Id) -> Option<&Variant> { self.variants.iter().find(|v| v.id == id) }

    /// Variants ordered default-first, then by id. If none is marked default the
    /// first-created (lowest id) variant leads.
    pub fn variants_in_display_order(&self) -> Vec<&Variant> {
        let mut ordered: Vec<&Variant> = self.variants.iter().collect();
        ordered.sort_by_key(|v| (!v.is_default, v.id));
        ordered
    }

    pub fn default_variant(&self) -> Option<&Variant> { self.variants_in_display_order().into_iter().next() }

    pub fn is_ready_made(&self) -> bool { self.base_price.is_some_and(|p| p > Decimal::ZERO) }

    pub fn purity_label(&self) -> Option<&str> { self.metadata.get("purity").and_then(Value::as_str) }

    pub fn primary_image(&self) -> Option<&ProductMedia> { self.media.iter().min_by_key(|m| m.position) }
}

impl Variant {
    /// Name used in customer-facing messages, when the variant has one.
    pub fn display_label(&self) -> Option<&str> { self.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(id: Id, making: MakingCharge, variants: Vec<Variant>) -> Product {
        Product {
            id, name: format!("Product {}", id), sku: format!("SKU-{}", id), uses_metal: true, uses_diamond: true,
            is_active: true, base_price: None, making_charge: making, metadata: Value::Null,
            category: None, brand: None, catalogs: vec![], variants, media: vec![], created_at: Utc::now(),
        }
    }

    pub fn variant(id: Id, product_id: Id) -> Variant {
        Variant {
            id, product_id, label: None, sku: None, inventory_quantity: None, is_default: false, size: None,
            metadata: Value::Null, metals: vec![], diamonds: vec![],
        }
    }

    pub fn gold(weight: Option<Decimal>) -> VariantMetal {
        VariantMetal {
            metal: Some(NamedRef::new(1, "Gold")), purity: Some(NamedRef::new(18, "18K")),
            tone: Some(NamedRef::new(2, "Yellow")), weight,
        }
    }

    pub fn round_diamond(count: i32) -> VariantDiamond {
        VariantDiamond {
            diamond: Some(Diamond {
                id: 7, name: None, shape: Some(NamedRef::new(1, "Round")),
                color: Some(NamedRef::new(2, "F")), clarity: Some(NamedRef::new(3, "VS1")),
            }),
            count,
        }
    }
}
