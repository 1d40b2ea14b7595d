//! Quotation Aggregate
//!
//! A quotation is the customer-submitted request for one product, folded from every
//! cart line of that product. Each item freezes the price it was submitted at.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::cart::{CartLine, LineConfiguration};
use super::product::Id;
use crate::domain::value_objects::round_money;
use crate::pricing::PriceBreakdown;

/// Frozen unit/total price plus the breakdown, stored in item metadata so later rate
/// changes never alter a submitted quotation or placed order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub price_breakdown: PriceBreakdown,
}

impl PriceSnapshot {
    pub fn freeze(breakdown: PriceBreakdown, quantity: u32) -> Self {
        let unit_price = breakdown.payable_total();
        Self { unit_price, total_price: round_money(unit_price * Decimal::from(quantity)), price_breakdown: breakdown }
    }

    pub fn metadata(&self, configuration: &LineConfiguration) -> Value {
        json!({ "price_breakdown": self.price_breakdown, "configuration": configuration })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationItem {
    pub variant_id: Option<Id>,
    pub quantity: u32,
    pub configuration: LineConfiguration,
    pub snapshot: PriceSnapshot,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus { #[default] Submitted, Approved, Rejected, Ordered }

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Submitted => "submitted", Self::Approved => "approved", Self::Rejected => "rejected", Self::Ordered => "ordered" }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s { "submitted" => Some(Self::Submitted), "approved" => Some(Self::Approved), "rejected" => Some(Self::Rejected), "ordered" => Some(Self::Ordered), _ => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub reference: String,
    pub customer_id: Id,
    pub product_id: Id,
    pub quantity: u32,
    pub comment: Option<String>,
    pub items: Vec<QuotationItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: Id,
    pub reference: String,
    pub customer_id: Id,
    pub product_id: Id,
    pub quantity: u32,
    pub comment: Option<String>,
    pub status: QuotationStatus,
    pub items: Vec<QuotationItem>,
    pub created_at: DateTime<Utc>,
}

impl Quotation {
    pub fn total_price(&self) -> Decimal { self.items.iter().map(|i| i.snapshot.total_price).sum() }
}

/// One quotation per product, in order of the product's first cart line. `price`
/// supplies the per-unit breakdown for a line.
pub fn fold_cart<F>(customer_id: Id, lines: &[CartLine], comment: Option<&str>, mut price: F) -> crate::Result<Vec<NewQuotation>>
where
    F: FnMut(&CartLine) -> crate::Result<PriceBreakdown>,
{
    let mut order: Vec<Id> = Vec::new();
    let mut by_product: HashMap<Id, NewQuotation> = HashMap::new();
    for line in lines {
        let quantity = line.quantity.value();
        let item = QuotationItem {
            variant_id: line.variant_id,
            quantity,
            configuration: line.configuration.clone(),
            snapshot: PriceSnapshot::freeze(price(line)?, quantity),
        };
        let quotation = by_product.entry(line.product_id).or_insert_with(|| {
            order.push(line.product_id);
            NewQuotation {
                reference: format!("QT-{}", Uuid::now_v7().simple()),
                customer_id,
                product_id: line.product_id,
                quantity: 0,
                comment: comment.map(str::to_string),
                items: Vec::new(),
            }
        });
        quotation.quantity = quotation.quantity.checked_add(quantity).ok_or_else(|| {
            crate::CommerceError::Validation(format!("total quantity for product {} is too large", line.product_id))
        })?;
        quotation.items.push(item);
    }
    Ok(order.into_iter().filter_map(|pid| by_product.remove(&pid)).collect())
}
