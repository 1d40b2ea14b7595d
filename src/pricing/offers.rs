//! Promotional offers and customer tiers consulted by the discount step.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::aggregates::product::{Id, Product};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    #[default]
    Guest,
    Retail,
    Wholesale,
    Distributor,
    /// Staff/back-office accounts. Never discounted.
    Internal,
}

impl CustomerTier {
    pub const ALL: [CustomerTier; 5] = [Self::Guest, Self::Retail, Self::Wholesale, Self::Distributor, Self::Internal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Retail => "retail",
            Self::Wholesale => "wholesale",
            Self::Distributor => "distributor",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for CustomerTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(s.trim())).ok_or_else(|| format!("unknown customer tier '{}'", s))
    }
}

/// Who is asking for a price. Passed by value into the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContext {
    pub customer_id: Option<Id>,
    pub tier: CustomerTier,
}

impl CustomerContext {
    pub fn guest() -> Self { Self::default() }
    pub fn new(customer_id: Id, tier: CustomerTier) -> Self { Self { customer_id: Some(customer_id), tier } }
}

/// Tier discount percentages.
#[derive(Clone, Debug, Default)]
pub struct PricingPolicy {
    tier_discounts: HashMap<CustomerTier, Decimal>,
}

impl PricingPolicy {
    pub fn with_tier_discount(mut self, tier: CustomerTier, percentage: Decimal) -> Self {
        self.tier_discounts.insert(tier, percentage);
        self
    }

    pub fn tier_percentage(&self, tier: CustomerTier) -> Decimal {
        if tier == CustomerTier::Internal { return Decimal::ZERO; }
        self.tier_discounts.get(&tier).copied().unwrap_or(Decimal::ZERO)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OfferDiscount {
    Percentage(Decimal),
    Flat(Decimal),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "ids", rename_all = "snake_case")]
pub enum OfferScope {
    AllProducts,
    Products(Vec<Id>),
    Categories(Vec<Id>),
}

/// An active promotional offer. Offers outside their validity window are filtered out
/// by the repository before reaching the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Id,
    pub name: String,
    pub discount: OfferDiscount,
    pub scope: OfferScope,
    /// Empty means every tier except `Internal`.
    pub tiers: Vec<CustomerTier>,
}

impl Offer {
    pub fn applies_to(&self, product: &Product, customer: &CustomerContext) -> bool {
        if customer.tier == CustomerTier::Internal { return false; }
        if !self.tiers.is_empty() && !self.tiers.contains(&customer.tier) { return false; }
        match &self.scope {
            OfferScope::AllProducts => true,
            OfferScope::Products(ids) => ids.contains(&product.id),
            OfferScope::Categories(ids) => product.category.as_ref().is_some_and(|c| ids.contains(&c.id)),
        }
    }

    /// Discount this offer grants on `subtotal`. Flat amounts are not capped here.
    pub fn discount_on(&self, subtotal: Decimal) -> Decimal {
        match self.discount {
            OfferDiscount::Percentage(pct) => subtotal * pct / Decimal::ONE_HUNDRED,
            OfferDiscount::Flat(amount) => amount,
        }
    }
}
