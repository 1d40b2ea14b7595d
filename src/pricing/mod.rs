//! Pricing Engine
//!
//! Pure computation of a [`PriceBreakdown`] from a product graph, a rate snapshot, the
//! active offers and the customer context. No I/O happens here; callers load the
//! inputs once per request and may price any number of configurations against them.

pub mod configuration;
pub mod offers;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::aggregates::product::{CompleteMetal, Diamond, Id, Product, Variant};
use crate::domain::value_objects::round_money;
use crate::{CommerceError, Result};

pub use offers::{CustomerContext, CustomerTier, Offer, OfferDiscount, OfferScope, PricingPolicy};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub metal: Decimal,
    pub diamond: Decimal,
    pub making: Decimal,
    pub subtotal: Decimal,
    pub discount: Decimal,
    /// `subtotal - discount`. May be negative when a flat offer exceeds the subtotal;
    /// use [`PriceBreakdown::payable_total`] wherever the price is shown or summed.
    pub total: Decimal,
}

impl PriceBreakdown {
    pub fn payable_total(&self) -> Decimal { self.total.max(Decimal::ZERO) }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PriceOptions {
    pub variant_id: Option<Id>,
}

impl PriceOptions {
    pub fn variant(id: Id) -> Self { Self { variant_id: Some(id) } }
    pub fn making_only() -> Self { Self::default() }
}

/// Current unit rates for metals (per gram) and diamonds (per stone).
pub trait CostRateLookup: Send + Sync {
    fn metal_rate(&self, metal: Id, purity: Id, tone: Id) -> Option<Decimal>;
    fn diamond_rate(&self, diamond: Id) -> Option<Decimal>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MetalRateKey { pub metal_id: Id, pub purity_id: Id, pub tone_id: Id }

/// In-memory snapshot of the cost reference rates, loaded once per request.
#[derive(Clone, Debug, Default)]
pub struct RateTable {
    metals: HashMap<MetalRateKey, Decimal>,
    diamonds: HashMap<Id, Decimal>,
}

impl RateTable {
    pub fn with_metal_rate(mut self, metal_id: Id, purity_id: Id, tone_id: Id, rate: Decimal) -> Self {
        self.insert_metal_rate(MetalRateKey { metal_id, purity_id, tone_id }, rate);
        self
    }

    pub fn with_diamond_rate(mut self, diamond_id: Id, rate: Decimal) -> Self {
        self.insert_diamond_rate(diamond_id, rate);
        self
    }

    pub fn insert_metal_rate(&mut self, key: MetalRateKey, rate: Decimal) { self.metals.insert(key, rate); }
    pub fn insert_diamond_rate(&mut self, diamond_id: Id, rate: Decimal) { self.diamonds.insert(diamond_id, rate); }
}

impl CostRateLookup for RateTable {
    fn metal_rate(&self, metal_id: Id, purity_id: Id, tone_id: Id) -> Option<Decimal> {
        self.metals.get(&MetalRateKey { metal_id, purity_id, tone_id }).copied()
    }
    fn diamond_rate(&self, diamond_id: Id) -> Option<Decimal> { self.diamonds.get(&diamond_id).copied() }
}

/// Everything the engine reads, borrowed for the duration of one request.
#[derive(Clone, Copy)]
pub struct PricingEngine<'a> {
    rates: &'a dyn CostRateLookup,
    offers: &'a [Offer],
    policy: &'a PricingPolicy,
}

impl<'a> PricingEngine<'a> {
    pub fn new(rates: &'a dyn CostRateLookup, offers: &'a [Offer], policy: &'a PricingPolicy) -> Self {
        Self { rates, offers, policy }
    }

    /// Price one configuration of `product`. Without a variant the result carries only
    /// the making charge.
    pub fn calculate_price(&self, product: &Product, customer: &CustomerContext, options: &PriceOptions) -> Result<PriceBreakdown> {
        let variant = match options.variant_id {
            Some(id) => Some(product.variant(id).ok_or(CommerceError::not_found("variant", id))?),
            None => None,
        };
        let (metal, diamond) = match variant {
            Some(v) => (round_money(self.metal_cost(product, v)), round_money(self.diamond_cost(product, v))),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        let making = round_money(product.making_charge.amount(metal + diamond));
        let subtotal = metal + diamond + making;
        let discount = round_money(self.discount(product, customer, subtotal));
        Ok(PriceBreakdown { metal, diamond, making, subtotal, discount, total: subtotal - discount })
    }

    fn metal_cost(&self, product: &Product, variant: &Variant) -> Decimal {
        variant.metals.iter().filter_map(|link| link.complete()).map(|m| self.metal_line(product, &m)).sum()
    }

    fn metal_line(&self, product: &Product, m: &CompleteMetal<'_>) -> Decimal {
        let weight = m.weight.unwrap_or(Decimal::ZERO);
        match self.rates.metal_rate(m.metal.id, m.purity.id, m.tone.id) {
            Some(rate) => weight * rate,
            None => {
                tracing::warn!(product_id = product.id, metal = m.metal.id, purity = m.purity.id, tone = m.tone.id, "no metal rate, pricing at zero");
                Decimal::ZERO
            }
        }
    }

    fn diamond_cost(&self, product: &Product, variant: &Variant) -> Decimal {
        variant
            .diamonds
            .iter()
            .filter_map(|link| link.diamond.as_ref().map(|d| (d, link.count.max(0))))
            .map(|(d, count)| self.diamond_line(product, d) * Decimal::from(count))
            .sum()
    }

    fn diamond_line(&self, product: &Product, diamond: &Diamond) -> Decimal {
        self.rates.diamond_rate(diamond.id).unwrap_or_else(|| {
            tracing::warn!(product_id = product.id, diamond = diamond.id, "no diamond rate, pricing at zero");
            Decimal::ZERO
        })
    }

    /// The single largest of the tier discount and the best applicable offer.
    fn discount(&self, product: &Product, customer: &CustomerContext, subtotal: Decimal) -> Decimal {
        let tier = subtotal * self.policy.tier_percentage(customer.tier) / Decimal::ONE_HUNDRED;
        self.offers
            .iter()
            .filter(|o| o.applies_to(product, customer))
            .map(|o| o.discount_on(subtotal))
            .fold(tier, Decimal::max)
    }
}
