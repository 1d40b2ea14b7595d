//! Configuration Enumerator
//!
//! Turns a product's variants into the list of purchasable configurations, each with a
//! label built from its metal and diamond links and its own price breakdown.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::{CustomerContext, PriceBreakdown, PriceOptions, PricingEngine};
use crate::domain::aggregates::product::{Id, Product, Variant};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetalSelection {
    pub metal: String,
    pub purity: String,
    pub tone: String,
    pub weight: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiamondSelection {
    pub diamond_id: Id,
    pub name: String,
    pub count: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct Configuration {
    pub variant_id: Id,
    pub label: String,
    pub metal_label: String,
    pub diamond_label: String,
    pub metals: Vec<MetalSelection>,
    pub diamonds: Vec<DiamondSelection>,
    pub size: Option<String>,
    pub price_total: Decimal,
    pub price_breakdown: PriceBreakdown,
    pub sku: Option<String>,
    pub inventory_quantity: Option<i64>,
    pub metadata: Value,
}

/// Enumerate configurations in variant display order. Never empty when the product has
/// at least one variant.
pub fn enumerate(engine: &PricingEngine<'_>, product: &Product, customer: &CustomerContext) -> Result<Vec<Configuration>> {
    let ordered = product.variants_in_display_order();
    let mut configurations = Vec::with_capacity(ordered.len());
    for variant in &ordered {
        let metals = metal_selections(variant);
        let diamonds = diamond_selections(variant);
        if metals.is_empty() && diamonds.is_empty() { continue; }
        let breakdown = engine.calculate_price(product, customer, &PriceOptions::variant(variant.id))?;
        configurations.push(build(variant, metals, diamonds, breakdown));
    }
    if configurations.is_empty() {
        if let Some(first) = ordered.first() {
            let breakdown = engine.calculate_price(product, customer, &PriceOptions::making_only())?;
            configurations.push(build(first, vec![], vec![], breakdown));
        }
    }
    Ok(configurations)
}

/// Label of a variant as a configuration, whether or not it has metal or diamond links.
pub fn configuration_label(variant: &Variant) -> String {
    let metal_label = metal_selections(variant).iter().map(metal_label).collect::<Vec<_>>().join(" + ");
    let diamond_label = diamond_selections(variant).iter().map(diamond_label).collect::<Vec<_>>().join(" + ");
    label_for(variant, &metal_label, &diamond_label)
}

fn label_for(variant: &Variant, metal_label: &str, diamond_label: &str) -> String {
    combined_label(metal_label, diamond_label)
        .or_else(|| variant.display_label().map(str::to_string))
        .unwrap_or_else(|| format!("Configuration {}", variant.id))
}

fn build(variant: &Variant, metals: Vec<MetalSelection>, diamonds: Vec<DiamondSelection>, breakdown: PriceBreakdown) -> Configuration {
    let metal_label = metals.iter().map(metal_label).collect::<Vec<_>>().join(" + ");
    let diamond_label = diamonds.iter().map(diamond_label).collect::<Vec<_>>().join(" + ");
    let label = label_for(variant, &metal_label, &diamond_label);
    Configuration {
        variant_id: variant.id,
        label,
        metal_label,
        diamond_label,
        metals,
        diamonds,
        size: variant.size.as_ref().map(|s| s.name.clone()),
        price_total: breakdown.payable_total(),
        price_breakdown: breakdown,
        sku: variant.sku.clone(),
        inventory_quantity: variant.inventory_quantity,
        metadata: variant.metadata.clone(),
    }
}

fn metal_selections(variant: &Variant) -> Vec<MetalSelection> {
    variant
        .metals
        .iter()
        .filter_map(|link| link.complete())
        .map(|m| MetalSelection { metal: m.metal.name.clone(), purity: m.purity.name.clone(), tone: m.tone.name.clone(), weight: m.weight })
        .collect()
}

fn diamond_selections(variant: &Variant) -> Vec<DiamondSelection> {
    variant
        .diamonds
        .iter()
        .filter_map(|link| link.diamond.as_ref().map(|d| DiamondSelection { diamond_id: d.id, name: d.display_name(), count: link.count }))
        .collect()
}

fn metal_label(m: &MetalSelection) -> String {
    match m.weight {
        Some(w) => format!("{} {} {} {}g", m.purity, m.tone, m.metal, w.normalize()),
        None => format!("{} {} {}", m.purity, m.tone, m.metal),
    }
}

fn diamond_label(d: &DiamondSelection) -> String {
    if d.count > 1 { format!("{} ({})", d.name, d.count) } else { d.name.clone() }
}

fn combined_label(metal: &str, diamond: &str) -> Option<String> {
    let parts: Vec<&str> = [metal, diamond].into_iter().filter(|s| !s.is_empty()).collect();
    (!parts.is_empty()).then(|| parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::{fixtures::*, MakingCharge, NamedRef, VariantMetal};
    use crate::pricing::{PricingPolicy, RateTable};

    fn making() -> MakingCharge { MakingCharge { fixed_amount: Some(Decimal::new(500, 0)), percentage: None } }

    #[test]
    fn test_labels_and_order() {
        let mut plain = variant(2, 1);
        plain.metals.push(gold(Some(Decimal::new(550, 2))));
        let mut studded = variant(3, 1);
        studded.is_default = true;
        studded.metals.push(gold(None));
        studded.diamonds.push(round_diamond(12));
        let p = product(1, making(), vec![plain, studded]);
        let rates = RateTable::default();
        let policy = PricingPolicy::default();
        let engine = PricingEngine::new(&rates, &[], &policy);
        let configs = enumerate(&engine, &p, &CustomerContext::guest()).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].variant_id, 3);
        assert_eq!(configs[0].label, "18K Yellow Gold | Round F VS1 (12)");
        assert_eq!(configs[1].label, "18K Yellow Gold 5.5g");
        assert_eq!(configs[1].diamond_label, "");
    }

    #[test]
    fn test_multiple_metals_join_with_plus() {
        let mut v = variant(2, 1);
        v.metals.push(gold(Some(Decimal::new(2, 0))));
        v.metals.push(VariantMetal { metal: Some(NamedRef::new(4, "Platinum")), purity: Some(NamedRef::new(950, "PT950")), tone: Some(NamedRef::new(5, "White")), weight: Some(Decimal::ONE) });
        v.diamonds.push(round_diamond(1));
        let p = product(1, making(), vec![v]);
        let rates = RateTable::default();
        let policy = PricingPolicy::default();
        let configs = enumerate(&PricingEngine::new(&rates, &[], &policy), &p, &CustomerContext::guest()).unwrap();
        assert_eq!(configs[0].metal_label, "18K Yellow Gold 2g + PT950 White Platinum 1g");
        assert_eq!(configs[0].diamond_label, "Round F VS1");
    }

    #[test]
    fn test_fallback_when_no_variant_has_links() {
        let mut partial = variant(5, 1);
        partial.metals.push(VariantMetal { metal: Some(NamedRef::new(1, "Gold")), purity: None, tone: None, weight: Some(Decimal::TEN) });
        partial.label = Some("Size 7".into());
        let p = product(1, making(), vec![variant(6, 1), partial]);
        let rates = RateTable::default().with_metal_rate(1, 18, 2, Decimal::new(60, 0));
        let policy = PricingPolicy::default();
        let configs = enumerate(&PricingEngine::new(&rates, &[], &policy), &p, &CustomerContext::guest()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].variant_id, 5);
        assert_eq!(configs[0].label, "Size 7");
        assert_eq!(configs[0].metal_label, "");
        assert_eq!(configs[0].price_total, Decimal::new(500, 0));
    }

    #[test]
    fn test_fallback_label_uses_variant_id() {
        let p = product(1, making(), vec![variant(8, 1)]);
        let rates = RateTable::default();
        let policy = PricingPolicy::default();
        let configs = enumerate(&PricingEngine::new(&rates, &[], &policy), &p, &CustomerContext::guest()).unwrap();
        assert_eq!(configs[0].label, "Configuration 8");
    }

    #[test]
    fn test_no_variants_no_configurations() {
        let p = product(1, making(), vec![]);
        let rates = RateTable::default();
        let policy = PricingPolicy::default();
        assert!(enumerate(&PricingEngine::new(&rates, &[], &policy), &p, &CustomerContext::guest()).unwrap().is_empty());
    }
}
