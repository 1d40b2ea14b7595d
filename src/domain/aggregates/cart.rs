//! Cart Aggregate
//!
//! Physical cart lines may duplicate each other. Reconciliation groups them by
//! product, then by (variant, serialized configuration), and presents one merged line
//! per group. Collapsing converges a group back to a single physical row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::product::{Id, Product};
use crate::domain::value_objects::{round_money, Quantity};
use crate::pricing::PriceBreakdown;
use crate::{CommerceError, InventoryViolation, Result};

/// Free-form line configuration. Only `notes` carries meaning here; everything else
/// is passed through and takes part in the duplicate key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineConfiguration(Map<String, Value>);

impl LineConfiguration {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(map)),
            other => Err(CommerceError::Validation(format!("configuration must be an object, got {}", other))),
        }
    }

    pub fn notes(&self) -> Option<&str> { self.0.get("notes").and_then(Value::as_str) }

    pub fn set_notes(&mut self, notes: Option<String>) {
        match notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(n) => { self.0.insert("notes".into(), Value::String(n)); }
            None => { self.0.remove("notes"); }
        }
    }

    /// Stable serialization: object keys are ordered, so equal maps yield equal keys.
    pub fn canonical_key(&self) -> String { Value::Object(self.0.clone()).to_string() }

    pub fn to_value(&self) -> Value { Value::Object(self.0.clone()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Id,
    pub cart_id: Id,
    pub product_id: Id,
    pub variant_id: Option<Id>,
    pub quantity: Quantity,
    pub configuration: LineConfiguration,
    /// Bumped on every write; used for optimistic concurrency.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewCartLine {
    pub cart_id: Id,
    pub product_id: Id,
    pub variant_id: Option<Id>,
    pub quantity: Quantity,
    pub configuration: LineConfiguration,
}

impl CartLine {
    /// Same product and variant, configuration ignored.
    pub fn same_selection(&self, product_id: Id, variant_id: Option<Id>) -> bool {
        self.product_id == product_id && self.variant_id == variant_id
    }

    pub(crate) fn merge_key(&self) -> (Option<Id>, String) { (self.variant_id, self.configuration.canonical_key()) }

    pub fn stamp(&self) -> LineStamp { LineStamp { id: self.id, version: self.version } }
}

/// A line id together with the version it was read at. Writes derived from a read
/// carry stamps and fail with `Conflict` once any of the lines moved on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineStamp {
    pub id: Id,
    pub version: i64,
}

/// Per-unit price and stock for one raw line.
#[derive(Clone, Debug)]
pub struct LinePricing {
    pub breakdown: PriceBreakdown,
    pub inventory_quantity: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergedLine {
    /// Original physical line ids, in cart order.
    pub line_ids: Vec<Id>,
    pub product_id: Id,
    pub variant_id: Option<Id>,
    pub configuration: LineConfiguration,
    pub notes: Option<String>,
    pub quantity: u64,
    pub unit_total: Decimal,
    pub line_total: Decimal,
    pub line_subtotal: Decimal,
    pub line_discount: Decimal,
    pub inventory_quantity: Option<i64>,
    pub price_breakdown: PriceBreakdown,
}

impl MergedLine {
    fn from_line(line: &CartLine, pricing: LinePricing) -> Self {
        let qty = Decimal::from(line.quantity.value());
        let unit = pricing.breakdown.payable_total();
        Self {
            line_ids: vec![line.id],
            product_id: line.product_id,
            variant_id: line.variant_id,
            configuration: line.configuration.clone(),
            notes: line.configuration.notes().map(str::to_string),
            quantity: u64::from(line.quantity.value()),
            unit_total: unit,
            line_total: round_money(unit * qty),
            line_subtotal: round_money(pricing.breakdown.subtotal * qty),
            line_discount: round_money((pricing.breakdown.subtotal - unit) * qty),
            inventory_quantity: pricing.inventory_quantity,
            price_breakdown: pricing.breakdown,
        }
    }

    fn absorb(&mut self, other: MergedLine) {
        self.line_ids.extend(other.line_ids);
        self.quantity += other.quantity;
        self.line_total += other.line_total;
        self.line_subtotal += other.line_subtotal;
        self.line_discount += other.line_discount;
        self.unit_total = round_money(self.line_total / Decimal::from(self.quantity));
    }
}

/// Read-only merged view of the raw lines, grouped by product in order of first
/// appearance.
pub fn reconcile<F>(lines: &[CartLine], mut price: F) -> Result<Vec<MergedLine>>
where
    F: FnMut(&CartLine) -> Result<LinePricing>,
{
    let mut product_order: Vec<Id> = Vec::new();
    let mut groups: HashMap<Id, Vec<((Option<Id>, String), MergedLine)>> = HashMap::new();
    for line in lines {
        let merged = MergedLine::from_line(line, price(line)?);
        let key = line.merge_key();
        let product_groups = groups.entry(line.product_id).or_insert_with(|| {
            product_order.push(line.product_id);
            Vec::new()
        });
        match product_groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.absorb(merged),
            None => product_groups.push((key, merged)),
        }
    }
    Ok(product_order
        .into_iter()
        .flat_map(|pid| groups.remove(&pid).unwrap_or_default())
        .map(|(_, line)| line)
        .collect())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartSummary {
    pub items: Vec<MergedLine>,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl CartSummary {
    /// Tax and shipping are pass-through zeros.
    pub fn from_items(items: Vec<MergedLine>, currency: &str) -> Self {
        let subtotal: Decimal = items.iter().map(|i| i.line_subtotal).sum();
        let discount: Decimal = items.iter().map(|i| i.line_discount).sum();
        let (tax, shipping) = (Decimal::ZERO, Decimal::ZERO);
        Self { items, currency: currency.to_string(), subtotal, tax, discount, shipping, total: subtotal - discount + tax + shipping }
    }
}

/// Converge a merged group to one physical line: the first original line takes the
/// new quantity, the rest are deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollapsePlan {
    pub keep: LineStamp,
    pub quantity: Quantity,
    pub delete: Vec<LineStamp>,
}

impl CollapsePlan {
    /// `group` is in cart order; its first line is kept.
    pub fn new(group: &[&CartLine], quantity: Quantity) -> Result<Self> {
        let (keep, rest) = group.split_first().ok_or_else(|| CommerceError::Validation("no cart lines to update".into()))?;
        let plan = Self { keep: keep.stamp(), quantity, delete: rest.iter().map(|l| l.stamp()).collect() };
        plan.check_distinct()?;
        Ok(plan)
    }

    /// Every line the plan touches, kept line first.
    pub fn stamps(&self) -> impl Iterator<Item = &LineStamp> { std::iter::once(&self.keep).chain(&self.delete) }

    pub fn deleted_ids(&self) -> Vec<Id> { self.delete.iter().map(|s| s.id).collect() }

    /// A line may appear in a plan only once; in particular the kept line is never
    /// among the deleted ones.
    pub fn check_distinct(&self) -> Result<()> {
        let mut seen = HashSet::new();
        match self.stamps().find(|s| !seen.insert(s.id)) {
            Some(repeated) => Err(CommerceError::Validation(format!("cart line {} appears more than once", repeated.id))),
            None => Ok(()),
        }
    }
}

/// One plan per group of physical duplicates (same product and merge key), keeping the
/// group's first line at the summed quantity. Single-line groups need no plan. Fails
/// when a group's sum exceeds the quantity bound.
pub fn collapse_plans(lines: &[CartLine]) -> Result<Vec<CollapsePlan>> {
    let mut groups: Vec<((Id, Option<Id>, String), Vec<&CartLine>)> = Vec::new();
    for line in lines {
        let (variant_id, config) = line.merge_key();
        let key = (line.product_id, variant_id, config);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(line),
            None => groups.push((key, vec![line])),
        }
    }
    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(_, members)| {
            let quantity = members[1..].iter().try_fold(members[0].quantity, |acc, l| acc.checked_add(l.quantity))?;
            CollapsePlan::new(&members, quantity)
        })
        .collect()
}

/// Increases beyond tracked stock are rejected; decreases always pass.
pub fn check_quantity_change(current: u64, requested: Quantity, inventory: Option<i64>) -> Result<()> {
    let Some(available) = inventory else { return Ok(()) };
    if u64::from(requested.value()) <= current { return Ok(()); }
    if available <= 0 {
        return Err(CommerceError::Validation("This item is currently out of stock.".into()));
    }
    if i64::from(requested.value()) > available {
        return Err(CommerceError::Validation(format!("Only {} item(s) available.", available)));
    }
    Ok(())
}

fn describe(product: &Product, variant_label: Option<&str>) -> String {
    match variant_label {
        Some(label) => format!("{} ({})", product.name, label),
        None => product.name.clone(),
    }
}

/// Every variant whose summed cart quantity exceeds tracked stock. Lines whose
/// product or variant is missing from `products` are skipped.
pub fn inventory_violations(lines: &[CartLine], products: &HashMap<Id, Product>) -> Vec<InventoryViolation> {
    let mut order: Vec<(Id, Id)> = Vec::new();
    let mut totals: HashMap<Id, u64> = HashMap::new();
    for line in lines {
        let Some(variant_id) = line.variant_id else { continue };
        let total = totals.entry(variant_id).or_insert_with(|| {
            order.push((line.product_id, variant_id));
            0
        });
        *total += u64::from(line.quantity.value());
    }
    order
        .into_iter()
        .filter_map(|(product_id, variant_id)| {
            let product = products.get(&product_id)?;
            let variant = product.variant(variant_id)?;
            let available = variant.inventory_quantity?;
            let requested = totals[&variant_id];
            let name = describe(product, variant.display_label());
            let message = if available <= 0 {
                format!("{} is currently out of stock.", name)
            } else if requested > available as u64 {
                format!("Total quantity requested for {} is {}, but only {} item(s) available.", name, requested, available)
            } else {
                return None;
            };
            Some(InventoryViolation { product_id, variant_id, requested, available, message })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn line(id: Id, product_id: Id, variant_id: Option<Id>, qty: i64) -> CartLine {
        CartLine {
            id, cart_id: 1, product_id, variant_id, quantity: Quantity::new(qty).unwrap(),
            configuration: LineConfiguration::default(), version: 1, created_at: Utc::now(),
        }
    }

    pub fn priced(total: i64) -> LinePricing {
        let t = Decimal::from(total);
        LinePricing {
            breakdown: PriceBreakdown { metal: t, diamond: Decimal::ZERO, making: Decimal::ZERO, subtotal: t, discount: Decimal::ZERO, total: t },
            inventory_quantity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::fixtures::*;
    use crate::domain::aggregates::product::{fixtures as catalog, MakingCharge};
    use serde_json::json;

    #[test]
    fn test_duplicate_lines_merge() {
        let lines = vec![line(1, 10, Some(100), 2), line(2, 10, Some(100), 3)];
        let merged = reconcile(&lines, |_| Ok(priced(800))).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].quantity, 5);
        assert_eq!(merged[0].line_ids, vec![1, 2]);
        assert_eq!(merged[0].line_total, Decimal::new(4000, 0));
        assert_eq!(merged[0].unit_total, Decimal::new(800, 0));
    }

    #[test]
    fn test_unit_total_recomputed_and_rounded() {
        let lines = vec![line(1, 10, None, 1), line(2, 10, None, 2)];
        let mut prices = vec![priced(10), priced(11)].into_iter();
        let merged = reconcile(&lines, |_| Ok(prices.next().unwrap())).unwrap();
        // (10 + 22) / 3 = 10.666..
        assert_eq!(merged[0].unit_total, Decimal::new(1067, 2));
    }

    #[test]
    fn test_configuration_separates_groups_and_products_keep_order() {
        let mut engraved = line(2, 10, Some(100), 1);
        engraved.configuration = LineConfiguration::from_value(json!({"engraving": "A", "notes": "gift"})).unwrap();
        let lines = vec![line(1, 10, Some(100), 1), line(3, 20, None, 1), engraved, line(4, 10, Some(100), 1)];
        let merged = reconcile(&lines, |_| Ok(priced(5))).unwrap();
        let shape: Vec<(Id, Vec<Id>)> = merged.iter().map(|m| (m.product_id, m.line_ids.clone())).collect();
        assert_eq!(shape, vec![(10, vec![1, 4]), (10, vec![2]), (20, vec![3])]);
        assert_eq!(merged[1].notes.as_deref(), Some("gift"));
    }

    #[test]
    fn test_canonical_key_ignores_insertion_order() {
        let a = LineConfiguration::from_value(json!({"a": 1, "b": 2})).unwrap();
        let b = LineConfiguration::from_value(json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert!(LineConfiguration::from_value(json!([1])).is_err());
    }

    #[test]
    fn test_summary_totals() {
        let mut discounted = priced(100);
        discounted.breakdown.discount = Decimal::new(10, 0);
        discounted.breakdown.total = Decimal::new(90, 0);
        let merged = reconcile(&[line(1, 10, None, 2)], |_| Ok(discounted.clone())).unwrap();
        let summary = CartSummary::from_items(merged, "INR");
        assert_eq!((summary.subtotal, summary.discount, summary.total), (Decimal::new(200, 0), Decimal::new(20, 0), Decimal::new(180, 0)));
    }

    fn stamp(id: Id) -> LineStamp { LineStamp { id, version: 1 } }

    #[test]
    fn test_collapse_plan() {
        let (a, b, c) = (line(4, 10, None, 1), line(9, 10, None, 1), line(12, 10, None, 1));
        let plan = CollapsePlan::new(&[&a, &b, &c], Quantity::one()).unwrap();
        assert_eq!(plan, CollapsePlan { keep: stamp(4), quantity: Quantity::one(), delete: vec![stamp(9), stamp(12)] });
        assert_eq!(plan.deleted_ids(), vec![9, 12]);
        assert!(CollapsePlan::new(&[], Quantity::one()).is_err());
    }

    #[test]
    fn test_collapse_plan_rejects_repeated_lines() {
        let a = line(4, 10, None, 2);
        assert!(matches!(CollapsePlan::new(&[&a, &a], Quantity::one()), Err(CommerceError::Validation(_))));
        let kept_and_deleted = CollapsePlan { keep: stamp(4), quantity: Quantity::one(), delete: vec![stamp(4)] };
        assert!(kept_and_deleted.check_distinct().is_err());
    }

    #[test]
    fn test_collapse_plans_only_for_duplicates() {
        let mut noted = line(3, 10, Some(100), 4);
        noted.configuration.set_notes(Some("gift".into()));
        let lines = vec![line(1, 10, Some(100), 2), line(2, 20, None, 1), noted, line(4, 10, Some(100), 3), line(5, 10, Some(100), 1)];
        let plans = collapse_plans(&lines).unwrap();
        assert_eq!(plans, vec![CollapsePlan { keep: stamp(1), quantity: Quantity::new(6).unwrap(), delete: vec![stamp(4), stamp(5)] }]);
        assert!(collapse_plans(&lines[..3]).unwrap().is_empty());
    }

    #[test]
    fn test_merged_quantity_beyond_line_bound() {
        use crate::domain::value_objects::MAX_QUANTITY;
        let max = i64::from(MAX_QUANTITY);
        let lines = vec![line(1, 10, None, max), line(2, 10, None, max), line(3, 10, None, max)];
        let merged = reconcile(&lines, |_| Ok(priced(1))).unwrap();
        assert_eq!(merged[0].quantity, 3 * u64::from(MAX_QUANTITY));
        assert!(matches!(collapse_plans(&lines), Err(CommerceError::Validation(_))));
    }

    #[test]
    fn test_quantity_change_rules() {
        let q = |n| Quantity::new(n).unwrap();
        assert!(check_quantity_change(2, q(3), Some(3)).is_ok());
        assert!(check_quantity_change(2, q(4), Some(3)).is_err());
        assert!(check_quantity_change(1, q(2), Some(0)).is_err());
        // decreasing an already-invalid quantity is allowed
        assert!(check_quantity_change(9, q(5), Some(3)).is_ok());
        assert!(check_quantity_change(9, q(9), Some(0)).is_ok());
        assert!(check_quantity_change(1, q(500), None).is_ok());
    }

    #[test]
    fn test_inventory_violations_sum_across_lines() {
        let mut v = catalog::variant(100, 10);
        v.inventory_quantity = Some(2);
        v.label = Some("Size 6".into());
        let mut sold_out = catalog::variant(200, 20);
        sold_out.inventory_quantity = Some(0);
        let mut products = HashMap::new();
        products.insert(10, catalog::product(10, MakingCharge::default(), vec![v]));
        products.insert(20, catalog::product(20, MakingCharge::default(), vec![sold_out]));
        let lines = vec![line(1, 10, Some(100), 1), line(2, 20, Some(200), 1), line(3, 10, Some(100), 2)];
        let messages: Vec<String> = inventory_violations(&lines, &products).into_iter().map(|v| v.message).collect();
        assert_eq!(messages, vec![
            "Total quantity requested for Product 10 (Size 6) is 3, but only 2 item(s) available.".to_string(),
            "Product 20 is currently out of stock.".to_string(),
        ]);
        assert!(inventory_violations(&lines[..1], &products).is_empty());
    }
}
