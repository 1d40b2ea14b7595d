//! Cart operations: add, edit, merged view, convergence and quotation submission.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{products_by_id, purchasable, EventPublisher, PricingInputs};
use crate::domain::aggregates::cart::{self, check_quantity_change, collapse_plans, inventory_violations, LinePricing};
use crate::domain::aggregates::quotation::fold_cart;
use crate::domain::aggregates::{CartLine, CartSummary, CollapsePlan, Id, LineConfiguration, LineStamp, NewCartLine, Product, Quotation};
use crate::domain::events::{CartEvent, DomainEvent, QuotationEvent};
use crate::domain::value_objects::Quantity;
use crate::pricing::{CustomerContext, PriceBreakdown, PriceOptions, PricingEngine, PricingPolicy};
use crate::store::Store;
use crate::{CommerceError, Result};

#[derive(Clone, Debug)]
pub struct AddLine {
    pub product_id: Id,
    pub variant_id: Option<Id>,
    pub quantity: Quantity,
    pub configuration: LineConfiguration,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    events: EventPublisher,
    policy: PricingPolicy,
    currency: String,
}

fn line_price(engine: &PricingEngine<'_>, products: &HashMap<Id, Product>, line: &CartLine, customer: &CustomerContext) -> Result<PriceBreakdown> {
    let product = products.get(&line.product_id).ok_or(CommerceError::not_found("product", line.product_id))?;
    engine.calculate_price(product, customer, &PriceOptions { variant_id: line.variant_id })
}

fn tracked_inventory(product: &Product, variant_id: Option<Id>) -> Option<i64> {
    variant_id.and_then(|id| product.variant(id)).and_then(|v| v.inventory_quantity)
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, policy: PricingPolicy, currency: impl Into<String>) -> Self {
        Self { store, events, policy, currency: currency.into() }
    }

    async fn owned_line(&self, customer_id: Id, line_id: Id) -> Result<CartLine> {
        let cart_id = self.store.cart_for(customer_id).await?;
        self.store
            .cart_lines(cart_id)
            .await?
            .into_iter()
            .find(|l| l.id == line_id)
            .ok_or(CommerceError::not_found("cart line", line_id))
    }

    /// Always a new physical line, even if an identical one exists. A single line may
    /// not start above tracked stock.
    #[instrument(skip(self, line), fields(product_id = line.product_id, variant_id = ?line.variant_id))]
    pub async fn add_line(&self, customer_id: Id, line: AddLine) -> Result<CartLine> {
        let product = purchasable(self.store.as_ref(), line.product_id, line.variant_id).await?;
        check_quantity_change(0, line.quantity, tracked_inventory(&product, line.variant_id))?;
        let cart_id = self.store.cart_for(customer_id).await?;
        self.store
            .insert_line(NewCartLine {
                cart_id,
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                configuration: line.configuration,
            })
            .await
    }

    /// Increases are bounded by tracked stock; decreases always pass. The write is
    /// rejected with `Conflict` if the line changed since it was read.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, customer_id: Id, line_id: Id, quantity: Quantity) -> Result<CartLine> {
        let line = self.owned_line(customer_id, line_id).await?;
        if quantity > line.quantity {
            let product = self.store.find_product(line.product_id).await?.ok_or(CommerceError::not_found("product", line.product_id))?;
            if let Err(e) = check_quantity_change(u64::from(line.quantity.value()), quantity, tracked_inventory(&product, line.variant_id)) {
                warn!(line_id, requested = quantity.value(), "Quantity increase rejected: {}", e);
                return Err(e);
            }
        }
        self.store.update_line(line.id, line.version, quantity, &line.configuration).await
    }

    #[instrument(skip(self, notes))]
    pub async fn update_notes(&self, customer_id: Id, line_id: Id, notes: Option<String>) -> Result<CartLine> {
        let line = self.owned_line(customer_id, line_id).await?;
        let mut configuration = line.configuration.clone();
        configuration.set_notes(notes);
        self.store.update_line(line.id, line.version, line.quantity, &configuration).await
    }

    #[instrument(skip(self))]
    pub async fn remove_line(&self, customer_id: Id, line_id: Id) -> Result<()> {
        let cart_id = self.store.cart_for(customer_id).await?;
        if self.store.delete_line(cart_id, line_id).await? { Ok(()) } else { Err(CommerceError::not_found("cart line", line_id)) }
    }

    /// Merged, priced view of the cart. Reads only.
    #[instrument(skip(self, customer))]
    pub async fn summarize(&self, customer_id: Id, customer: CustomerContext) -> Result<CartSummary> {
        let cart_id = self.store.cart_for(customer_id).await?;
        let lines = self.store.cart_lines(cart_id).await?;
        let products = products_by_id(self.store.as_ref(), lines.iter().map(|l| l.product_id)).await?;
        let inputs = PricingInputs::load(self.store.as_ref()).await?;
        let engine = inputs.engine(&self.policy);
        let items = cart::reconcile(&lines, |line| {
            let breakdown = line_price(&engine, &products, line, &customer)?;
            let inventory_quantity = products.get(&line.product_id).and_then(|p| tracked_inventory(p, line.variant_id));
            Ok(LinePricing { breakdown, inventory_quantity })
        })?;
        Ok(CartSummary::from_items(items, &self.currency))
    }

    /// Quantity edit on a merged line: the inventory rule is applied to the merged
    /// quantity, then the group converges to its first physical line in cart order,
    /// whatever order `line_ids` come in.
    #[instrument(skip(self))]
    pub async fn update_merged_quantity(&self, customer_id: Id, line_ids: &[Id], quantity: Quantity) -> Result<CartLine> {
        let mut requested = HashSet::with_capacity(line_ids.len());
        if let Some(repeated) = line_ids.iter().find(|id| !requested.insert(**id)) {
            return Err(CommerceError::Validation(format!("cart line {} is listed more than once", repeated)));
        }
        let cart_id = self.store.cart_for(customer_id).await?;
        let lines = self.store.cart_lines(cart_id).await?;
        if let Some(missing) = line_ids.iter().find(|id| !lines.iter().any(|l| l.id == **id)) {
            return Err(CommerceError::not_found("cart line", *missing));
        }
        let group: Vec<&CartLine> = lines.iter().filter(|l| requested.contains(&l.id)).collect();
        let first = group.first().ok_or_else(|| CommerceError::Validation("no cart lines to update".into()))?;
        if group.iter().any(|l| l.product_id != first.product_id || l.merge_key() != first.merge_key()) {
            return Err(CommerceError::Validation("lines do not belong to one merged cart item".into()));
        }

        let merged: u64 = group.iter().map(|l| u64::from(l.quantity.value())).sum();
        let product = self.store.find_product(first.product_id).await?.ok_or(CommerceError::not_found("product", first.product_id))?;
        check_quantity_change(merged, quantity, tracked_inventory(&product, first.variant_id))?;

        let plan = CollapsePlan::new(&group, quantity)?;
        self.apply_plan(cart_id, &plan).await
    }

    /// Converge every group of physical duplicates to one line. Quantities are summed,
    /// so no inventory check applies.
    #[instrument(skip(self))]
    pub async fn collapse_duplicates(&self, customer_id: Id) -> Result<Vec<CartLine>> {
        let cart_id = self.store.cart_for(customer_id).await?;
        let plans = collapse_plans(&self.store.cart_lines(cart_id).await?)?;
        let mut kept = Vec::with_capacity(plans.len());
        for plan in &plans {
            kept.push(self.apply_plan(cart_id, plan).await?);
        }
        Ok(kept)
    }

    async fn apply_plan(&self, cart_id: Id, plan: &CollapsePlan) -> Result<CartLine> {
        let kept = self.store.collapse(cart_id, plan).await?;
        if !plan.delete.is_empty() {
            self.events
                .publish(&DomainEvent::Cart(CartEvent::LinesCollapsed { cart_id, kept: kept.id, removed: plan.deleted_ids() }))
                .await;
        }
        Ok(kept)
    }

    /// Fold the whole cart into one quotation per product and clear it, atomically.
    /// Every inventory violation is reported at once and nothing is written.
    #[instrument(skip(self, comment, customer))]
    pub async fn submit(&self, customer_id: Id, comment: Option<&str>, customer: CustomerContext) -> Result<Vec<Quotation>> {
        let cart_id = self.store.cart_for(customer_id).await?;
        let lines = self.store.cart_lines(cart_id).await?;
        if lines.is_empty() {
            return Err(CommerceError::Validation("cart is empty".into()));
        }

        let products = products_by_id(self.store.as_ref(), lines.iter().map(|l| l.product_id)).await?;
        for line in &lines {
            if let Some(variant_id) = line.variant_id {
                if products.get(&line.product_id).and_then(|p| p.variant(variant_id)).is_none() {
                    return Err(CommerceError::not_found("variant", variant_id));
                }
            }
        }

        let violations = inventory_violations(&lines, &products);
        if !violations.is_empty() {
            warn!(cart_id, violations = violations.len(), "Quotation submission blocked by inventory");
            return Err(CommerceError::InventoryExceeded(violations));
        }

        let inputs = PricingInputs::load(self.store.as_ref()).await?;
        let engine = inputs.engine(&self.policy);
        let drafts = fold_cart(customer_id, &lines, comment, |line| line_price(&engine, &products, line, &customer))?;
        let stamps: Vec<LineStamp> = lines.iter().map(CartLine::stamp).collect();
        let quotations = self.store.submit_quotations(cart_id, &stamps, drafts).await?;
        info!(cart_id, quotations = quotations.len(), lines = stamps.len(), "Cart submitted as quotations");

        let mut events: Vec<DomainEvent> = quotations
            .iter()
            .map(|q| {
                DomainEvent::Quotation(QuotationEvent::Submitted {
                    quotation_id: q.id,
                    reference: q.reference.clone(),
                    customer_id: q.customer_id,
                    product_id: q.product_id,
                    quantity: q.quantity,
                })
            })
            .collect();
        events.push(DomainEvent::Cart(CartEvent::Cleared { cart_id }));
        self.events.publish_all(&events).await;
        Ok(quotations)
    }
}
