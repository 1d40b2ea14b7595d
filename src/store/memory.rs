//! In-process store. Every operation runs under one lock, so multi-step writes are
//! atomic by construction.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;

use super::{CartStore, CartWrite, CatalogStore, CostModelStore, OrderStore, WishlistStore};
use crate::catalog::{Predicate, ReferenceKind, ReferenceRow, StorageOrder};
use crate::domain::aggregates::{
    CartLine, CollapsePlan, Id, LineConfiguration, LineStamp, NewCartLine, NewOrder, NewQuotation, NewWishlistLine, Order, Product,
    Quotation, QuotationStatus, WishlistLine,
};
use crate::domain::value_objects::Quantity;
use crate::pricing::{Offer, RateTable};
use crate::{CommerceError, Result};

#[derive(Default)]
struct MemoryState {
    products: BTreeMap<Id, Product>,
    references: HashMap<ReferenceKind, Vec<ReferenceRow>>,
    rates: RateTable,
    offers: Vec<Offer>,
    carts: HashMap<Id, Id>,
    cart_lines: BTreeMap<Id, CartLine>,
    wishlists: HashMap<Id, Id>,
    wishlist_lines: BTreeMap<Id, WishlistLine>,
    quotations: BTreeMap<Id, Quotation>,
    orders: BTreeMap<Id, Order>,
    next_id: Id,
}

impl MemoryState {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn push_cart_line(&mut self, line: NewCartLine) -> CartLine {
        let id = self.next_id();
        let line = CartLine {
            id, cart_id: line.cart_id, product_id: line.product_id, variant_id: line.variant_id,
            quantity: line.quantity, configuration: line.configuration, version: 1, created_at: Utc::now(),
        };
        self.cart_lines.insert(id, line.clone());
        line
    }

    fn check_stamp(&self, cart_id: Option<Id>, stamp: &LineStamp) -> Result<()> {
        match self.cart_lines.get(&stamp.id) {
            Some(l) if cart_id.map_or(true, |c| l.cart_id == c) => {
                if l.version == stamp.version {
                    Ok(())
                } else {
                    Err(CommerceError::Conflict(format!("cart line {} was modified concurrently", stamp.id)))
                }
            }
            _ => Err(CommerceError::not_found("cart line", stamp.id)),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_product(mut self, product: Product) -> Self {
        let state = self.inner.get_mut();
        state.next_id = state.next_id.max(product.id).max(product.variants.iter().map(|v| v.id).max().unwrap_or(0));
        state.products.insert(product.id, product);
        self
    }

    pub fn with_rates(mut self, rates: RateTable) -> Self {
        self.inner.get_mut().rates = rates;
        self
    }

    pub fn with_offer(mut self, offer: Offer) -> Self {
        self.inner.get_mut().offers.push(offer);
        self
    }

    pub fn with_reference_rows(mut self, kind: ReferenceKind, rows: Vec<ReferenceRow>) -> Self {
        self.inner.get_mut().references.insert(kind, rows);
        self
    }

    /// Replace a stored product graph, e.g. after an inventory change.
    pub async fn put_product(&self, product: Product) {
        self.inner.lock().await.products.insert(product.id, product);
    }
}

#[async_trait]
impl CostModelStore for MemoryStore {
    async fn rate_table(&self) -> Result<RateTable> { Ok(self.inner.lock().await.rates.clone()) }
    async fn active_offers(&self) -> Result<Vec<Offer>> { Ok(self.inner.lock().await.offers.clone()) }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn fetch_products(&self, predicate: &Predicate, order: StorageOrder, limit: Option<i64>) -> Result<Vec<Product>> {
        let state = self.inner.lock().await;
        let mut matched: Vec<Product> = state.products.values().filter(|p| predicate.matches(p)).cloned().collect();
        match order {
            StorageOrder::NewestFirst => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
            StorageOrder::NameAsc => matched.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
        }
        if let Some(limit) = limit {
            matched.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        }
        Ok(matched)
    }

    async fn find_products(&self, ids: &[Id]) -> Result<Vec<Product>> {
        let state = self.inner.lock().await;
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn reference_rows(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRow>> {
        Ok(self.inner.lock().await.references.get(&kind).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_for(&self, customer_id: Id) -> Result<Id> {
        let mut state = self.inner.lock().await;
        if let Some(id) = state.carts.get(&customer_id) { return Ok(*id); }
        let id = state.next_id();
        state.carts.insert(customer_id, id);
        Ok(id)
    }

    async fn cart_lines(&self, cart_id: Id) -> Result<Vec<CartLine>> {
        let state = self.inner.lock().await;
        Ok(state.cart_lines.values().filter(|l| l.cart_id == cart_id).cloned().collect())
    }

    async fn insert_line(&self, line: NewCartLine) -> Result<CartLine> {
        Ok(self.inner.lock().await.push_cart_line(line))
    }

    async fn update_line(&self, line_id: Id, expected_version: i64, quantity: Quantity, configuration: &LineConfiguration) -> Result<CartLine> {
        let mut state = self.inner.lock().await;
        let line = state.cart_lines.get_mut(&line_id).ok_or(CommerceError::not_found("cart line", line_id))?;
        if line.version != expected_version {
            return Err(CommerceError::Conflict(format!("cart line {} was modified concurrently", line_id)));
        }
        line.quantity = quantity;
        line.configuration = configuration.clone();
        line.version += 1;
        Ok(line.clone())
    }

    async fn delete_line(&self, cart_id: Id, line_id: Id) -> Result<bool> {
        let mut state = self.inner.lock().await;
        match state.cart_lines.get(&line_id) {
            Some(l) if l.cart_id == cart_id => Ok(state.cart_lines.remove(&line_id).is_some()),
            _ => Ok(false),
        }
    }

    async fn collapse(&self, cart_id: Id, plan: &CollapsePlan) -> Result<CartLine> {
        plan.check_distinct()?;
        let mut state = self.inner.lock().await;
        for stamp in plan.stamps() {
            state.check_stamp(Some(cart_id), stamp)?;
        }
        for stamp in &plan.delete {
            state.cart_lines.remove(&stamp.id);
        }
        let line = state.cart_lines.get_mut(&plan.keep.id).ok_or(CommerceError::not_found("cart line", plan.keep.id))?;
        line.quantity = plan.quantity;
        line.version += 1;
        Ok(line.clone())
    }

    async fn submit_quotations(&self, cart_id: Id, lines: &[LineStamp], quotations: Vec<NewQuotation>) -> Result<Vec<Quotation>> {
        let mut state = self.inner.lock().await;
        let current: BTreeSet<LineStamp> = state.cart_lines.values().filter(|l| l.cart_id == cart_id).map(CartLine::stamp).collect();
        let expected: BTreeSet<LineStamp> = lines.iter().copied().collect();
        if current != expected {
            return Err(CommerceError::Conflict("cart changed while submitting".into()));
        }
        let mut created = Vec::with_capacity(quotations.len());
        for q in quotations {
            let id = state.next_id();
            let quotation = Quotation {
                id, reference: q.reference, customer_id: q.customer_id, product_id: q.product_id, quantity: q.quantity,
                comment: q.comment, status: QuotationStatus::Submitted, items: q.items, created_at: Utc::now(),
            };
            state.quotations.insert(id, quotation.clone());
            created.push(quotation);
        }
        state.cart_lines.retain(|_, l| l.cart_id != cart_id);
        Ok(created)
    }
}

#[async_trait]
impl WishlistStore for MemoryStore {
    async fn wishlist_for(&self, customer_id: Id) -> Result<Id> {
        let mut state = self.inner.lock().await;
        if let Some(id) = state.wishlists.get(&customer_id) { return Ok(*id); }
        let id = state.next_id();
        state.wishlists.insert(customer_id, id);
        Ok(id)
    }

    async fn wishlist_lines(&self, wishlist_id: Id) -> Result<Vec<WishlistLine>> {
        let state = self.inner.lock().await;
        Ok(state.wishlist_lines.values().filter(|l| l.wishlist_id == wishlist_id).cloned().collect())
    }

    async fn insert_wishlist_line(&self, line: NewWishlistLine) -> Result<WishlistLine> {
        let mut state = self.inner.lock().await;
        let id = state.next_id();
        let line = WishlistLine {
            id, wishlist_id: line.wishlist_id, product_id: line.product_id, variant_id: line.variant_id,
            configuration: line.configuration, created_at: Utc::now(),
        };
        state.wishlist_lines.insert(id, line.clone());
        Ok(line)
    }

    async fn delete_wishlist_line(&self, wishlist_id: Id, line_id: Id) -> Result<bool> {
        let mut state = self.inner.lock().await;
        match state.wishlist_lines.get(&line_id) {
            Some(l) if l.wishlist_id == wishlist_id => Ok(state.wishlist_lines.remove(&line_id).is_some()),
            _ => Ok(false),
        }
    }

    async fn move_to_cart(&self, wishlist_id: Id, line_id: Id, write: CartWrite) -> Result<CartLine> {
        let mut state = self.inner.lock().await;
        if !state.wishlist_lines.get(&line_id).is_some_and(|l| l.wishlist_id == wishlist_id) {
            return Err(CommerceError::not_found("wishlist line", line_id));
        }
        let line = match write {
            CartWrite::Update { line, quantity } => {
                state.check_stamp(None, &line)?;
                let existing = state.cart_lines.get_mut(&line.id).ok_or(CommerceError::not_found("cart line", line.id))?;
                existing.quantity = quantity;
                existing.version += 1;
                existing.clone()
            }
            CartWrite::Insert(new) => state.push_cart_line(new),
        };
        state.wishlist_lines.remove(&line_id);
        Ok(line)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_quotation(&self, customer_id: Id, quotation_id: Id) -> Result<Option<Quotation>> {
        let state = self.inner.lock().await;
        Ok(state.quotations.get(&quotation_id).filter(|q| q.customer_id == customer_id).cloned())
    }

    async fn customer_quotations(&self, customer_id: Id) -> Result<Vec<Quotation>> {
        let state = self.inner.lock().await;
        Ok(state.quotations.values().filter(|q| q.customer_id == customer_id).cloned().collect())
    }

    async fn customer_orders(&self, customer_id: Id) -> Result<Vec<Order>> {
        let state = self.inner.lock().await;
        Ok(state.orders.values().rev().filter(|o| o.customer_id == customer_id).cloned().collect())
    }

    async fn place_order(&self, order: NewOrder, expected: QuotationStatus) -> Result<Order> {
        let mut state = self.inner.lock().await;
        let quotation = state.quotations.get_mut(&order.quotation_id).ok_or(CommerceError::not_found("quotation", order.quotation_id))?;
        if quotation.status != expected {
            return Err(CommerceError::Conflict(format!("quotation {} is {}", quotation.id, quotation.status.as_str())));
        }
        quotation.status = QuotationStatus::Ordered;
        let id = state.next_id();
        let order = Order {
            id, order_number: order.order_number, customer_id: order.customer_id, quotation_id: order.quotation_id,
            status: order.status, items: order.items, total: order.total, created_at: Utc::now(),
        };
        state.orders.insert(id, order.clone());
        Ok(order)
    }
}
