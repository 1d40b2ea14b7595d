//! Quotation listing and order placement.

use std::sync::Arc;
use tracing::{info, instrument};

use super::EventPublisher;
use crate::domain::aggregates::{Id, NewOrder, Order, Quotation};
use crate::store::Store;
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    events: EventPublisher,
    currency: String,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, currency: impl Into<String>) -> Self {
        Self { store, events, currency: currency.into() }
    }

    pub async fn quotations(&self, customer_id: Id) -> Result<Vec<Quotation>> { self.store.customer_quotations(customer_id).await }

    pub async fn orders(&self, customer_id: Id) -> Result<Vec<Order>> { self.store.customer_orders(customer_id).await }

    /// Items copy the quotation's frozen prices; nothing is repriced.
    #[instrument(skip(self))]
    pub async fn place_order(&self, customer_id: Id, quotation_id: Id) -> Result<Order> {
        let quotation = self
            .store
            .find_quotation(customer_id, quotation_id)
            .await?
            .ok_or(CommerceError::not_found("quotation", quotation_id))?;
        let draft = NewOrder::from_quotation(&quotation, &self.currency)?;
        let order = self.store.place_order(draft, quotation.status).await?;
        info!(order_id = order.id, order_number = %order.order_number, total = %order.total.amount(), "Order placed");
        self.events.publish(&order.placed_event()).await;
        Ok(order)
    }
}
