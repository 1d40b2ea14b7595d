//! Order Aggregate
//!
//! Orders are placed from quotations and never repriced: every item copies the
//! quotation's frozen snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::product::Id;
use super::quotation::{Quotation, QuotationStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Id,
    pub variant_id: Option<Id>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    /// Carries `price_breakdown` and `configuration`.
    pub metadata: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Cancelled => "cancelled" }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s { "pending" => Some(Self::Pending), "confirmed" => Some(Self::Confirmed), "cancelled" => Some(Self::Cancelled), _ => None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_id: Id,
    pub quotation_id: Id,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Id,
    pub order_number: String,
    pub customer_id: Id,
    pub quotation_id: Id,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn from_quotation(q: &Quotation, currency: &str) -> Result<Self, OrderError> {
        match q.status {
            QuotationStatus::Submitted | QuotationStatus::Approved => {}
            QuotationStatus::Ordered => return Err(OrderError::AlreadyOrdered),
            QuotationStatus::Rejected => return Err(OrderError::Rejected),
        }
        if q.items.is_empty() { return Err(OrderError::NoItems); }
        let items: Vec<OrderItem> = q
            .items
            .iter()
            .map(|i| OrderItem {
                product_id: q.product_id,
                variant_id: i.variant_id,
                quantity: i.quantity,
                unit_price: Money::new(i.snapshot.unit_price, currency),
                total_price: Money::new(i.snapshot.total_price, currency),
                metadata: i.snapshot.metadata(&i.configuration),
            })
            .collect();
        let total = items.iter().fold(Money::zero(currency), |acc, i| acc.add(&i.total_price).unwrap_or(acc));
        Ok(Self {
            order_number: format!("ORD-{}", Uuid::now_v7().simple()),
            customer_id: q.customer_id,
            quotation_id: q.id,
            status: OrderStatus::Pending,
            items,
            total,
        })
    }
}

impl Order {
    pub fn placed_event(&self) -> DomainEvent {
        DomainEvent::Order(OrderEvent::Placed { order_id: self.id, quotation_id: self.quotation_id, total: self.total.amount() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, AlreadyOrdered, Rejected }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "Quotation has no items"),
            Self::AlreadyOrdered => write!(f, "Quotation already converted to an order"),
            Self::Rejected => write!(f, "Quotation was rejected"),
        }
    }
}

impl From<OrderError> for crate::CommerceError {
    fn from(e: OrderError) -> Self { crate::CommerceError::Conflict(e.to_string()) }
}
