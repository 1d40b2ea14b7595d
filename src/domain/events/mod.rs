//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::product::Id;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Cart(CartEvent),
    Quotation(QuotationEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    LinesCollapsed { cart_id: Id, kept: Id, removed: Vec<Id> },
    Cleared { cart_id: Id },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuotationEvent {
    Submitted { quotation_id: Id, reference: String, customer_id: Id, product_id: Id, quantity: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Id, quotation_id: Id, total: Decimal },
}

impl DomainEvent {
    /// Message subject, e.g. `commerce.quotation.submitted`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Cart(CartEvent::LinesCollapsed { .. }) => ("cart", "lines_collapsed"),
            Self::Cart(CartEvent::Cleared { .. }) => ("cart", "cleared"),
            Self::Quotation(QuotationEvent::Submitted { .. }) => ("quotation", "submitted"),
            Self::Order(OrderEvent::Placed { .. }) => ("order", "placed"),
        };
        format!("commerce.{}.{}", aggregate, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_and_payload() {
        let e = DomainEvent::Cart(CartEvent::Cleared { cart_id: 3 });
        assert_eq!(e.subject(), "commerce.cart.cleared");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "cart");
        assert_eq!(json["type"], "cleared");
    }
}
