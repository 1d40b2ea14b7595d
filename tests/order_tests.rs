// tests/order_tests.rs
mod common;
use common::*;

use aurum_commerce::domain::aggregates::product::MakingCharge;
use aurum_commerce::domain::aggregates::{LineConfiguration, OrderStatus};
use aurum_commerce::domain::value_objects::Quantity;
use aurum_commerce::services::AddLine;
use aurum_commerce::CommerceError;
use rust_decimal_macros::dec;

async fn submitted(s: &Services) -> i64 {
    for quantity in [2, 3] {
        let line = AddLine { product_id: 1, variant_id: Some(11), quantity: Quantity::new(quantity).unwrap(), configuration: LineConfiguration::default() };
        s.cart.add_line(CUSTOMER, line).await.unwrap();
    }
    s.cart.submit(CUSTOMER, None, customer()).await.unwrap()[0].id
}

#[tokio::test]
async fn test_order_copies_frozen_quotation_prices() {
    setup_tracing();
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    let quotation_id = submitted(&s).await;

    // Repricing the product after submission must not leak into the order.
    let mut repriced = gold_ring(1, 11, None);
    repriced.making_charge = MakingCharge { fixed_amount: Some(dec!(900)), percentage: None };
    s.store.put_product(repriced).await;

    let order = s.orders.place_order(CUSTOMER, quotation_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.quotation_id, quotation_id);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].unit_price.amount(), dec!(800));
    assert_eq!(order.total.amount(), dec!(4000));
    assert_eq!(order.total.currency(), "INR");
    assert!(order.order_number.starts_with("ORD-"));

    let orders = s.orders.orders(CUSTOMER).await.unwrap();
    assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), vec![order.id]);
}

#[tokio::test]
async fn test_quotation_orders_once() {
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    let quotation_id = submitted(&s).await;
    s.orders.place_order(CUSTOMER, quotation_id).await.unwrap();
    assert!(matches!(s.orders.place_order(CUSTOMER, quotation_id).await, Err(CommerceError::Conflict(_))));
    assert_eq!(s.orders.orders(CUSTOMER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_other_customers_quotations_are_invisible() {
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    let quotation_id = submitted(&s).await;
    assert!(matches!(s.orders.place_order(CUSTOMER + 1, quotation_id).await, Err(CommerceError::NotFound { entity: "quotation", .. })));
    assert!(s.orders.quotations(CUSTOMER + 1).await.unwrap().is_empty());
}
