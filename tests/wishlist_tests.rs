// tests/wishlist_tests.rs
mod common;
use common::*;

use aurum_commerce::domain::aggregates::LineConfiguration;
use aurum_commerce::domain::value_objects::Quantity;
use aurum_commerce::domain::aggregates::NewCartLine;
use aurum_commerce::services::AddLine;
use aurum_commerce::store::{CartStore, CartWrite, WishlistStore};
use aurum_commerce::CommerceError;
use serde_json::json;

fn config(notes: &str) -> LineConfiguration { LineConfiguration::from_value(json!({ "notes": notes })).unwrap() }

#[tokio::test]
async fn test_move_increments_existing_line_ignoring_configuration() {
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    let in_cart = s
        .cart
        .add_line(CUSTOMER, AddLine { product_id: 1, variant_id: Some(11), quantity: Quantity::new(2).unwrap(), configuration: config("plain") })
        .await
        .unwrap();
    let wished = s.wishlist.add(CUSTOMER, 1, Some(11), config("engraved")).await.unwrap();

    let moved = s.wishlist.move_to_cart(CUSTOMER, wished.id, Quantity::new(3).unwrap()).await.unwrap();
    assert_eq!(moved.id, in_cart.id);
    assert_eq!(moved.quantity.value(), 5);
    assert_eq!(moved.configuration.notes(), Some("plain"));
    assert!(s.wishlist.list(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_move_without_match_creates_line_with_wishlist_configuration() {
    let s = services(seeded(vec![gold_ring(1, 11, None), gold_ring(2, 22, None)]));
    s.cart.add_line(CUSTOMER, AddLine { product_id: 2, variant_id: Some(22), quantity: Quantity::one(), configuration: LineConfiguration::default() }).await.unwrap();
    let wished = s.wishlist.add(CUSTOMER, 1, Some(11), config("gift")).await.unwrap();

    let moved = s.wishlist.move_to_cart(CUSTOMER, wished.id, Quantity::one()).await.unwrap();
    assert_eq!((moved.product_id, moved.variant_id, moved.quantity.value()), (1, Some(11), 1));
    assert_eq!(moved.configuration.notes(), Some("gift"));
    assert_eq!(s.cart.summarize(CUSTOMER, customer()).await.unwrap().items.len(), 2);
    assert!(s.wishlist.list(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_move_respects_inventory_and_keeps_wishlist_line() {
    let s = services(seeded(vec![gold_ring(1, 11, Some(1))]));
    let wished = s.wishlist.add(CUSTOMER, 1, Some(11), LineConfiguration::default()).await.unwrap();
    let result = s.wishlist.move_to_cart(CUSTOMER, wished.id, Quantity::new(2).unwrap()).await;
    assert!(matches!(result, Err(CommerceError::Validation(_))));
    assert_eq!(s.wishlist.list(CUSTOMER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeated_move_does_not_count_twice() {
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    s.cart.add_line(CUSTOMER, AddLine { product_id: 1, variant_id: Some(11), quantity: Quantity::new(2).unwrap(), configuration: LineConfiguration::default() }).await.unwrap();
    let wished = s.wishlist.add(CUSTOMER, 1, Some(11), LineConfiguration::default()).await.unwrap();

    s.wishlist.move_to_cart(CUSTOMER, wished.id, Quantity::new(3).unwrap()).await.unwrap();
    let again = s.wishlist.move_to_cart(CUSTOMER, wished.id, Quantity::new(3).unwrap()).await;
    assert!(matches!(again, Err(CommerceError::NotFound { entity: "wishlist line", .. })));
    assert_eq!(s.cart.summarize(CUSTOMER, customer()).await.unwrap().items[0].quantity, 5);
}

#[tokio::test]
async fn test_move_onto_stale_cart_line_writes_nothing() {
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    let in_cart = s
        .cart
        .add_line(CUSTOMER, AddLine { product_id: 1, variant_id: Some(11), quantity: Quantity::one(), configuration: LineConfiguration::default() })
        .await
        .unwrap();
    let wished = s.wishlist.add(CUSTOMER, 1, Some(11), LineConfiguration::default()).await.unwrap();
    s.cart.update_quantity(CUSTOMER, in_cart.id, Quantity::new(2).unwrap()).await.unwrap();

    let write = CartWrite::Update { line: in_cart.stamp(), quantity: Quantity::new(4).unwrap() };
    let result = s.store.move_to_cart(wished.wishlist_id, wished.id, write).await;
    assert!(matches!(result, Err(CommerceError::Conflict(_))));
    assert_eq!(s.wishlist.list(CUSTOMER).await.unwrap().len(), 1);
    let cart_id = s.store.cart_for(CUSTOMER).await.unwrap();
    assert_eq!(s.store.cart_lines(cart_id).await.unwrap()[0].quantity.value(), 2);
}

#[tokio::test]
async fn test_move_of_missing_wishlist_line_inserts_nothing() {
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    let wishlist_id = s.store.wishlist_for(CUSTOMER).await.unwrap();
    let cart_id = s.store.cart_for(CUSTOMER).await.unwrap();
    let write = CartWrite::Insert(NewCartLine {
        cart_id, product_id: 1, variant_id: Some(11), quantity: Quantity::one(), configuration: LineConfiguration::default(),
    });
    let result = s.store.move_to_cart(wishlist_id, 999, write).await;
    assert!(matches!(result, Err(CommerceError::NotFound { entity: "wishlist line", id: 999 })));
    assert!(s.store.cart_lines(cart_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_is_idempotent_per_selection() {
    let s = services(seeded(vec![gold_ring(1, 11, None)]));
    let first = s.wishlist.add(CUSTOMER, 1, Some(11), LineConfiguration::default()).await.unwrap();
    let again = s.wishlist.add(CUSTOMER, 1, Some(11), LineConfiguration::default()).await.unwrap();
    let other = s.wishlist.add(CUSTOMER, 1, Some(11), config("rose")).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_ne!(first.id, other.id);
    assert_eq!(s.wishlist.list(CUSTOMER).await.unwrap().len(), 2);

    s.wishlist.remove(CUSTOMER, first.id).await.unwrap();
    assert!(matches!(s.wishlist.remove(CUSTOMER, first.id).await, Err(CommerceError::NotFound { .. })));
}

#[tokio::test]
async fn test_inactive_product_cannot_be_wished() {
    let mut retired = gold_ring(1, 11, None);
    retired.is_active = false;
    let s = services(seeded(vec![retired]));
    assert!(matches!(s.wishlist.add(CUSTOMER, 1, None, LineConfiguration::default()).await, Err(CommerceError::NotFound { entity: "product", .. })));
}
