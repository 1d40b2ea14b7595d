// tests/catalog_tests.rs
mod common;
use common::*;

use aurum_commerce::catalog::{ReferenceKind, ReferenceRow};
use aurum_commerce::pricing::CustomerContext;
use aurum_commerce::CommerceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Thirty variant-less products priced at 10 * id, inserted in scrambled order.
fn thirty() -> Vec<aurum_commerce::domain::aggregates::Product> {
    (1..=30).map(|i| (i * 7) % 31).map(|id| flat_priced(id, Decimal::from(id * 10))).collect()
}

#[tokio::test]
async fn test_price_sorted_second_page_is_stable() {
    setup_tracing();
    let s = services(seeded(thirty()));
    let query = params(&[("sort", "price_asc"), ("page", "2"), ("per_page", "12")]);

    let page = s.catalog.search_params(&query, CustomerContext::guest()).await.unwrap();
    let ids: Vec<i64> = page.products.iter().map(|p| p.id).collect();
    assert_eq!(ids, (13..=24).collect::<Vec<i64>>());
    assert_eq!((page.page_meta.total, page.page_meta.last_page, page.page_meta.current_page), (30, 3, 2));

    let again = s.catalog.search_params(&query, CustomerContext::guest()).await.unwrap();
    assert_eq!(again.products.iter().map(|p| p.id).collect::<Vec<_>>(), ids);
}

#[tokio::test]
async fn test_price_window_and_descending_sort() {
    let s = services(seeded(thirty()));
    let query = params(&[("price_min", "100"), ("price_max", "150"), ("sort", "price_desc")]);
    let page = s.catalog.search_params(&query, CustomerContext::guest()).await.unwrap();
    assert_eq!(page.products.iter().map(|p| p.id).collect::<Vec<_>>(), vec![15, 14, 13, 12, 11, 10]);
    assert_eq!(page.products[0].price_total, dec!(150));
}

#[tokio::test]
async fn test_text_search_matches_name_or_sku() {
    let s = services(seeded(thirty()));
    let page = s.catalog.search_params(&params(&[("search", "ring-2"), ("per_page", "50")]), CustomerContext::guest()).await.unwrap();
    // RING-2 and RING-20 through RING-29
    assert_eq!(page.page_meta.total, 11);
}

#[tokio::test]
async fn test_metal_facet_and_inactive_products() {
    let mut retired = gold_ring(3, 33, None);
    retired.is_active = false;
    let s = services(seeded(vec![gold_ring(1, 11, None), flat_priced(2, dec!(90)), retired]));
    let page = s.catalog.search_params(&params(&[("metal[]", "1"), ("metal_purity", "18")]), customer()).await.unwrap();
    assert_eq!(page.products.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1]);
    assert_eq!(page.products[0].configuration_label.as_deref(), Some("18K Yellow Gold 5g"));
    assert_eq!(page.products[0].price_total, dec!(800));

    assert!(s.catalog.search_params(&params(&[("metal", "gold")]), customer()).await.is_err());
    assert!(matches!(s.catalog.product_detail(3, customer()).await, Err(CommerceError::NotFound { .. })));
}

#[tokio::test]
async fn test_product_detail_lists_configurations() {
    let mut ring = gold_ring(1, 11, Some(4));
    let mut heavier = variant(12, 1, None);
    heavier.metals = vec![gold_link(dec!(10))];
    heavier.label = None;
    ring.variants.push(heavier);
    let s = services(seeded(vec![ring]));

    let detail = s.catalog.product_detail(1, customer()).await.unwrap();
    let configurations: Vec<(i64, &str, Decimal)> =
        detail.configurations.iter().map(|c| (c.variant_id, c.label.as_str(), c.price_total)).collect();
    assert_eq!(configurations, vec![(11, "18K Yellow Gold 5g", dec!(800)), (12, "18K Yellow Gold 10g", dec!(1100))]);
    assert_eq!(detail.configurations[0].inventory_quantity, Some(4));
    assert_eq!(detail.product.price_total, dec!(800));
}

#[tokio::test]
async fn test_effective_price_is_default_variant_even_without_links() {
    let mut ring = gold_ring(1, 11, None);
    ring.variants[0].metals.clear();
    let mut heavier = variant(12, 1, None);
    heavier.metals = vec![gold_link(dec!(10))];
    ring.variants.push(heavier);
    let s = services(seeded(vec![ring]));

    let detail = s.catalog.product_detail(1, customer()).await.unwrap();
    assert_eq!(detail.product.default_variant_id, Some(11));
    assert_eq!(detail.product.configuration_label.as_deref(), Some("Size 1"));
    assert_eq!(detail.product.price_total, dec!(500));

    let page = s.catalog.search_params(&params(&[("sort", "price_asc")]), customer()).await.unwrap();
    assert_eq!(page.products[0].price_total, dec!(500));
}

#[tokio::test]
async fn test_recent_products_are_newest_first_and_limited() {
    let s = services(seeded(thirty()));
    let recent = s.catalog.recent_products(CustomerContext::guest()).await.unwrap();
    // created_at steps back one minute per id
    assert_eq!(recent.iter().map(|p| p.id).collect::<Vec<_>>(), (1..=8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_facets_list_active_reference_values() {
    let row = |id, name: &str, is_active, display_order| ReferenceRow { id, name: name.into(), is_active, display_order };
    let store = aurum_commerce::store::memory::MemoryStore::new()
        .with_reference_rows(ReferenceKind::Tone, vec![row(1, "Rose", true, 2), row(2, "Yellow", true, 1), row(3, "Black", false, 0)])
        .with_reference_rows(ReferenceKind::Size, vec![row(7, "US 6", true, 0)]);
    let s = services(std::sync::Arc::new(store));

    let facets = s.catalog.facets().await.unwrap();
    assert_eq!(facets.tones.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(), vec!["Yellow", "Rose"]);
    assert_eq!(facets.sizes.len(), 1);
    assert!(facets.metals.is_empty());
}
