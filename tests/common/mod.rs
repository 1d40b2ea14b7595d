// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::Arc;

use aurum_commerce::domain::aggregates::product::{MakingCharge, NamedRef, Product, Variant, VariantMetal};
use aurum_commerce::pricing::{CustomerContext, CustomerTier, PricingPolicy, RateTable};
use aurum_commerce::services::{CartService, CatalogService, EventPublisher, OrderService, WishlistService};
use aurum_commerce::catalog::PagingDefaults;
use aurum_commerce::store::memory::MemoryStore;
use aurum_commerce::store::Store;
use aurum_commerce::Id;

pub const CUSTOMER: Id = 7;

pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("debug").try_init();
}

pub fn customer() -> CustomerContext { CustomerContext::new(CUSTOMER, CustomerTier::Retail) }

/// Gold 18K yellow at 60/g.
pub fn rates() -> RateTable { RateTable::default().with_metal_rate(1, 18, 2, dec!(60)) }

pub fn gold_link(weight: Decimal) -> VariantMetal {
    VariantMetal {
        metal: Some(NamedRef::new(1, "Gold")),
        purity: Some(NamedRef::new(18, "18K")),
        tone: Some(NamedRef::new(2, "Yellow")),
        weight: Some(weight),
    }
}

pub fn variant(id: Id, product_id: Id, inventory: Option<i64>) -> Variant {
    Variant {
        id, product_id, label: Some(format!("Size {}", id % 10)), sku: None, inventory_quantity: inventory, is_default: false,
        size: None, metadata: Value::Null, metals: vec![gold_link(dec!(5))], diamonds: vec![],
    }
}

pub fn product(id: Id, making: MakingCharge, variants: Vec<Variant>) -> Product {
    Product {
        id, name: format!("Ring {}", id), sku: format!("RING-{}", id), uses_metal: true, uses_diamond: false, is_active: true,
        base_price: None, making_charge: making, metadata: Value::Null, category: None, brand: None, catalogs: vec![],
        variants, media: vec![], created_at: Utc::now() - Duration::minutes(id),
    }
}

/// 5g gold at 60/g plus a fixed 500 making charge: 800 per unit.
pub fn gold_ring(id: Id, variant_id: Id, inventory: Option<i64>) -> Product {
    product(id, MakingCharge { fixed_amount: Some(dec!(500)), percentage: None }, vec![variant(variant_id, id, inventory)])
}

/// No variants, priced by its fixed making charge alone.
pub fn flat_priced(id: Id, price: Decimal) -> Product {
    product(id, MakingCharge { fixed_amount: Some(price), percentage: None }, vec![])
}

pub fn seeded(products: Vec<Product>) -> Arc<MemoryStore> {
    Arc::new(products.into_iter().fold(MemoryStore::new().with_rates(rates()), MemoryStore::with_product))
}

pub struct Services {
    pub store: Arc<MemoryStore>,
    pub catalog: CatalogService,
    pub cart: CartService,
    pub wishlist: WishlistService,
    pub orders: OrderService,
}

pub fn services(store: Arc<MemoryStore>) -> Services {
    let dyn_store: Arc<dyn Store> = store.clone();
    Services {
        catalog: CatalogService::new(dyn_store.clone(), PagingDefaults::default(), PricingPolicy::default(), 8),
        cart: CartService::new(dyn_store.clone(), EventPublisher::disabled(), PricingPolicy::default(), "INR"),
        wishlist: WishlistService::new(dyn_store.clone()),
        orders: OrderService::new(dyn_store, EventPublisher::disabled(), "INR"),
        store,
    }
}
