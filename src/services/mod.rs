//! Application services
//!
//! Each service loads what one request needs from the [`Store`], runs the pure engines
//! over it and writes back. Nothing is cached between calls.

pub mod cart;
pub mod catalog;
pub mod events;
pub mod orders;
pub mod wishlist;

pub use cart::{AddLine, CartService};
pub use catalog::{CatalogPage, CatalogService, ProductDetail};
pub use events::EventPublisher;
pub use orders::OrderService;
pub use wishlist::WishlistService;

use std::collections::HashMap;

use crate::domain::aggregates::{Id, Product};
use crate::pricing::{Offer, PricingEngine, PricingPolicy, RateTable};
use crate::store::{CatalogStore, CostModelStore};
use crate::{CommerceError, Result};

/// Rate snapshot and active offers for one request.
pub(crate) struct PricingInputs {
    rates: RateTable,
    offers: Vec<Offer>,
}

impl PricingInputs {
    pub(crate) async fn load<S: CostModelStore + ?Sized>(store: &S) -> Result<Self> {
        Ok(Self { rates: store.rate_table().await?, offers: store.active_offers().await? })
    }

    pub(crate) fn engine<'a>(&'a self, policy: &'a PricingPolicy) -> PricingEngine<'a> {
        PricingEngine::new(&self.rates, &self.offers, policy)
    }
}

/// Products by id. Every requested id must exist.
pub(crate) async fn products_by_id<S: CatalogStore + ?Sized>(store: &S, ids: impl IntoIterator<Item = Id>) -> Result<HashMap<Id, Product>> {
    let mut wanted: Vec<Id> = ids.into_iter().collect();
    wanted.sort_unstable();
    wanted.dedup();
    let products: HashMap<Id, Product> = store.find_products(&wanted).await?.into_iter().map(|p| (p.id, p)).collect();
    match wanted.iter().find(|id| !products.contains_key(id)) {
        Some(missing) => Err(CommerceError::not_found("product", *missing)),
        None => Ok(products),
    }
}

/// An active product and, when given, one of its variants.
pub(crate) async fn purchasable<S: CatalogStore + ?Sized>(store: &S, product_id: Id, variant_id: Option<Id>) -> Result<Product> {
    let product = store
        .find_product(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or(CommerceError::not_found("product", product_id))?;
    if let Some(variant_id) = variant_id {
        if product.variant(variant_id).is_none() {
            return Err(CommerceError::not_found("variant", variant_id));
        }
    }
    Ok(product)
}
