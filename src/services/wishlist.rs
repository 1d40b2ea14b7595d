//! Wishlist operations, including the move into the cart.

use std::sync::Arc;
use tracing::instrument;

use super::purchasable;
use crate::domain::aggregates::cart::check_quantity_change;
use crate::domain::aggregates::{CartLine, Id, LineConfiguration, NewCartLine, NewWishlistLine, WishlistLine};
use crate::domain::value_objects::Quantity;
use crate::store::{CartWrite, Store};
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct WishlistService {
    store: Arc<dyn Store>,
}

impl WishlistService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn list(&self, customer_id: Id) -> Result<Vec<WishlistLine>> {
        let wishlist_id = self.store.wishlist_for(customer_id).await?;
        self.store.wishlist_lines(wishlist_id).await
    }

    /// Adding an identical selection twice returns the existing line.
    #[instrument(skip(self, configuration))]
    pub async fn add(&self, customer_id: Id, product_id: Id, variant_id: Option<Id>, configuration: LineConfiguration) -> Result<WishlistLine> {
        purchasable(self.store.as_ref(), product_id, variant_id).await?;
        let wishlist_id = self.store.wishlist_for(customer_id).await?;
        let candidate = NewWishlistLine { wishlist_id, product_id, variant_id, configuration };
        if let Some(existing) = self.store.wishlist_lines(wishlist_id).await?.into_iter().find(|l| l.is_same(&candidate)) {
            return Ok(existing);
        }
        self.store.insert_wishlist_line(candidate).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, customer_id: Id, line_id: Id) -> Result<()> {
        let wishlist_id = self.store.wishlist_for(customer_id).await?;
        if self.store.delete_wishlist_line(wishlist_id, line_id).await? { Ok(()) } else { Err(CommerceError::not_found("wishlist line", line_id)) }
    }

    /// An existing cart line for the same product and variant (configuration ignored)
    /// is incremented; otherwise a new line is created. The wishlist line is removed
    /// either way, in the same store write, so a retried move never counts twice.
    #[instrument(skip(self))]
    pub async fn move_to_cart(&self, customer_id: Id, line_id: Id, quantity: Quantity) -> Result<CartLine> {
        let wishlist_id = self.store.wishlist_for(customer_id).await?;
        let wished = self
            .store
            .wishlist_lines(wishlist_id)
            .await?
            .into_iter()
            .find(|l| l.id == line_id)
            .ok_or(CommerceError::not_found("wishlist line", line_id))?;
        let product = purchasable(self.store.as_ref(), wished.product_id, wished.variant_id).await?;
        let inventory = wished.variant_id.and_then(|id| product.variant(id)).and_then(|v| v.inventory_quantity);

        let cart_id = self.store.cart_for(customer_id).await?;
        let existing = self.store.cart_lines(cart_id).await?.into_iter().find(|l| l.same_selection(wished.product_id, wished.variant_id));
        let write = match existing {
            Some(line) => {
                let total = line.quantity.checked_add(quantity)?;
                check_quantity_change(u64::from(line.quantity.value()), total, inventory)?;
                CartWrite::Update { line: line.stamp(), quantity: total }
            }
            None => {
                check_quantity_change(0, quantity, inventory)?;
                CartWrite::Insert(NewCartLine {
                    cart_id,
                    product_id: wished.product_id,
                    variant_id: wished.variant_id,
                    quantity,
                    configuration: wished.configuration,
                })
            }
        };
        self.store.move_to_cart(wishlist_id, line_id, write).await
    }
}
