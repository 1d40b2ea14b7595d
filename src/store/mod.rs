//! Storage seams.
//!
//! Services talk to the data store only through these traits. `postgres` is the
//! production implementation; `memory` keeps everything in process and backs the
//! service tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::catalog::{Predicate, ReferenceKind, ReferenceRow, StorageOrder};
use crate::domain::aggregates::{
    CartLine, CollapsePlan, Id, LineConfiguration, LineStamp, NewCartLine, NewOrder, NewQuotation, NewWishlistLine, Order, Product,
    Quotation, QuotationStatus, WishlistLine,
};
use crate::domain::value_objects::Quantity;
use crate::pricing::{Offer, RateTable};
use crate::Result;

/// Cost Model Accessor: current reference rates and promotional offers.
#[async_trait]
pub trait CostModelStore: Send + Sync {
    async fn rate_table(&self) -> Result<RateTable>;
    async fn active_offers(&self) -> Result<Vec<Offer>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Product graphs (variants, metal/diamond links, media) matching `predicate`.
    async fn fetch_products(&self, predicate: &Predicate, order: StorageOrder, limit: Option<i64>) -> Result<Vec<Product>>;
    async fn find_products(&self, ids: &[Id]) -> Result<Vec<Product>>;
    async fn reference_rows(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRow>>;

    async fn find_product(&self, id: Id) -> Result<Option<Product>> {
        Ok(self.find_products(&[id]).await?.into_iter().next())
    }
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The customer's cart id, created on first use.
    async fn cart_for(&self, customer_id: Id) -> Result<Id>;
    async fn cart_lines(&self, cart_id: Id) -> Result<Vec<CartLine>>;
    async fn insert_line(&self, line: NewCartLine) -> Result<CartLine>;
    /// Fails with `Conflict` when the line's version is no longer `expected_version`.
    async fn update_line(&self, line_id: Id, expected_version: i64, quantity: Quantity, configuration: &LineConfiguration) -> Result<CartLine>;
    async fn delete_line(&self, cart_id: Id, line_id: Id) -> Result<bool>;
    /// Apply a collapse plan in one transaction. Every stamped line must still be in the
    /// cart at its stamped version, otherwise nothing is written.
    async fn collapse(&self, cart_id: Id, plan: &CollapsePlan) -> Result<CartLine>;
    /// Insert the quotations and delete the stamped lines from the cart, atomically.
    /// Fails with `Conflict` unless the cart holds exactly those lines at those versions.
    async fn submit_quotations(&self, cart_id: Id, lines: &[LineStamp], quotations: Vec<NewQuotation>) -> Result<Vec<Quotation>>;
}

/// The cart half of a wishlist move.
#[derive(Clone, Debug, PartialEq)]
pub enum CartWrite {
    /// Set an existing line to `quantity`, provided it is still at the stamped version.
    Update { line: LineStamp, quantity: Quantity },
    Insert(NewCartLine),
}

#[async_trait]
pub trait WishlistStore: Send + Sync {
    async fn wishlist_for(&self, customer_id: Id) -> Result<Id>;
    async fn wishlist_lines(&self, wishlist_id: Id) -> Result<Vec<WishlistLine>>;
    async fn insert_wishlist_line(&self, line: NewWishlistLine) -> Result<WishlistLine>;
    async fn delete_wishlist_line(&self, wishlist_id: Id, line_id: Id) -> Result<bool>;
    /// Apply `write` and remove the wishlist line in one transaction. Nothing is
    /// written when the wishlist line is gone or the cart line moved on.
    async fn move_to_cart(&self, wishlist_id: Id, line_id: Id, write: CartWrite) -> Result<CartLine>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_quotation(&self, customer_id: Id, quotation_id: Id) -> Result<Option<Quotation>>;
    async fn customer_quotations(&self, customer_id: Id) -> Result<Vec<Quotation>>;
    /// Newest first.
    async fn customer_orders(&self, customer_id: Id) -> Result<Vec<Order>>;
    /// Insert the order and mark the quotation `ordered`, atomically. Fails with
    /// `Conflict` if the quotation is no longer in `expected` status.
    async fn place_order(&self, order: NewOrder, expected: QuotationStatus) -> Result<Order>;
}

pub trait Store: CostModelStore + CatalogStore + CartStore + WishlistStore + OrderStore {}

impl<T> Store for T where T: CostModelStore + CatalogStore + CartStore + WishlistStore + OrderStore {}
