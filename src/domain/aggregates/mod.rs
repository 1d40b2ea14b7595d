//! Aggregates module
pub mod cart;
pub mod order;
pub mod product;
pub mod quotation;
pub mod wishlist;

pub use cart::{CartLine, CartSummary, CollapsePlan, LineConfiguration, LineStamp, MergedLine, NewCartLine};
pub use order::{NewOrder, Order, OrderError, OrderItem, OrderStatus};
pub use product::{Id, NamedRef, Product, Variant};
pub use quotation::{NewQuotation, Quotation, QuotationItem, QuotationStatus};
pub use wishlist::{NewWishlistLine, WishlistLine};
