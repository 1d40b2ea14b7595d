//! Aurum Commerce
//!
//! Pricing, catalog and cart reconciliation core for a B2B jewelry storefront.
//!
//! ## Features
//! - Price breakdowns per product configuration (metal, diamond, making charge, discount)
//! - Configuration enumeration with human-readable labels
//! - Faceted catalog search with price filtering and sorting over computed prices
//! - Cart reconciliation, inventory-bounded quantity edits, atomic quotation submission
//! - Wishlist and order snapshots

use serde::Serialize;
use thiserror::Error;

pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod pricing;
pub mod services;
pub mod store;

pub use domain::aggregates::product::Id;

// =============================================================================
// Error Types
// =============================================================================

/// One product/variant whose requested cart quantity cannot be satisfied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InventoryViolation {
    pub product_id: Id,
    pub variant_id: Id,
    pub requested: u64,
    pub available: i64,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Id },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Inventory exceeded: {}", .0.iter().map(|v| v.message.as_str()).collect::<Vec<_>>().join(" "))]
    InventoryExceeded(Vec<InventoryViolation>),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CommerceError {
    pub fn not_found(entity: &'static str, id: Id) -> Self { Self::NotFound { entity, id } }
}

impl From<domain::value_objects::QuantityError> for CommerceError {
    fn from(e: domain::value_objects::QuantityError) -> Self { Self::Validation(e.to_string()) }
}

impl From<validator::ValidationErrors> for CommerceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
