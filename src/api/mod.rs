//! HTTP surface
//!
//! Customer identity arrives in `x-customer-id` / `x-customer-tier` headers set by the
//! upstream auth gateway. Requests without an id are priced as guests and cannot touch
//! carts, wishlists or quotations.

pub mod handlers;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::aggregates::Id;
use crate::pricing::{CustomerContext, CustomerTier};
use crate::services::{CartService, CatalogService, EventPublisher, OrderService, WishlistService};
use crate::store::Store;
use crate::{CommerceError, Result};

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";
pub const CUSTOMER_TIER_HEADER: &str = "x-customer-tier";

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub cart: CartService,
    pub wishlist: WishlistService,
    pub orders: OrderService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &AppConfig, events: EventPublisher) -> Self {
        Self {
            catalog: CatalogService::new(store.clone(), config.paging, config.pricing.clone(), config.dashboard_recent_limit),
            cart: CartService::new(store.clone(), events.clone(), config.pricing.clone(), config.currency.clone()),
            wishlist: WishlistService::new(store.clone()),
            orders: OrderService::new(store, events, config.currency.clone()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    use handlers::*;
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "aurum-commerce"})) }))
        .route("/api/v1/catalog/products", get(search_catalog))
        .route("/api/v1/catalog/products/:id", get(product_detail))
        .route("/api/v1/catalog/facets", get(catalog_facets))
        .route("/api/v1/dashboard/recent-products", get(recent_products))
        .route("/api/v1/cart", get(cart_summary))
        .route("/api/v1/cart/lines", post(add_cart_line))
        .route("/api/v1/cart/lines/:id", patch(update_cart_quantity).delete(remove_cart_line))
        .route("/api/v1/cart/lines/:id/notes", put(update_cart_notes))
        .route("/api/v1/cart/merged", put(update_merged_quantity))
        .route("/api/v1/cart/collapse", post(collapse_cart))
        .route("/api/v1/cart/submit", post(submit_cart))
        .route("/api/v1/wishlist", get(list_wishlist).post(add_to_wishlist))
        .route("/api/v1/wishlist/:id", delete(remove_from_wishlist))
        .route("/api/v1/wishlist/:id/move-to-cart", post(move_wishlist_to_cart))
        .route("/api/v1/quotations", get(list_quotations))
        .route("/api/v1/quotations/:id/order", post(place_order))
        .route("/api/v1/orders", get(list_orders))
        .with_state(state)
}

/// Pricing context of the caller.
#[derive(Clone, Copy, Debug)]
pub struct Customer(pub CustomerContext);

impl Customer {
    pub fn id(&self) -> Result<Id> {
        self.0.customer_id.ok_or_else(|| CommerceError::Unauthorized(format!("missing {} header", CUSTOMER_ID_HEADER)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Customer {
    type Rejection = CommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let Some(raw_id) = header(parts, CUSTOMER_ID_HEADER) else { return Ok(Self(CustomerContext::guest())) };
        let id: Id = raw_id.parse().map_err(|_| CommerceError::Validation(format!("invalid {} header '{}'", CUSTOMER_ID_HEADER, raw_id)))?;
        let tier = match header(parts, CUSTOMER_TIER_HEADER) {
            Some(raw) => raw.parse::<CustomerTier>().map_err(CommerceError::Validation)?,
            None => CustomerTier::Retail,
        };
        Ok(Self(CustomerContext::new(id, tier)))
    }
}

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            CommerceError::NotFound { .. } => (StatusCode::NOT_FOUND, json!({"error": self.to_string()})),
            CommerceError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, json!({"error": m})),
            CommerceError::Conflict(m) => (StatusCode::CONFLICT, json!({"error": m})),
            CommerceError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, json!({"error": m})),
            CommerceError::InventoryExceeded(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Requested quantities exceed available inventory",
                    "messages": violations.iter().map(|v| v.message.as_str()).collect::<Vec<_>>(),
                    "violations": violations,
                }),
            ),
            CommerceError::Storage(_) | CommerceError::Migration(_) | CommerceError::Config(_) => {
                tracing::error!(error = %self, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "Internal server error"}))
            }
        };
        (status, Json(body)).into_response()
    }
}
