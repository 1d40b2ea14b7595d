//! Request handlers and request bodies.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use super::{AppState, Customer};
use crate::catalog::{FacetSummary, PricedProduct};
use crate::domain::aggregates::{CartLine, CartSummary, Id, LineConfiguration, Order, Quotation, WishlistLine};
use crate::domain::value_objects::Quantity;
use crate::services::{AddLine, CatalogPage, ProductDetail};
use crate::CommerceError;

type ApiResult<T> = Result<Json<T>, CommerceError>;

const MAX_NOTES_LEN: usize = 1000;

fn default_quantity() -> i64 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct AddLineRequest {
    pub product_id: Id,
    pub variant_id: Option<Id>,
    #[serde(default = "default_quantity")] #[validate(range(min = 1))] pub quantity: i64,
    #[serde(default)] pub configuration: Value,
}

#[derive(Debug, Deserialize, Validate)] pub struct QuantityRequest { #[validate(range(min = 1))] pub quantity: i64 }
#[derive(Debug, Deserialize, Validate)] pub struct NotesRequest { #[validate(length(max = 1000))] pub notes: Option<String> }
#[derive(Debug, Deserialize, Validate)] pub struct MergedQuantityRequest { #[validate(length(min = 1))] pub line_ids: Vec<Id>, #[validate(range(min = 1))] pub quantity: i64 }
#[derive(Debug, Default, Deserialize, Validate)] pub struct SubmitRequest { #[validate(length(max = 2000))] pub comment: Option<String> }
#[derive(Debug, Deserialize, Validate)] pub struct WishlistRequest { pub product_id: Id, pub variant_id: Option<Id>, #[serde(default)] pub configuration: Value }
#[derive(Debug, Deserialize, Validate)] pub struct MoveToCartRequest { #[serde(default = "default_quantity")] #[validate(range(min = 1))] pub quantity: i64 }

/// Line configuration from a request body. Notes share the length limit of the notes endpoint.
fn configuration(value: Value) -> Result<LineConfiguration, CommerceError> {
    let configuration = LineConfiguration::from_value(value)?;
    if configuration.notes().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(CommerceError::Validation(format!("notes: must be at most {} characters", MAX_NOTES_LEN)));
    }
    Ok(configuration)
}

// Catalog

pub async fn search_catalog(State(s): State<AppState>, Customer(c): Customer, Query(params): Query<Vec<(String, String)>>) -> ApiResult<CatalogPage> {
    Ok(Json(s.catalog.search_params(&params, c).await?))
}

pub async fn product_detail(State(s): State<AppState>, Customer(c): Customer, Path(id): Path<Id>) -> ApiResult<ProductDetail> {
    Ok(Json(s.catalog.product_detail(id, c).await?))
}

pub async fn catalog_facets(State(s): State<AppState>) -> ApiResult<FacetSummary> { Ok(Json(s.catalog.facets().await?)) }

pub async fn recent_products(State(s): State<AppState>, Customer(c): Customer) -> ApiResult<Vec<PricedProduct>> {
    Ok(Json(s.catalog.recent_products(c).await?))
}

// Cart

pub async fn cart_summary(State(s): State<AppState>, customer: Customer) -> ApiResult<CartSummary> {
    Ok(Json(s.cart.summarize(customer.id()?, customer.0).await?))
}

pub async fn add_cart_line(State(s): State<AppState>, customer: Customer, Json(r): Json<AddLineRequest>) -> Result<(StatusCode, Json<CartLine>), CommerceError> {
    r.validate()?;
    let line = AddLine { product_id: r.product_id, variant_id: r.variant_id, quantity: Quantity::new(r.quantity)?, configuration: configuration(r.configuration)? };
    Ok((StatusCode::CREATED, Json(s.cart.add_line(customer.id()?, line).await?)))
}

pub async fn update_cart_quantity(State(s): State<AppState>, customer: Customer, Path(id): Path<Id>, Json(r): Json<QuantityRequest>) -> ApiResult<CartLine> {
    r.validate()?;
    Ok(Json(s.cart.update_quantity(customer.id()?, id, Quantity::new(r.quantity)?).await?))
}

pub async fn update_cart_notes(State(s): State<AppState>, customer: Customer, Path(id): Path<Id>, Json(r): Json<NotesRequest>) -> ApiResult<CartLine> {
    r.validate()?;
    Ok(Json(s.cart.update_notes(customer.id()?, id, r.notes).await?))
}

pub async fn remove_cart_line(State(s): State<AppState>, customer: Customer, Path(id): Path<Id>) -> Result<StatusCode, CommerceError> {
    s.cart.remove_line(customer.id()?, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_merged_quantity(State(s): State<AppState>, customer: Customer, Json(r): Json<MergedQuantityRequest>) -> ApiResult<CartLine> {
    r.validate()?;
    Ok(Json(s.cart.update_merged_quantity(customer.id()?, &r.line_ids, Quantity::new(r.quantity)?).await?))
}

pub async fn collapse_cart(State(s): State<AppState>, customer: Customer) -> ApiResult<Vec<CartLine>> {
    Ok(Json(s.cart.collapse_duplicates(customer.id()?).await?))
}

pub async fn submit_cart(State(s): State<AppState>, customer: Customer, body: Option<Json<SubmitRequest>>) -> Result<(StatusCode, Json<Vec<Quotation>>), CommerceError> {
    let r = body.map(|Json(r)| r).unwrap_or_default();
    r.validate()?;
    let quotations = s.cart.submit(customer.id()?, r.comment.as_deref(), customer.0).await?;
    Ok((StatusCode::CREATED, Json(quotations)))
}

// Wishlist

pub async fn list_wishlist(State(s): State<AppState>, customer: Customer) -> ApiResult<Vec<WishlistLine>> {
    Ok(Json(s.wishlist.list(customer.id()?).await?))
}

pub async fn add_to_wishlist(State(s): State<AppState>, customer: Customer, Json(r): Json<WishlistRequest>) -> Result<(StatusCode, Json<WishlistLine>), CommerceError> {
    r.validate()?;
    let line = s.wishlist.add(customer.id()?, r.product_id, r.variant_id, configuration(r.configuration)?).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn remove_from_wishlist(State(s): State<AppState>, customer: Customer, Path(id): Path<Id>) -> Result<StatusCode, CommerceError> {
    s.wishlist.remove(customer.id()?, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_wishlist_to_cart(State(s): State<AppState>, customer: Customer, Path(id): Path<Id>, body: Option<Json<MoveToCartRequest>>) -> ApiResult<CartLine> {
    let quantity = match body {
        Some(Json(r)) => { r.validate()?; Quantity::new(r.quantity)? }
        None => Quantity::one(),
    };
    Ok(Json(s.wishlist.move_to_cart(customer.id()?, id, quantity).await?))
}

// Quotations & orders

pub async fn list_quotations(State(s): State<AppState>, customer: Customer) -> ApiResult<Vec<Quotation>> {
    Ok(Json(s.orders.quotations(customer.id()?).await?))
}

pub async fn place_order(State(s): State<AppState>, customer: Customer, Path(id): Path<Id>) -> Result<(StatusCode, Json<Order>), CommerceError> {
    Ok((StatusCode::CREATED, Json(s.orders.place_order(customer.id()?, id).await?)))
}

pub async fn list_orders(State(s): State<AppState>, customer: Customer) -> ApiResult<Vec<Order>> {
    Ok(Json(s.orders.orders(customer.id()?).await?))
}
