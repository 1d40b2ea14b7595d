// tests/api_tests.rs
mod common;
use common::*;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use aurum_commerce::api::{router, AppState};
use aurum_commerce::config::AppConfig;
use aurum_commerce::services::EventPublisher;
use aurum_commerce::store::memory::MemoryStore;

fn app(store: Arc<MemoryStore>) -> Router {
    router(AppState::new(store, &AppConfig::default(), EventPublisher::disabled()))
}

async fn send(app: &Router, method: &str, uri: &str, customer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = customer {
        builder = builder.header("x-customer-id", id);
    }
    let request = match body {
        Some(body) => builder.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(seeded(vec![])), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cart_requires_customer_header() {
    let app = app(seeded(vec![]));
    let (status, _) = send(&app, "GET", "/api/v1/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, "GET", "/api/v1/cart", Some("abc"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_guest_can_browse_catalog() {
    let app = app(seeded(vec![gold_ring(1, 11, None)]));
    let (status, body) = send(&app, "GET", "/api/v1/catalog/products?sort=price_asc", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pageMeta"]["total"], 1);
    assert_eq!(body["products"][0]["configuration_label"], "18K Yellow Gold 5g");

    let (status, _) = send(&app, "GET", "/api/v1/catalog/products?page=0", None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, "GET", "/api/v1/catalog/products/99", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_reports_inventory_messages() {
    let app = app(seeded(vec![gold_ring(1, 11, Some(2))]));
    for quantity in [1, 2] {
        let (status, _) = send(&app, "POST", "/api/v1/cart/lines", Some("7"), Some(json!({"product_id": 1, "variant_id": 11, "quantity": quantity}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, cart) = send(&app, "GET", "/api/v1/cart", Some("7"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["items"][0]["quantity"], 3);

    let (status, body) = send(&app, "POST", "/api/v1/cart/submit", Some("7"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["messages"], json!(["Total quantity requested for Ring 1 (Size 1) is 3, but only 2 item(s) available."]));
}

#[tokio::test]
async fn test_oversized_quantity_is_rejected() {
    let app = app(seeded(vec![gold_ring(1, 11, None)]));
    let body = json!({"product_id": 1, "variant_id": 11, "quantity": 3_000_000_000_i64});
    let (status, _) = send(&app, "POST", "/api/v1/cart/lines", Some("7"), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, cart) = send(&app, "GET", "/api/v1/cart", Some("7"), None).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_submit_then_order() {
    let app = app(seeded(vec![gold_ring(1, 11, None)]));
    send(&app, "POST", "/api/v1/cart/lines", Some("7"), Some(json!({"product_id": 1, "variant_id": 11}))).await;

    let (status, quotations) = send(&app, "POST", "/api/v1/cart/submit", Some("7"), Some(json!({"comment": "rush"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let quotation_id = quotations[0]["id"].as_i64().unwrap();

    let (status, _) = send(&app, "POST", &format!("/api/v1/quotations/{}/order", quotation_id), Some("7"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "POST", &format!("/api/v1/quotations/{}/order", quotation_id), Some("7"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
