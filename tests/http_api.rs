mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use opensase_commerce::application::CheckoutSettings;
use opensase_commerce::domain::aggregates::{Cart, Order, Product, StockLedger};
use opensase_commerce::domain::services::PricingPolicy;
use opensase_commerce::http::{router, AppState};
use opensase_commerce::notify::RecordingSink;
use opensase_commerce::store::{CartStore, Catalog, CheckoutCommit, InventoryStore, MemoryStore, OrderStore};
use opensase_commerce::{CommerceError, Result};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    stocked(store.as_ref(), "P1", 1000, 2, &[(10, None)]).await;
    let state = AppState::new(store.clone(), Arc::new(RecordingSink::new()), PricingPolicy::default(), CheckoutSettings::default());
    (router(state), store)
}

async fn call(app: &Router, method: &str, uri: &str, identity: Option<(&str, &str)>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, role)) = identity {
        builder = builder.header("x-user-id", user).header("x-user-role", role);
    }
    let request = match body {
        Some(b) => builder.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn order_body(user_id: &str) -> Value {
    json!({
        "user_id": user_id,
        "shipping_address": {
            "name": "Ada Obi", "street1": "12 Marina Rd", "city": "Lagos", "zip": "101001", "country": "NG"
        },
        "payment_method": "card",
        "notes": "leave at the gate"
    })
}

fn amount(value: &Value) -> Decimal {
    value["amount"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_identity_is_forbidden() {
    let (app, _) = app().await;
    let (status, body) = call(&app, "GET", "/api/v1/cart/u1", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn test_cart_then_order_round_trip() {
    let (app, store) = app().await;
    let me = Some(("u1", "customer"));

    let (status, cart) = call(&app, "POST", "/api/v1/cart/u1/items", me, Some(json!({"product_id": "P1", "quantity": 3}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);

    let (status, order) = call(&app, "POST", "/api/v1/orders", me, Some(order_body("u1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_method"], "card");
    // 30.00 + 8% tax + 10.00 shipping
    assert_eq!(amount(&order["total_amount"]), Decimal::new(4240, 2));
    assert_eq!(current(store.as_ref(), "P1").await, 7);

    let id = order["id"].as_str().unwrap();
    let (status, fetched) = call(&app, "GET", &format!("/api/v1/orders/{id}"), me, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_number"], order["order_number"]);

    let (status, _) = call(&app, "GET", &format!("/api/v1/orders/{id}"), Some(("u2", "customer")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "GET", &format!("/api/v1/orders/{id}"), Some(("ops", "staff")), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, cart) = call(&app, "GET", "/api/v1/cart/u1", me, None).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversell_is_conflict() {
    let (app, store) = app().await;
    fill_cart(store.as_ref(), "u1", &[("P1", 11)]).await;

    let (status, body) = call(&app, "POST", "/api/v1/orders", Some(("u1", "customer")), Some(order_body("u1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "insufficient_stock");
    assert!(body["error"]["message"].as_str().unwrap().contains("10 available"));
    assert_eq!(store.order_count().unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_bodies_are_validation_errors() {
    let (app, _) = app().await;
    let me = Some(("u1", "customer"));

    let (status, body) = call(&app, "POST", "/api/v1/cart/u1/items", me, Some(json!({"product_id": "P1", "quantity": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let mut order = order_body("u1");
    order["shipping_address"]["city"] = json!("");
    let (status, _) = call(&app, "POST", "/api/v1/orders", me, Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", "/api/v1/orders", me, Some(json!({"user_id": "u1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stock_endpoints_require_staff() {
    let (app, _) = app().await;
    let body = json!({"action": "add", "quantity": 5});
    let (status, _) = call(&app, "PUT", "/api/v1/inventory/P1/stock", Some(("u1", "customer")), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "GET", "/api/v1/inventory/P1", Some(("u1", "customer")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_adjusts_stock() {
    let (app, _) = app().await;
    let staff = Some(("ops", "staff"));

    let add = json!({
        "action": "add", "quantity": 5, "reason": "delivery",
        "batch": {"batch_number": "LOT-7", "expiry_date": "2031-06-30T00:00:00Z"}
    });
    let (status, snapshot) = call(&app, "PUT", "/api/v1/inventory/P1/stock", staff, Some(add)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["current"], 15);
    assert_eq!(snapshot["batches"][0]["batch_number"], "LOT-7");

    let (status, snapshot) = call(&app, "PUT", "/api/v1/inventory/P1/stock", Some(("root", "admin")), Some(json!({"action": "set", "quantity": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["available"], 2);
    assert_eq!(snapshot["active_alerts"][0]["kind"], "low_stock");

    let (status, body) = call(&app, "PUT", "/api/v1/inventory/P1/stock", staff, Some(json!({"action": "reduce", "quantity": 3}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "insufficient_stock");

    let (status, body) = call(&app, "GET", "/api/v1/inventory/NOPE", staff, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, report) = call(&app, "POST", "/api/v1/inventory/expiry-sweep", staff, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["ledgers_checked"], 1);
}

#[tokio::test]
async fn test_order_status_changes() {
    let (app, store) = app().await;
    let me = Some(("u1", "customer"));
    let staff = Some(("ops", "staff"));
    fill_cart(store.as_ref(), "u1", &[("P1", 1)]).await;
    let (_, order) = call(&app, "POST", "/api/v1/orders", me, Some(order_body("u1"))).await;
    let uri = format!("/api/v1/orders/{}/status", order["id"].as_str().unwrap());

    let (status, body) = call(&app, "POST", &uri, me, Some(json!({"action": "confirm"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, body) = call(&app, "POST", &uri, staff, Some(json!({"action": "confirm"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["version"], 1);

    let (status, body) = call(&app, "POST", &uri, staff, Some(json!({"action": "ship", "tracking": "1Z999"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = call(&app, "POST", &uri, staff, Some(json!({"action": "teleport"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, "POST", &uri, me, Some(json!({"action": "cancel"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["payment_status"], "voided");
}

/// Serves a catalog whose stock ledgers fail their integrity check.
#[derive(Default)]
struct CorruptLedgerStore {
    inner: MemoryStore,
}

impl Catalog for CorruptLedgerStore {
    async fn product(&self, id: &str) -> Result<Option<Product>> { self.inner.product(id).await }
    async fn insert_product(&self, product: Product, ledger: StockLedger) -> Result<()> { self.inner.insert_product(product, ledger).await }
}

impl CartStore for CorruptLedgerStore {
    async fn active_cart(&self, user_id: &str) -> Result<Option<Cart>> { self.inner.active_cart(user_id).await }
    async fn save_cart(&self, cart: Cart) -> Result<Cart> { self.inner.save_cart(cart).await }
}

impl InventoryStore for CorruptLedgerStore {
    async fn ledger(&self, product_id: &str) -> Result<Option<StockLedger>> {
        Err(CommerceError::inconsistency(format!("ledger {product_id}: batches hold 3 units, current is 10")))
    }
    async fn ledgers(&self) -> Result<Vec<StockLedger>> { Err(CommerceError::storage("connection reset by peer")) }
    async fn save_ledger(&self, ledger: StockLedger) -> Result<StockLedger> { self.inner.save_ledger(ledger).await }
}

impl OrderStore for CorruptLedgerStore {
    async fn order(&self, id: &str) -> Result<Option<Order>> { self.inner.order(id).await }
    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<Order> { self.inner.commit_checkout(commit).await }
    async fn update_order(&self, order: Order) -> Result<Order> { self.inner.update_order(order).await }
}

#[tokio::test]
async fn test_fatal_errors_are_opaque_500s() {
    let store = Arc::new(CorruptLedgerStore::default());
    stocked(store.as_ref(), "P1", 1000, 2, &[(10, None)]).await;
    let state = AppState::new(store.clone(), Arc::new(RecordingSink::new()), PricingPolicy::default(), CheckoutSettings::default());
    let app = router(state);
    let staff = Some(("ops", "staff"));

    let (status, body) = call(&app, "GET", "/api/v1/inventory/P1", staff, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "internal_inconsistency");
    assert_eq!(body["error"]["message"], "internal server error");
    assert!(!body.to_string().contains("batches hold"));

    let (status, body) = call(&app, "POST", "/api/v1/inventory/expiry-sweep", staff, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "storage_error");
    assert_eq!(body["error"]["message"], "internal server error");

    fill_cart(store.as_ref(), "u1", &[("P1", 1)]).await;
    let (status, body) = call(&app, "POST", "/api/v1/orders", Some(("u1", "customer")), Some(order_body("u1"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.to_string().contains("current is 10"));
    assert_eq!(store.inner.order_count().unwrap(), 0);
}
