//! HTTP surface.

pub mod cart;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod orders;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::application::{CartService, CheckoutCoordinator, CheckoutSettings, InventoryService, OrderService};
use crate::domain::services::PricingPolicy;
use crate::notify::AuditSink;
use crate::store::CommerceStore;

pub use error::json_error;

pub struct AppState<S> {
    pub checkout: Arc<CheckoutCoordinator<S>>,
    pub inventory: Arc<InventoryService<S>>,
    pub carts: Arc<CartService<S>>,
    pub orders: Arc<OrderService<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            checkout: self.checkout.clone(),
            inventory: self.inventory.clone(),
            carts: self.carts.clone(),
            orders: self.orders.clone(),
        }
    }
}

impl<S: CommerceStore> AppState<S> {
    pub fn new(store: Arc<S>, sink: Arc<dyn AuditSink>, pricing: PricingPolicy, settings: CheckoutSettings) -> Self {
        let max_attempts = settings.max_attempts;
        Self {
            carts: Arc::new(CartService::new(store.clone(), pricing.currency.clone(), max_attempts)),
            inventory: Arc::new(InventoryService::new(store.clone(), sink.clone(), max_attempts)),
            orders: Arc::new(OrderService::new(store.clone(), sink.clone(), max_attempts)),
            checkout: Arc::new(CheckoutCoordinator::new(store, sink, pricing, settings)),
        }
    }
}

pub fn router<S: CommerceStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-commerce"})) }))
        .route("/api/v1/cart/:user_id", get(cart::get_cart::<S>))
        .route("/api/v1/cart/:user_id/items", post(cart::add_item::<S>))
        .route("/api/v1/cart/:user_id/items/:product_id", delete(cart::remove_item::<S>))
        .route("/api/v1/orders", post(orders::place_order::<S>))
        .route("/api/v1/orders/:id", get(orders::get_order::<S>))
        .route("/api/v1/orders/:id/status", post(orders::change_status::<S>))
        .route("/api/v1/inventory/expiry-sweep", post(inventory::expiry_sweep::<S>))
        .route("/api/v1/inventory/:product_id", get(inventory::get_stock::<S>))
        .route("/api/v1/inventory/:product_id/stock", put(inventory::update_stock::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
