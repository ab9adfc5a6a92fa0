#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use opensase_commerce::application::{CheckoutCoordinator, CheckoutRequest, CheckoutSettings, Principal, Role};
use opensase_commerce::domain::aggregates::{Address, BatchInfo, Cart, CartItem, PaymentMethod, Product, StockLedger};
use opensase_commerce::domain::services::PricingPolicy;
use opensase_commerce::domain::value_objects::{Money, Sku};
use opensase_commerce::notify::RecordingSink;
use opensase_commerce::store::{CartStore, Catalog, CommerceStore, InventoryStore};
use rust_decimal::Decimal;

/// Registers an active product priced in cents, stocked with
/// `(quantity, expires_in_days)` batches in the given order.
pub async fn stocked<S: CommerceStore>(store: &S, id: &str, price_cents: i64, reorder_level: u32, batches: &[(u32, Option<i64>)]) {
    let mut product = Product::with_id(id, Sku::new(id).unwrap(), format!("Product {id}"), Money::usd(Decimal::new(price_cents, 2)));
    product.publish();
    let mut ledger = StockLedger::new(id, reorder_level, 0);
    for (n, (quantity, expires_in)) in batches.iter().enumerate() {
        let info = BatchInfo {
            batch_number: Some(format!("{id}-B{}", n + 1)),
            expiry_date: expires_in.map(|days| Utc::now() + Duration::days(days)),
            ..Default::default()
        };
        ledger.add(*quantity, Some(info), "test").unwrap();
    }
    store.insert_product(product, ledger).await.unwrap();
}

/// Adds items to the user's active cart at the current catalog price.
pub async fn fill_cart<S: CommerceStore>(store: &S, user_id: &str, items: &[(&str, u32)]) -> Cart {
    let mut cart = store.active_cart(user_id).await.unwrap().unwrap_or_else(|| Cart::for_user(user_id, "USD"));
    for (product_id, quantity) in items {
        let product = store.product(product_id).await.unwrap().unwrap();
        cart.add_item(CartItem::new(*product_id, *quantity, product.effective_price().clone())).unwrap();
    }
    store.save_cart(cart).await.unwrap()
}

pub async fn current<S: CommerceStore>(store: &S, product_id: &str) -> u32 {
    store.ledger(product_id).await.unwrap().unwrap().stock().current
}

pub fn coordinator<S: CommerceStore>(store: Arc<S>, sink: &RecordingSink, settings: CheckoutSettings) -> CheckoutCoordinator<S> {
    CheckoutCoordinator::new(store, Arc::new(sink.clone()), PricingPolicy::default(), settings)
}

pub fn customer(user_id: &str) -> Principal {
    Principal::new(user_id, Role::Customer)
}

pub fn request(user_id: &str) -> CheckoutRequest {
    CheckoutRequest {
        user_id: user_id.to_string(),
        shipping_address: address(),
        payment_method: PaymentMethod::Card,
        notes: None,
    }
}

pub fn address() -> Address {
    Address {
        name: "Ada Obi".into(),
        street1: "12 Marina Rd".into(),
        street2: None,
        city: "Lagos".into(),
        state: Some("LA".into()),
        zip: "101001".into(),
        country: "NG".into(),
    }
}
