//! Cart maintenance ahead of checkout.

use std::sync::Arc;

use super::Principal;
use crate::domain::aggregates::{Cart, CartItem};
use crate::store::{CartStore, Catalog};
use crate::{CommerceError, Result};

pub struct CartService<S> {
    store: Arc<S>,
    currency: String,
    max_attempts: u32,
}

impl<S: Catalog + CartStore> CartService<S> {
    pub fn new(store: Arc<S>, currency: impl Into<String>, max_attempts: u32) -> Self {
        Self { store, currency: currency.into(), max_attempts: max_attempts.max(1) }
    }

    /// The user's active cart, or an empty unsaved one.
    pub async fn view(&self, principal: &Principal, user_id: &str) -> Result<Cart> {
        authorize(principal, user_id)?;
        Ok(self.store.active_cart(user_id).await?.unwrap_or_else(|| Cart::for_user(user_id, &self.currency)))
    }

    pub async fn add_item(&self, principal: &Principal, user_id: &str, product_id: &str, quantity: u32) -> Result<Cart> {
        authorize(principal, user_id)?;
        let product = self
            .store
            .product(product_id)
            .await?
            .filter(|p| p.is_active())
            .ok_or_else(|| CommerceError::ProductUnavailable { product_id: product_id.to_string() })?;
        let price = product.effective_price().clone();
        self.update(user_id, |cart| Ok(cart.add_item(CartItem::new(product_id, quantity, price.clone()))?)).await
    }

    pub async fn remove_item(&self, principal: &Principal, user_id: &str, product_id: &str) -> Result<Cart> {
        authorize(principal, user_id)?;
        self.update(user_id, |cart| Ok(cart.remove_item(product_id)?)).await
    }

    async fn update(&self, user_id: &str, change: impl Fn(&mut Cart) -> Result<()>) -> Result<Cart> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut cart = self.store.active_cart(user_id).await?.unwrap_or_else(|| Cart::for_user(user_id, &self.currency));
            change(&mut cart)?;
            match self.store.save_cart(cart).await {
                Ok(saved) => {
                    tracing::debug!(user_id, cart_id = saved.id(), items = saved.item_count(), "cart saved");
                    return Ok(saved);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(user_id, attempt, "cart write conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn authorize(principal: &Principal, user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(CommerceError::validation("user id is required"));
    }
    if !principal.can_act_for(user_id) {
        return Err(CommerceError::forbidden(format!("{} cannot modify the cart of {user_id}", principal.user_id)));
    }
    Ok(())
}
