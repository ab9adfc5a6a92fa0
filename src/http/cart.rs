use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use super::extract::ValidJson;
use super::AppState;
use crate::application::Principal;
use crate::domain::aggregates::Cart;
use crate::store::CommerceStore;
use crate::CommerceError;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemBody {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(range(min = 1, max = 10_000))]
    pub quantity: u32,
}

pub async fn get_cart<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(user_id): Path<String>,
) -> Result<Json<Cart>, CommerceError> {
    Ok(Json(state.carts.view(&principal, &user_id).await?))
}

pub async fn add_item<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(user_id): Path<String>,
    ValidJson(body): ValidJson<AddItemBody>,
) -> Result<Json<Cart>, CommerceError> {
    Ok(Json(state.carts.add_item(&principal, &user_id, &body.product_id, body.quantity).await?))
}

pub async fn remove_item<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<Cart>, CommerceError> {
    Ok(Json(state.carts.remove_item(&principal, &user_id, &product_id).await?))
}
