use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use super::extract::ValidJson;
use super::AppState;
use crate::application::{CheckoutRequest, OrderAction, OrderTransition, Principal};
use crate::domain::aggregates::{Address, Order, PaymentMethod};
use crate::store::CommerceStore;
use crate::CommerceError;

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderBody {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate]
    pub shipping_address: AddressBody,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressBody {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub street1: String,
    pub street2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub zip: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusChangeBody {
    pub action: OrderAction,
    #[validate(length(min = 1, max = 64))]
    pub tracking: Option<String>,
}

impl From<AddressBody> for Address {
    fn from(body: AddressBody) -> Self {
        Address {
            name: body.name, street1: body.street1, street2: body.street2, city: body.city,
            state: body.state, zip: body.zip, country: body.country,
        }
    }
}

pub async fn place_order<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    ValidJson(body): ValidJson<PlaceOrderBody>,
) -> Result<(StatusCode, Json<Order>), CommerceError> {
    let request = CheckoutRequest {
        user_id: body.user_id,
        shipping_address: body.shipping_address.into(),
        payment_method: body.payment_method,
        notes: body.notes.filter(|n| !n.trim().is_empty()),
    };
    let order = state.checkout.checkout(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Order>, CommerceError> {
    Ok(Json(state.orders.order(&principal, &id).await?))
}

pub async fn change_status<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<StatusChangeBody>,
) -> Result<Json<Order>, CommerceError> {
    let transition = OrderTransition { action: body.action, tracking: body.tracking };
    Ok(Json(state.orders.transition(&principal, &id, transition).await?))
}
