use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use super::extract::ValidJson;
use super::AppState;
use crate::application::{ExpirySweepReport, Principal, StockAction, StockAdjustment, StockSnapshot};
use crate::domain::aggregates::BatchInfo;
use crate::store::CommerceStore;
use crate::CommerceError;

#[derive(Debug, Deserialize, Validate)]
pub struct StockUpdateBody {
    pub action: StockAction,
    #[validate(range(max = 1_000_000))]
    pub quantity: u32,
    #[validate(length(min = 1, max = 200))]
    pub reason: Option<String>,
    #[serde(alias = "batchInfo")]
    pub batch: Option<BatchInfo>,
}

pub async fn update_stock<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(product_id): Path<String>,
    ValidJson(body): ValidJson<StockUpdateBody>,
) -> Result<Json<StockSnapshot>, CommerceError> {
    let adjustment = StockAdjustment { action: body.action, quantity: body.quantity, reason: body.reason, batch: body.batch };
    Ok(Json(state.inventory.adjust_stock(&principal, &product_id, adjustment).await?))
}

pub async fn get_stock<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(product_id): Path<String>,
) -> Result<Json<StockSnapshot>, CommerceError> {
    Ok(Json(state.inventory.snapshot(&principal, &product_id).await?))
}

pub async fn expiry_sweep<S: CommerceStore>(
    State(state): State<AppState<S>>,
    principal: Principal,
) -> Result<Json<ExpirySweepReport>, CommerceError> {
    Ok(Json(state.inventory.sweep_expiry(&principal, Utc::now()).await?))
}
