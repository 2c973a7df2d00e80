//! Cart endpoints for the signed-in customer.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::services::{CartService, CartView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub partner_product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<CartView>> {
    let view = CartService::new(state.store).view(user.user_id).await?;
    Ok(Json(view))
}

pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<Json<CartView>> {
    let view = CartService::new(state.store)
        .add_item(user.user_id, request.partner_product_id, request.quantity)
        .await?;
    Ok(Json(view))
}

pub async fn set_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(partner_product_id): Path<Uuid>,
    Json(request): Json<SetQuantityRequest>,
) -> ApiResult<Json<CartView>> {
    let view = CartService::new(state.store)
        .set_quantity(user.user_id, partner_product_id, request.quantity)
        .await?;
    Ok(Json(view))
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(partner_product_id): Path<Uuid>,
) -> ApiResult<Json<CartView>> {
    let view = CartService::new(state.store)
        .remove_item(user.user_id, partner_product_id)
        .await?;
    Ok(Json(view))
}

pub async fn clear_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    CartService::new(state.store).clear(user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
