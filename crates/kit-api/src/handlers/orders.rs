//! Customer order history and cancellation.

use axum::extract::{Path, Query, State};
use axum::Json;
use kit_core::{Order, OrderFilter};
use serde_json::{json, Value};
use uuid::Uuid;

use super::StatusQuery;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::services::OrderService;
use crate::state::AppState;

fn service(state: &AppState) -> OrderService {
    OrderService::new(state.store.clone(), state.gateway.clone())
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    let filter = OrderFilter {
        customer_id: Some(user.user_id),
        status: query.status,
        ..OrderFilter::default()
    };
    let orders = service(&state).list(&filter).await?;
    Ok(Json(json!({
        "count": orders.len(),
        "orders": orders,
    })))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let order = service(&state).get_for_customer(user.user_id, id).await?;
    Ok(Json(order))
}

/// Cancel an order that has not been paid yet
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let order = service(&state).cancel_order(user.user_id, id).await?;
    Ok(Json(order))
}
