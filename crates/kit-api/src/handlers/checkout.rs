use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::services::{CheckoutRequest, CheckoutResult, CheckoutService};
use crate::state::AppState;

fn service(state: &AppState) -> CheckoutService {
    CheckoutService::new(
        state.store.clone(),
        state.gateway.clone(),
        state.config.shipping,
    )
}

/// Create orders from the cart and a PaymentIntent to pay for them
#[instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutResult>)> {
    let result = service(&state).checkout(&user.profile, request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Hand back the client secret for a transaction whose payment failed
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn retry_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<Json<CheckoutResult>> {
    let result = service(&state)
        .retry_payment(&user.profile, transaction_id)
        .await?;
    Ok(Json(result))
}
