//! Stripe webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use kit_core::MarketError;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::ApiResult;
use crate::services::{EventOutcome, PaymentEventProcessor};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    /// Event id was already processed
    pub duplicate: bool,
}

/// Verify the signature against the raw body, then apply the event
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            MarketError::WebhookVerificationFailed("Missing Stripe-Signature header".to_string())
        })?;

    let event = state
        .gateway
        .verify_webhook(&body, signature)
        .await
        .inspect_err(|e| warn!(error = %e, "Webhook verification failed"))?;

    info!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        payment_intent = ?event.payment_intent_id,
        "Received webhook"
    );

    let outcome = PaymentEventProcessor::new(state.store.clone())
        .process(&event)
        .await?;

    Ok(Json(WebhookResponse {
        received: true,
        duplicate: outcome == EventOutcome::Duplicate,
    }))
}
