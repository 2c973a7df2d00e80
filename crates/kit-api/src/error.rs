//! API error type and JSON error bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kit_core::{CartError, MarketError};
use kit_store::StoreError;
use serde::Serialize;
use serde_json::json;

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but the role does not allow this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Domain, payment, or storage failure.
    #[error(transparent)]
    Market(#[from] MarketError),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn details(err: &MarketError) -> Option<serde_json::Value> {
    match err {
        MarketError::Validation { field, .. } => Some(json!({ "field": field })),
        MarketError::OutOfStock {
            partner_product_id,
            requested,
            available,
        } => Some(json!({
            "partner_product_id": partner_product_id,
            "requested": requested,
            "available": available,
        })),
        MarketError::Unavailable { partner_product_id } => {
            Some(json!({ "partner_product_id": partner_product_id }))
        }
        MarketError::InvalidTransition { from, to } => Some(json!({ "from": from, "to": to })),
        MarketError::RateLimited {
            retry_after_secs, ..
        } => Some(json!({ "retry_after_secs": retry_after_secs })),
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing or invalid credentials".to_string(),
                None,
            ),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone(), None),
            Self::Market(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let message = if status.is_server_error() && !err.is_retryable() {
                    tracing::error!(error = %err, "Internal server error");
                    "An internal error occurred".to_string()
                } else {
                    if status.is_server_error() {
                        tracing::warn!(error = %err, "Upstream failure");
                    }
                    err.to_string()
                };
                (status, err.code(), message, details(err))
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Market(err.into())
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        Self::Market(err.into())
    }
}
