//! # Marketplace Error Types
//!
//! Typed error handling for the labkit marketplace.
//! Domain and payment operations return `Result<T, MarketError>`.

use thiserror::Error;

/// Core error type for marketplace operations
#[derive(Debug, Error)]
pub enum MarketError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A single field failed validation
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Caller may not act on this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists or is still referenced
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Illegal order status change
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Not enough stock to satisfy a cart line
    #[error("Out of stock: {partner_product_id} (requested {requested}, available {available})")]
    OutOfStock {
        partner_product_id: String,
        requested: u32,
        available: u32,
    },

    /// Listing, catalog entry, or partner is inactive
    #[error("Product is not available: {partner_product_id}")]
    Unavailable { partner_product_id: String },

    /// Amounts in different currencies were combined
    #[error("Currency mismatch: {expected} vs {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Shorthand for a `NotFound` error
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Shorthand for a field validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MarketError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::NetworkError(_)
                | MarketError::RateLimited { .. }
                | MarketError::ProviderError { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            MarketError::Configuration(_) => 500,
            MarketError::InvalidRequest(_) => 400,
            MarketError::Validation { .. } => 422,
            MarketError::NotFound { .. } => 404,
            MarketError::Forbidden(_) => 403,
            MarketError::Conflict(_) => 409,
            MarketError::InvalidTransition { .. } => 409,
            MarketError::OutOfStock { .. } => 409,
            MarketError::Unavailable { .. } => 409,
            MarketError::CurrencyMismatch { .. } => 400,
            MarketError::ProviderError { .. } => 502,
            MarketError::NetworkError(_) => 503,
            MarketError::WebhookVerificationFailed(_) => 401,
            MarketError::WebhookParseError(_) => 400,
            MarketError::RateLimited { .. } => 429,
            MarketError::Storage(_) => 500,
            MarketError::Serialization(_) => 500,
            MarketError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::Configuration(_) => "configuration_error",
            MarketError::InvalidRequest(_) => "bad_request",
            MarketError::Validation { .. } => "validation_error",
            MarketError::NotFound { .. } => "not_found",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::Conflict(_) => "conflict",
            MarketError::InvalidTransition { .. } => "invalid_transition",
            MarketError::OutOfStock { .. } => "out_of_stock",
            MarketError::Unavailable { .. } => "unavailable",
            MarketError::CurrencyMismatch { .. } => "currency_mismatch",
            MarketError::ProviderError { .. } => "provider_error",
            MarketError::NetworkError(_) => "network_error",
            MarketError::WebhookVerificationFailed(_) => "webhook_verification_failed",
            MarketError::WebhookParseError(_) => "webhook_parse_error",
            MarketError::RateLimited { .. } => "rate_limited",
            MarketError::Storage(_) => "storage_error",
            MarketError::Serialization(_) => "serialization_error",
            MarketError::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(MarketError::NetworkError("timeout".into()).is_retryable());
        assert!(MarketError::RateLimited {
            provider: "stripe".into(),
            retry_after_secs: 60
        }
        .is_retryable());
        assert!(!MarketError::InvalidRequest("bad data".into()).is_retryable());
        assert!(!MarketError::not_found("order", "o-1").is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(MarketError::InvalidRequest("test".into()).status_code(), 400);
        assert_eq!(MarketError::not_found("partner", "p").status_code(), 404);
        assert_eq!(
            MarketError::OutOfStock {
                partner_product_id: "pp".into(),
                requested: 3,
                available: 1
            }
            .status_code(),
            409
        );
        assert_eq!(
            MarketError::WebhookVerificationFailed("sig".into()).status_code(),
            401
        );
    }

    #[test]
    fn test_messages() {
        let err = MarketError::InvalidTransition {
            from: "shipped".into(),
            to: "paid".into(),
        };
        assert_eq!(err.to_string(), "Cannot move order from shipped to paid");
        assert_eq!(err.code(), "invalid_transition");
    }
}
