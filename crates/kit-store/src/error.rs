//! Error types for marketplace storage.

use kit_core::MarketError;
use uuid::Uuid;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// The missing key.
        id: String,
    },

    /// Unique key taken, or record still referenced.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Reserving stock would drive it negative.
    #[error("out of stock: {partner_product_id} (requested {requested}, available {available})")]
    OutOfStock {
        /// The listing that ran short.
        partner_product_id: Uuid,
        /// Units the checkout asked for.
        requested: u32,
        /// Units left.
        available: u32,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity: "row",
                id: String::new(),
            },
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => MarketError::not_found(entity, id),
            StoreError::Conflict(msg) => MarketError::Conflict(msg),
            StoreError::OutOfStock {
                partner_product_id,
                requested,
                available,
            } => MarketError::OutOfStock {
                partner_product_id: partner_product_id.to_string(),
                requested,
                available,
            },
            StoreError::Serialization(msg) => MarketError::Serialization(msg),
            StoreError::Database(msg) => MarketError::Storage(msg),
        }
    }
}
