//! # Payment Types and Gateway Trait
//!
//! A checkout produces one `PaymentTransaction` paying for every partner
//! order in that checkout. The transaction is settled through a provider
//! PaymentIntent; the provider reports progress through webhook events.
//!
//! ## Design Pattern
//!
//! Providers implement `PaymentGateway`, so the checkout and webhook flows
//! never depend on a concrete SDK.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PaymentGateway (trait)                    │
//! │  ├── create_payment_intent()                                │
//! │  ├── retrieve_payment_intent() / cancel_payment_intent()    │
//! │  ├── refund_payment_intent()                                │
//! │  └── verify_webhook()                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                  ┌─────────┴─────────┐
//!                  │StripePaymentGateway│
//!                  └───────────────────┘
//! ```

use crate::error::MarketResult;
use crate::money::{Currency, Money};
use crate::order::PaymentStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Our record of one payment attempt covering one or more orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Provider name (e.g. "stripe")
    pub provider: String,
    /// Set once the provider intent exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub amount: Money,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn new(customer_id: Uuid, provider: impl Into<String>, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            provider: provider.into(),
            payment_intent_id: None,
            amount,
            status: PaymentStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: PaymentStatus, failure_reason: Option<String>) {
        self.status = status;
        self.failure_reason = failure_reason;
        self.updated_at = Utc::now();
    }
}

/// Status of a provider PaymentIntent (Stripe's vocabulary)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    /// Collapse into our payment status
    ///
    /// A failed attempt returns the intent to `requires_payment_method`, so
    /// that state maps to `Pending` here and failures are only recorded from
    /// `payment_intent.payment_failed` events.
    pub fn as_payment_status(&self) -> PaymentStatus {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod
            | PaymentIntentStatus::RequiresConfirmation
            | PaymentIntentStatus::Unknown => PaymentStatus::Pending,
            PaymentIntentStatus::RequiresAction => PaymentStatus::RequiresAction,
            PaymentIntentStatus::Processing | PaymentIntentStatus::RequiresCapture => {
                PaymentStatus::Processing
            }
            PaymentIntentStatus::Canceled => PaymentStatus::Cancelled,
            PaymentIntentStatus::Succeeded => PaymentStatus::Succeeded,
        }
    }

    /// The intent can still be confirmed by the client
    pub fn is_confirmable(&self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::RequiresPaymentMethod
                | PaymentIntentStatus::RequiresConfirmation
                | PaymentIntentStatus::RequiresAction
        )
    }
}

/// A provider PaymentIntent as seen by the marketplace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Handed to the browser to confirm the payment
    pub client_secret: String,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentIntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Parameters for creating a PaymentIntent
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    pub amount: Money,
    pub transaction_id: Uuid,
    pub customer_id: Uuid,
    pub order_ids: Vec<Uuid>,
    pub receipt_email: Option<String>,
    pub description: Option<String>,
    /// Prevents duplicate intents on retried requests
    pub idempotency_key: String,
}

impl CreatePaymentIntent {
    pub fn new(transaction: &PaymentTransaction, order_ids: Vec<Uuid>) -> Self {
        Self {
            amount: transaction.amount,
            transaction_id: transaction.id,
            customer_id: transaction.customer_id,
            order_ids,
            receipt_email: None,
            description: None,
            idempotency_key: format!("checkout-{}", transaction.id),
        }
    }

    pub fn with_receipt_email(mut self, email: impl Into<String>) -> Self {
        self.receipt_email = Some(email.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Metadata attached to the provider object so webhooks can be traced back
    pub fn metadata(&self) -> Vec<(String, String)> {
        let order_ids = self
            .order_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        vec![
            ("transaction_id".to_string(), self.transaction_id.to_string()),
            ("customer_id".to_string(), self.customer_id.to_string()),
            ("order_ids".to_string(), order_ids),
        ]
    }
}

/// Result of a refund request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub status: String,
}

/// Payment event kinds the marketplace reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Succeeded,
    Processing,
    RequiresAction,
    Failed,
    Canceled,
    Refunded,
    /// Unknown event (passthrough)
    Unknown(String),
}

/// A verified, parsed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Event ID from provider, used for idempotency
    pub event_id: String,
    /// Provider event type string (e.g. "payment_intent.succeeded")
    pub event_type: String,
    pub kind: PaymentEventKind,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Amount in smallest unit (received or refunded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Raw event object (for debugging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PaymentEvent {
    /// Our transaction id, if the intent carried it in metadata
    pub fn transaction_id(&self) -> Option<Uuid> {
        self.metadata
            .get("transaction_id")
            .and_then(|v| Uuid::parse_str(v).ok())
    }
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a PaymentIntent for the given amount.
    async fn create_payment_intent(
        &self,
        request: &CreatePaymentIntent,
    ) -> MarketResult<PaymentIntent>;

    /// Fetch the current state of a PaymentIntent.
    async fn retrieve_payment_intent(&self, intent_id: &str) -> MarketResult<PaymentIntent>;

    /// Change the amount of an unconfirmed PaymentIntent.
    async fn update_payment_intent_amount(
        &self,
        intent_id: &str,
        amount: i64,
    ) -> MarketResult<PaymentIntent>;

    /// Cancel a PaymentIntent that has not succeeded.
    async fn cancel_payment_intent(&self, intent_id: &str) -> MarketResult<PaymentIntent>;

    /// Refund all or part of a succeeded PaymentIntent.
    ///
    /// `amount = None` refunds the remaining balance.
    async fn refund_payment_intent(
        &self,
        intent_id: &str,
        amount: Option<i64>,
    ) -> MarketResult<Refund>;

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes
    /// * `signature` - Signature header from the request
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> MarketResult<PaymentEvent>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;

    /// Publishable key handed to browsers, if the provider has one
    fn publishable_key(&self) -> Option<&str> {
        None
    }
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_status_mapping() {
        assert_eq!(
            PaymentIntentStatus::Succeeded.as_payment_status(),
            PaymentStatus::Succeeded
        );
        assert_eq!(
            PaymentIntentStatus::RequiresPaymentMethod.as_payment_status(),
            PaymentStatus::Pending
        );
        assert_eq!(
            PaymentIntentStatus::RequiresCapture.as_payment_status(),
            PaymentStatus::Processing
        );
        assert!(PaymentIntentStatus::RequiresAction.is_confirmable());
        assert!(!PaymentIntentStatus::Canceled.is_confirmable());
    }

    #[test]
    fn test_unknown_intent_status_deserializes() {
        let status: PaymentIntentStatus = serde_json::from_str(r#""something_new""#).unwrap();
        assert_eq!(status, PaymentIntentStatus::Unknown);
    }

    #[test]
    fn test_create_request_metadata() {
        let tx = PaymentTransaction::new(
            Uuid::new_v4(),
            "stripe",
            Money::from_cents(4500, Currency::USD),
        );
        let orders = vec![Uuid::new_v4(), Uuid::new_v4()];
        let request = CreatePaymentIntent::new(&tx, orders.clone());

        assert_eq!(request.idempotency_key, format!("checkout-{}", tx.id));
        let metadata: HashMap<_, _> = request.metadata().into_iter().collect();
        assert_eq!(metadata["transaction_id"], tx.id.to_string());
        assert_eq!(
            metadata["order_ids"],
            format!("{},{}", orders[0], orders[1])
        );
    }

    #[test]
    fn test_event_transaction_id() {
        let tx_id = Uuid::new_v4();
        let event = PaymentEvent {
            event_id: "evt_1".into(),
            event_type: "payment_intent.succeeded".into(),
            kind: PaymentEventKind::Succeeded,
            provider: "stripe".into(),
            payment_intent_id: Some("pi_1".into()),
            amount: Some(100),
            failure_reason: None,
            metadata: HashMap::from([("transaction_id".to_string(), tx_id.to_string())]),
            raw_data: None,
            created_at: Utc::now(),
        };
        assert_eq!(event.transaction_id(), Some(tx_id));
    }
}
