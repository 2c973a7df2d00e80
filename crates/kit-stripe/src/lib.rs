//! # kit-stripe
//!
//! Stripe payment gateway for the labkit marketplace.
//!
//! **StripePaymentGateway** drives the PaymentIntents API:
//! - one intent per checkout, with transaction and order ids in metadata
//! - idempotent creation keyed on the transaction id
//! - cancel and refund for order cancellation and admin refunds
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kit_stripe::StripePaymentGateway;
//! use kit_core::{CreatePaymentIntent, PaymentGateway};
//!
//! // Create gateway from environment
//! let gateway = StripePaymentGateway::from_env()?;
//!
//! // Create the intent for a checkout transaction
//! let intent = gateway
//!     .create_payment_intent(&CreatePaymentIntent::new(&transaction, order_ids))
//!     .await?;
//!
//! // Hand intent.client_secret to Stripe Elements in the browser
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use kit_stripe::{dispatch_webhook_event, WebhookHandler};
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl WebhookHandler for MyHandler {
//!     async fn on_payment_succeeded(&self, event: &PaymentEvent) -> MarketResult<()> {
//!         // Mark the orders paid
//!         Ok(())
//!     }
//! }
//!
//! // In your webhook endpoint:
//! let event = gateway.verify_webhook(payload, signature).await?;
//! dispatch_webhook_event(&MyHandler, &event).await?;
//! ```

pub mod config;
pub mod gateway;
pub mod webhook;

// Re-exports
pub use config::StripeConfig;
pub use gateway::StripePaymentGateway;
pub use webhook::{
    dispatch_webhook_event, event_kind, parse_event, print_webhook_setup_instructions,
    sign_payload, verify_signature, LoggingWebhookHandler, WebhookHandler,
    REQUIRED_WEBHOOK_EVENTS,
};
