//! # Stripe Webhook Handling
//!
//! Signature verification, event parsing, and dispatch for Stripe webhooks.
//! Webhooks notify the marketplace of PaymentIntent progress and refunds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kit_core::{MarketError, MarketResult, PaymentEvent, PaymentEventKind};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Events that should be enabled in the Stripe Dashboard
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "payment_intent.succeeded",
    "payment_intent.processing",
    "payment_intent.requires_action",
    "payment_intent.payment_failed",
    "payment_intent.canceled",
    "charge.refunded",
];

// =============================================================================
// Signature Verification
// =============================================================================

pub(crate) struct SignatureHeader {
    pub(crate) timestamp: i64,
    pub(crate) signatures: Vec<String>,
}

/// Parse `t=...,v1=...,v1=...`; unknown schemes (e.g. `v0`) are ignored
pub(crate) fn parse_signature_header(header: &str) -> MarketResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        MarketError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(MarketError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

pub(crate) fn compute_hmac_sha256(secret: &str, message: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    // HMAC accepts keys of any length, so this never fails
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut message = format!("{timestamp}.").into_bytes();
    message.extend_from_slice(payload);
    message
}

/// Verify a `Stripe-Signature` header against the raw request body
///
/// `now` is injected so tolerance checks are testable.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> MarketResult<()> {
    let sig = parse_signature_header(header)?;

    let outside = now
        .checked_sub(sig.timestamp)
        .map_or(true, |age| age.unsigned_abs() > tolerance_secs.unsigned_abs());
    if outside {
        return Err(MarketError::WebhookVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_hmac_sha256(secret, &signed_payload(sig.timestamp, payload));
    let valid = sig
        .signatures
        .iter()
        .any(|candidate| constant_time_compare(candidate, &expected));

    if !valid {
        return Err(MarketError::WebhookVerificationFailed(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

/// Build a `Stripe-Signature` header value for a payload
///
/// Used by tests and local tooling to produce webhooks the server accepts.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let sig = compute_hmac_sha256(secret, &signed_payload(timestamp, payload));
    format!("t={timestamp},v1={sig}")
}

// =============================================================================
// Event Parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

/// Map a Stripe event type to the kinds the marketplace reacts to
pub fn event_kind(event_type: &str) -> PaymentEventKind {
    match event_type {
        "payment_intent.succeeded" => PaymentEventKind::Succeeded,
        "payment_intent.processing" => PaymentEventKind::Processing,
        "payment_intent.requires_action" => PaymentEventKind::RequiresAction,
        "payment_intent.payment_failed" => PaymentEventKind::Failed,
        "payment_intent.canceled" => PaymentEventKind::Canceled,
        "charge.refunded" => PaymentEventKind::Refunded,
        other => PaymentEventKind::Unknown(other.to_string()),
    }
}

/// Parse a verified webhook body into a `PaymentEvent`
pub fn parse_event(payload: &[u8]) -> MarketResult<PaymentEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        MarketError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    let kind = event_kind(&event.event_type);
    let object = event.data.object;
    let str_field = |key: &str| object.get(key).and_then(|v| v.as_str()).map(String::from);

    // PaymentIntent events carry the intent itself; charge events point at it
    let payment_intent_id = match kind {
        PaymentEventKind::Refunded => str_field("payment_intent"),
        PaymentEventKind::Unknown(_) => {
            str_field("payment_intent").or_else(|| intent_id_from_object(&object))
        }
        _ => str_field("id"),
    };

    let amount = match kind {
        PaymentEventKind::Refunded => object.get("amount_refunded").and_then(|v| v.as_i64()),
        PaymentEventKind::Succeeded => object
            .get("amount_received")
            .or_else(|| object.get("amount"))
            .and_then(|v| v.as_i64()),
        _ => object.get("amount").and_then(|v| v.as_i64()),
    };

    let failure_reason = object
        .get("last_payment_error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .map(String::from)
        .or_else(|| {
            object
                .get("cancellation_reason")
                .and_then(|v| v.as_str())
                .map(String::from)
        });

    let metadata: HashMap<String, String> = object
        .get("metadata")
        .and_then(|m| m.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    debug!(event_type = %event.event_type, event_id = %event.id, "Parsed Stripe webhook");

    Ok(PaymentEvent {
        event_id: event.id,
        event_type: event.event_type,
        kind,
        provider: "stripe".to_string(),
        payment_intent_id,
        amount,
        failure_reason,
        metadata,
        raw_data: Some(serde_json::Value::Object(object)),
        created_at: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}

fn intent_id_from_object(object: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    object
        .get("object")
        .and_then(|v| v.as_str())
        .filter(|kind| *kind == "payment_intent")
        .and_then(|_| object.get("id"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

// =============================================================================
// Dispatch
// =============================================================================

/// Webhook event handler trait
///
/// Implement this trait to react to payment events. Every method defaults
/// to logging, so implementors only override what they care about.
#[allow(unused_variables)]
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Called when a PaymentIntent succeeds
    async fn on_payment_succeeded(&self, event: &PaymentEvent) -> MarketResult<()> {
        info!(payment_intent = ?event.payment_intent_id, "Payment succeeded");
        Ok(())
    }

    /// Called when a PaymentIntent starts processing
    async fn on_payment_processing(&self, event: &PaymentEvent) -> MarketResult<()> {
        info!(payment_intent = ?event.payment_intent_id, "Payment processing");
        Ok(())
    }

    /// Called when the customer must complete an extra step (3DS, etc.)
    async fn on_payment_requires_action(&self, event: &PaymentEvent) -> MarketResult<()> {
        info!(payment_intent = ?event.payment_intent_id, "Payment requires action");
        Ok(())
    }

    /// Called when a payment attempt fails
    async fn on_payment_failed(&self, event: &PaymentEvent) -> MarketResult<()> {
        warn!(
            payment_intent = ?event.payment_intent_id,
            reason = ?event.failure_reason,
            "Payment failed"
        );
        Ok(())
    }

    /// Called when a PaymentIntent is canceled
    async fn on_payment_canceled(&self, event: &PaymentEvent) -> MarketResult<()> {
        info!(payment_intent = ?event.payment_intent_id, "Payment canceled");
        Ok(())
    }

    /// Called when a charge is refunded
    async fn on_refund(&self, event: &PaymentEvent) -> MarketResult<()> {
        info!(payment_intent = ?event.payment_intent_id, amount = ?event.amount, "Refund issued");
        Ok(())
    }

    /// Called for unknown/unhandled events
    async fn on_unknown_event(&self, event: &PaymentEvent) -> MarketResult<()> {
        debug!(event_type = %event.event_type, "Unhandled webhook event");
        Ok(())
    }
}

/// Default no-op webhook handler (just logs events)
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

/// Dispatch a webhook event to the appropriate handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: &PaymentEvent,
) -> MarketResult<()> {
    match &event.kind {
        PaymentEventKind::Succeeded => handler.on_payment_succeeded(event).await,
        PaymentEventKind::Processing => handler.on_payment_processing(event).await,
        PaymentEventKind::RequiresAction => handler.on_payment_requires_action(event).await,
        PaymentEventKind::Failed => handler.on_payment_failed(event).await,
        PaymentEventKind::Canceled => handler.on_payment_canceled(event).await,
        PaymentEventKind::Refunded => handler.on_refund(event).await,
        PaymentEventKind::Unknown(_) => handler.on_unknown_event(event).await,
    }
}

/// Print instructions for setting up webhooks
pub fn print_webhook_setup_instructions(endpoint_url: &str) {
    println!("=== Stripe Webhook Setup ===\n");
    println!("1. Go to: https://dashboard.stripe.com/webhooks\n");
    println!("2. Click 'Add endpoint'\n");
    println!("3. Enter endpoint URL: {}\n", endpoint_url);
    println!("4. Select these events:");
    for event in REQUIRED_WEBHOOK_EVENTS {
        println!("   - {}", event);
    }
    println!("\n5. Copy the signing secret (whsec_...) to your .env file");
    println!("\n6. For local testing, use Stripe CLI:");
    println!("   stripe listen --forward-to {}", endpoint_url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &str = "whsec_test";

    fn intent_event(event_type: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_123",
            "type": event_type,
            "created": 1_700_000_000,
            "data": {
                "object": {
                    "id": "pi_456",
                    "object": "payment_intent",
                    "amount": 4500,
                    "amount_received": 4500,
                    "currency": "usd",
                    "status": "succeeded",
                    "last_payment_error": { "message": "Your card was declined." },
                    "metadata": { "transaction_id": "tx-1", "order_ids": "a,b" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1234567890,v1=abc123,v0=zzz,v1=def456").unwrap();
        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=123").is_err());
    }

    #[test]
    fn test_hmac_sha256() {
        let sig = compute_hmac_sha256(SECRET, b"1234567890.{}");
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_sign_then_verify() {
        let payload = intent_event("payment_intent.succeeded");
        let header = sign_payload(SECRET, 1_700_000_000, &payload);

        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_100).is_ok());
        assert!(verify_signature(&payload, &header, "whsec_other", 300, 1_700_000_100).is_err());
        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_400).is_err());

        let extreme = "t=-9223372036854775808,v1=aa";
        assert!(matches!(
            verify_signature(&payload, extreme, SECRET, 300, 1_700_000_000),
            Err(MarketError::WebhookVerificationFailed(_))
        ));

        let mut tampered = payload.clone();
        tampered.push(b' ');
        assert!(verify_signature(&tampered, &header, SECRET, 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_parse_intent_events() {
        let event = parse_event(&intent_event("payment_intent.succeeded")).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Succeeded);
        assert_eq!(event.payment_intent_id.as_deref(), Some("pi_456"));
        assert_eq!(event.amount, Some(4500));
        assert_eq!(event.metadata["transaction_id"], "tx-1");

        let failed = parse_event(&intent_event("payment_intent.payment_failed")).unwrap();
        assert_eq!(failed.kind, PaymentEventKind::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("Your card was declined."));
    }

    #[test]
    fn test_parse_charge_refunded() {
        let payload = serde_json::to_vec(&json!({
            "id": "evt_9",
            "type": "charge.refunded",
            "created": 1_700_000_000,
            "data": { "object": {
                "id": "ch_1",
                "object": "charge",
                "payment_intent": "pi_456",
                "amount_refunded": 1200
            }}
        }))
        .unwrap();
        let event = parse_event(&payload).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Refunded);
        assert_eq!(event.payment_intent_id.as_deref(), Some("pi_456"));
        assert_eq!(event.amount, Some(1200));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(MarketError::WebhookParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_webhook() {
        struct TestHandler {
            called: AtomicBool,
        }

        #[async_trait]
        impl WebhookHandler for TestHandler {
            async fn on_payment_failed(&self, _event: &PaymentEvent) -> MarketResult<()> {
                self.called.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let handler = TestHandler {
            called: AtomicBool::new(false),
        };

        let event = parse_event(&intent_event("payment_intent.payment_failed")).unwrap();
        dispatch_webhook_event(&handler, &event).await.unwrap();
        assert!(handler.called.load(Ordering::SeqCst));

        let other = parse_event(&intent_event("customer.created")).unwrap();
        dispatch_webhook_event(&LoggingWebhookHandler, &other).await.unwrap();
    }
}
