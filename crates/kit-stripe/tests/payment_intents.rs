//! PaymentIntent gateway tests against a mocked Stripe API.

use kit_core::{
    CreatePaymentIntent, Currency, MarketError, Money, PaymentGateway, PaymentIntentStatus,
    PaymentTransaction,
};
use kit_stripe::{sign_payload, StripeConfig, StripePaymentGateway};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBHOOK_SECRET: &str = "whsec_test_secret";

fn gateway(server: &MockServer) -> StripePaymentGateway {
    let config = StripeConfig::new("sk_test_123", "pk_test_123", WEBHOOK_SECRET)
        .with_api_base_url(server.uri());
    StripePaymentGateway::new(config).unwrap()
}

fn transaction() -> PaymentTransaction {
    PaymentTransaction::new(
        Uuid::new_v4(),
        "stripe",
        Money::from_cents(4500, Currency::USD),
    )
}

#[tokio::test]
async fn creates_payment_intent_with_idempotency_key() {
    let server = MockServer::start().await;
    let tx = transaction();
    let request = CreatePaymentIntent::new(&tx, vec![Uuid::new_v4()]);

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("Authorization", "Bearer sk_test_123"))
        .and(header("Idempotency-Key", request.idempotency_key.as_str()))
        .and(body_string_contains("amount=4500"))
        .and(body_string_contains("currency=usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_123",
            "object": "payment_intent",
            "client_secret": "pi_123_secret_abc",
            "amount": 4500,
            "currency": "usd",
            "status": "requires_payment_method",
            "metadata": { "transaction_id": tx.id.to_string() }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = gateway(&server).create_payment_intent(&request).await.unwrap();

    assert_eq!(intent.id, "pi_123");
    assert_eq!(intent.client_secret, "pi_123_secret_abc");
    assert_eq!(intent.amount, 4500);
    assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
    assert_eq!(intent.metadata["transaction_id"], tx.id.to_string());
}

#[tokio::test]
async fn maps_stripe_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "message": "Amount must be at least $0.50 usd",
                "code": "amount_too_small"
            }
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .create_payment_intent(&CreatePaymentIntent::new(&transaction(), vec![]))
        .await
        .unwrap_err();

    match err {
        MarketError::ProviderError { provider, message } => {
            assert_eq!(provider, "stripe");
            assert!(message.contains("amount_too_small"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn maps_rate_limits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .retrieve_payment_intent("pi_busy")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MarketError::RateLimited {
            retry_after_secs: 7,
            ..
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn cancels_and_refunds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_1/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_1",
            "client_secret": "pi_1_secret",
            "amount": 4500,
            "currency": "usd",
            "status": "canceled"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .and(body_string_contains("payment_intent=pi_2"))
        .and(body_string_contains("amount=1500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "re_1",
            "amount": 1500,
            "payment_intent": "pi_2",
            "status": "succeeded"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let canceled = gateway.cancel_payment_intent("pi_1").await.unwrap();
    assert_eq!(canceled.status, PaymentIntentStatus::Canceled);

    let refund = gateway.refund_payment_intent("pi_2", Some(1500)).await.unwrap();
    assert_eq!(refund.id, "re_1");
    assert_eq!(refund.payment_intent_id, "pi_2");
    assert_eq!(refund.amount, 1500);
}

#[tokio::test]
async fn verifies_signed_webhooks() {
    let server = MockServer::start().await;
    let gateway = gateway(&server);

    let payload = serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "created": chrono::Utc::now().timestamp(),
        "data": { "object": { "id": "pi_9", "amount": 4500, "amount_received": 4500 } }
    }))
    .unwrap();
    let signature = sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &payload);

    let event = gateway.verify_webhook(&payload, &signature).await.unwrap();
    assert_eq!(event.event_id, "evt_1");
    assert_eq!(event.payment_intent_id.as_deref(), Some("pi_9"));

    let forged = sign_payload("whsec_wrong", chrono::Utc::now().timestamp(), &payload);
    assert!(matches!(
        gateway.verify_webhook(&payload, &forged).await,
        Err(MarketError::WebhookVerificationFailed(_))
    ));
}

#[tokio::test]
async fn updates_intent_amount() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_3"))
        .and(body_string_contains("amount=2900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_3",
            "client_secret": "pi_3_secret",
            "amount": 2900,
            "currency": "usd",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let intent = gateway.update_payment_intent_amount("pi_3", 2900).await.unwrap();
    assert_eq!(intent.amount, 2900);

    assert!(matches!(
        gateway.update_payment_intent_amount("pi_3", 0).await,
        Err(MarketError::InvalidRequest(_))
    ));
}
