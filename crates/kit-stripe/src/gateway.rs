//! # Stripe PaymentIntents
//!
//! Implementation of `PaymentGateway` over the Stripe PaymentIntents API.
//! The browser confirms the intent with the returned client secret
//! (Stripe Elements); the server only creates, inspects, cancels and
//! refunds intents and learns the outcome from webhooks.

use crate::config::StripeConfig;
use crate::webhook::{parse_event, verify_signature};
use async_trait::async_trait;
use chrono::Utc;
use kit_core::{
    CreatePaymentIntent, Currency, MarketError, MarketResult, PaymentEvent, PaymentGateway,
    PaymentIntent, PaymentIntentStatus, Refund,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe PaymentIntent gateway
pub struct StripePaymentGateway {
    config: StripeConfig,
    client: Client,
}

impl StripePaymentGateway {
    /// Create a new gateway
    pub fn new(config: StripeConfig) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MarketError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> MarketResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
    }

    /// Form parameters for `POST /v1/payment_intents`
    fn intent_form(&self, request: &CreatePaymentIntent) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), request.amount.amount.to_string()),
            (
                "currency".to_string(),
                request.amount.currency.as_str().to_string(),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        if let Some(ref email) = request.receipt_email {
            form.push(("receipt_email".to_string(), email.clone()));
        }
        if let Some(ref description) = request.description {
            form.push(("description".to_string(), description.clone()));
        }
        if let Some(ref suffix) = self.config.statement_descriptor_suffix {
            form.push(("statement_descriptor_suffix".to_string(), suffix.clone()));
        }
        for (key, value) in request.metadata() {
            form.push((format!("metadata[{}]", key), value));
        }
        form
    }

    /// Send a request and decode a successful JSON body, mapping Stripe errors
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> MarketResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after_secs: retry_after.unwrap_or(1),
            });
        }

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                let message = match error_response.error.code {
                    Some(code) => format!("{} ({})", error_response.error.message, code),
                    None => error_response.error.message,
                };
                return Err(MarketError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message,
                });
            }

            return Err(MarketError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            MarketError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    #[instrument(skip(self, request), fields(transaction_id = %request.transaction_id))]
    async fn create_payment_intent(
        &self,
        request: &CreatePaymentIntent,
    ) -> MarketResult<PaymentIntent> {
        if !request.amount.is_positive() {
            return Err(MarketError::InvalidRequest(
                "Payment amount must be positive".to_string(),
            ));
        }

        let form = self.intent_form(request);
        debug!(
            "Creating Stripe PaymentIntent: amount={}, orders={}",
            request.amount.display(),
            request.order_ids.len()
        );

        let builder = self
            .authorized(self.client.post(self.url("/v1/payment_intents")))
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form);
        let intent: StripePaymentIntent = self.send(builder).await?;

        info!(
            "Created Stripe PaymentIntent: id={}, status={:?}",
            intent.id, intent.status
        );
        intent.into_payment_intent()
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(&self, intent_id: &str) -> MarketResult<PaymentIntent> {
        let path = format!("/v1/payment_intents/{}", intent_id);
        let builder = self.authorized(self.client.get(self.url(&path)));
        let intent: StripePaymentIntent = self.send(builder).await?;
        intent.into_payment_intent()
    }

    #[instrument(skip(self))]
    async fn update_payment_intent_amount(
        &self,
        intent_id: &str,
        amount: i64,
    ) -> MarketResult<PaymentIntent> {
        if amount <= 0 {
            return Err(MarketError::InvalidRequest(
                "Payment amount must be positive".to_string(),
            ));
        }
        let path = format!("/v1/payment_intents/{}", intent_id);
        let builder = self
            .authorized(self.client.post(self.url(&path)))
            .form(&[("amount", amount.to_string())]);
        let intent: StripePaymentIntent = self.send(builder).await?;
        info!(
            "Updated Stripe PaymentIntent amount: id={}, amount={}",
            intent.id, intent.amount
        );
        intent.into_payment_intent()
    }

    #[instrument(skip(self))]
    async fn cancel_payment_intent(&self, intent_id: &str) -> MarketResult<PaymentIntent> {
        let path = format!("/v1/payment_intents/{}/cancel", intent_id);
        let builder = self
            .authorized(self.client.post(self.url(&path)))
            .form(&[("cancellation_reason", "requested_by_customer")]);
        let intent: StripePaymentIntent = self.send(builder).await?;
        info!("Canceled Stripe PaymentIntent: id={}", intent.id);
        intent.into_payment_intent()
    }

    #[instrument(skip(self))]
    async fn refund_payment_intent(
        &self,
        intent_id: &str,
        amount: Option<i64>,
    ) -> MarketResult<Refund> {
        let mut form = vec![("payment_intent".to_string(), intent_id.to_string())];
        if let Some(amount) = amount {
            form.push(("amount".to_string(), amount.to_string()));
        }
        let builder = self
            .authorized(self.client.post(self.url("/v1/refunds")))
            .form(&form);
        let refund: StripeRefund = self.send(builder).await?;
        info!(
            "Created Stripe refund: id={}, amount={}, status={}",
            refund.id, refund.amount, refund.status
        );
        Ok(Refund {
            id: refund.id,
            payment_intent_id: refund
                .payment_intent
                .unwrap_or_else(|| intent_id.to_string()),
            amount: refund.amount,
            status: refund.status,
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> MarketResult<PaymentEvent> {
        verify_signature(
            payload,
            signature,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn publishable_key(&self) -> Option<&str> {
        Some(&self.config.publishable_key)
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    amount: i64,
    currency: String,
    status: PaymentIntentStatus,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl StripePaymentIntent {
    fn into_payment_intent(self) -> MarketResult<PaymentIntent> {
        let client_secret = self.client_secret.ok_or_else(|| {
            MarketError::Serialization(format!("PaymentIntent {} has no client_secret", self.id))
        })?;
        Ok(PaymentIntent {
            currency: Currency::parse(&self.currency)?,
            id: self.id,
            client_secret,
            amount: self.amount,
            status: self.status,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    amount: i64,
    #[serde(default)]
    payment_intent: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}
