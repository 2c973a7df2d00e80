//! Shared harness for HTTP integration tests.

#![allow(dead_code)] // Each test file uses a different subset

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestResponse, TestServer};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use kit_api::{create_router, AppConfig, AppState, Claims};
use kit_core::{
    AdminProduct, CreatePaymentIntent, Currency, MarketError, MarketResult, Money, NewAdminProduct,
    NewPartner, NewPartnerProduct, Partner, PartnerProduct, PaymentEvent, PaymentGateway,
    PaymentIntent, PaymentIntentStatus, Profile, Refund, Role, ShippingPolicy, TestCategory,
};
use kit_store::{MemoryStore, SharedStore, Store};

pub const WEBHOOK_SECRET: &str = "whsec_harness";

/// Calls the services made against the payment provider
#[derive(Debug, Default)]
pub struct GatewayLog {
    pub created: Vec<CreatePaymentIntent>,
    pub amount_updates: Vec<(String, i64)>,
    pub cancelled: Vec<String>,
    pub refunds: Vec<(String, Option<i64>)>,
}

/// In-process stand-in for Stripe; webhooks are verified with the real signature scheme
#[derive(Default)]
pub struct MockGateway {
    pub log: Mutex<GatewayLog>,
    intents: Mutex<HashMap<String, PaymentIntent>>,
    pub fail_create: Mutex<bool>,
}

impl MockGateway {
    pub fn set_intent_status(&self, intent_id: &str, status: PaymentIntentStatus) {
        if let Some(intent) = self.intents.lock().unwrap().get_mut(intent_id) {
            intent.status = status;
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_intent(
        &self,
        request: &CreatePaymentIntent,
    ) -> MarketResult<PaymentIntent> {
        if *self.fail_create.lock().unwrap() {
            return Err(MarketError::ProviderError {
                provider: "mock".into(),
                message: "card network unavailable".into(),
            });
        }
        let id = format!("pi_{}", request.transaction_id.simple());
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: format!("{id}_secret"),
            amount: request.amount.amount,
            currency: request.amount.currency,
            status: PaymentIntentStatus::RequiresPaymentMethod,
            metadata: request.metadata().into_iter().collect(),
        };
        self.intents.lock().unwrap().insert(id, intent.clone());
        self.log.lock().unwrap().created.push(request.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> MarketResult<PaymentIntent> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| MarketError::not_found("payment intent", intent_id))
    }

    async fn update_payment_intent_amount(
        &self,
        intent_id: &str,
        amount: i64,
    ) -> MarketResult<PaymentIntent> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| MarketError::not_found("payment intent", intent_id))?;
        intent.amount = amount;
        self.log
            .lock()
            .unwrap()
            .amount_updates
            .push((intent_id.to_string(), amount));
        Ok(intent.clone())
    }

    async fn cancel_payment_intent(&self, intent_id: &str) -> MarketResult<PaymentIntent> {
        self.set_intent_status(intent_id, PaymentIntentStatus::Canceled);
        self.log.lock().unwrap().cancelled.push(intent_id.to_string());
        self.retrieve_payment_intent(intent_id).await
    }

    async fn refund_payment_intent(
        &self,
        intent_id: &str,
        amount: Option<i64>,
    ) -> MarketResult<Refund> {
        self.log
            .lock()
            .unwrap()
            .refunds
            .push((intent_id.to_string(), amount));
        Ok(Refund {
            id: format!("re_{}", Uuid::new_v4().simple()),
            payment_intent_id: intent_id.to_string(),
            amount: amount.unwrap_or(0),
            status: "succeeded".into(),
        })
    }

    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> MarketResult<PaymentEvent> {
        let now = chrono::Utc::now().timestamp();
        kit_stripe::verify_signature(payload, signature, WEBHOOK_SECRET, 300, now)?;
        kit_stripe::parse_event(payload)
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }

    fn publishable_key(&self) -> Option<&str> {
        Some("pk_test_harness")
    }
}

/// Seeded catalog: one partner, two products, two listings
pub struct Catalog {
    pub partner: Partner,
    pub thyroid: AdminProduct,
    pub vitamin_d: AdminProduct,
    /// Thyroid test, $49.00, 5 in stock
    pub thyroid_listing: PartnerProduct,
    /// Vitamin D test, $29.00, untracked stock
    pub vitamin_listing: PartnerProduct,
}

pub struct TestHarness {
    pub server: TestServer,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    pub config: AppConfig,
    pub catalog: Catalog,
    pub admin_id: Uuid,
    pub partner_user_id: Uuid,
    pub customer_id: Uuid,
}

fn admin_product(name: &str, category: TestCategory) -> AdminProduct {
    NewAdminProduct {
        name: name.into(),
        slug: None,
        description: format!("{name} kit"),
        category,
        sample_type: "finger-prick blood".into(),
        biomarkers: vec!["TSH".into(), "25-OH vitamin D".into()],
        turnaround_days: 3,
        image_url: None,
        active: true,
    }
    .into_product()
    .unwrap()
}

fn partner_listing(partner: &Partner, product: &AdminProduct, cents: i64, stock: Option<u32>) -> PartnerProduct {
    NewPartnerProduct {
        admin_product_id: product.id,
        price: Money::from_cents(cents, Currency::USD),
        stock,
        sku: None,
        active: true,
    }
    .into_listing(partner.id)
    .unwrap()
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_shipping(ShippingPolicy::free()).await
    }

    pub async fn with_shipping(shipping: ShippingPolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::default());

        let partner = NewPartner {
            name: "Northwind Diagnostics".into(),
            slug: None,
            contact_email: "lab@northwind.test".into(),
            description: String::new(),
            logo_url: None,
            active: true,
        }
        .into_partner()
        .unwrap();
        let thyroid = admin_product("Thyroid Panel", TestCategory::Hormones);
        let vitamin_d = admin_product("Vitamin D Test", TestCategory::Nutrition);
        let thyroid_listing = partner_listing(&partner, &thyroid, 4900, Some(5));
        let vitamin_listing = partner_listing(&partner, &vitamin_d, 2900, None);

        store.insert_partner(&partner).await.unwrap();
        store.insert_admin_product(&thyroid).await.unwrap();
        store.insert_admin_product(&vitamin_d).await.unwrap();
        store.insert_partner_product(&thyroid_listing).await.unwrap();
        store.insert_partner_product(&vitamin_listing).await.unwrap();

        let admin_id = Uuid::new_v4();
        let mut admin = Profile::new_client(admin_id, "admin@labkit.test");
        admin.role = Role::Admin;
        store.upsert_profile(&admin).await.unwrap();

        let partner_user_id = Uuid::new_v4();
        let mut partner_user = Profile::new_client(partner_user_id, "ops@northwind.test");
        partner_user.role = Role::Partner;
        partner_user.partner_id = Some(partner.id);
        store.upsert_profile(&partner_user).await.unwrap();

        let config = AppConfig {
            shipping,
            ..AppConfig::default()
        };
        let shared: SharedStore = store.clone();
        let state = AppState::new(config.clone(), shared, gateway.clone());
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            store,
            gateway,
            config,
            catalog: Catalog {
                partner,
                thyroid,
                vitamin_d,
                thyroid_listing,
                vitamin_listing,
            },
            admin_id,
            partner_user_id,
            customer_id: Uuid::new_v4(),
        }
    }

    /// Sign an HS256 token for `user_id`, as the auth provider would
    pub fn token_for(&self, user_id: Uuid) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            email: Some(format!("{}@users.test", user_id.simple())),
            aud: Some(json!(self.config.jwt_audience)),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .unwrap()
    }

    pub fn customer_token(&self) -> String {
        self.token_for(self.customer_id)
    }

    pub fn admin_token(&self) -> String {
        self.token_for(self.admin_id)
    }

    pub fn partner_token(&self) -> String {
        self.token_for(self.partner_user_id)
    }

    pub async fn add_to_cart(&self, token: &str, listing: &PartnerProduct, quantity: u32) -> TestResponse {
        self.server
            .post("/api/v1/cart/items")
            .authorization_bearer(token)
            .json(&json!({ "partner_product_id": listing.id, "quantity": quantity }))
            .await
    }

    /// Fill the cart and check out; returns the checkout body
    pub async fn checkout(&self, token: &str, lines: &[(&PartnerProduct, u32)]) -> Value {
        for (listing, quantity) in lines {
            self.add_to_cart(token, listing, *quantity).await.assert_status_ok();
        }
        let response = self
            .server
            .post("/api/v1/checkout")
            .authorization_bearer(token)
            .json(&json!({ "shipping": shipping_json() }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    /// Deliver a signed webhook for an intent
    pub async fn send_intent_event(
        &self,
        event_id: &str,
        event_type: &str,
        object: Value,
    ) -> TestResponse {
        let payload = json!({
            "id": event_id,
            "type": event_type,
            "created": chrono::Utc::now().timestamp(),
            "data": { "object": object },
        })
        .to_string();
        self.send_raw_webhook(&payload, &sign(&payload)).await
    }

    pub async fn send_raw_webhook(&self, payload: &str, signature: &str) -> TestResponse {
        self.server
            .post("/webhook/stripe")
            .add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(signature).unwrap(),
            )
            .text(payload.to_string())
            .await
    }

    /// Mark a checkout paid through a `payment_intent.succeeded` webhook
    pub async fn pay(&self, checkout: &Value) {
        let intent_id = checkout["payment_intent_id"].as_str().unwrap();
        self.gateway
            .set_intent_status(intent_id, PaymentIntentStatus::Succeeded);
        self.send_intent_event(
            &format!("evt_paid_{intent_id}"),
            "payment_intent.succeeded",
            json!({
                "id": intent_id,
                "object": "payment_intent",
                "amount": checkout["amount"]["amount"],
                "amount_received": checkout["amount"]["amount"],
                "metadata": { "transaction_id": checkout["transaction_id"] },
            }),
        )
        .await
        .assert_status_ok();
    }
}

pub fn sign(payload: &str) -> String {
    kit_stripe::sign_payload(
        WEBHOOK_SECRET,
        chrono::Utc::now().timestamp(),
        payload.as_bytes(),
    )
}

pub fn shipping_json() -> Value {
    json!({
        "full_name": "Ada Lovelace",
        "line1": "12 Analytical Way",
        "city": "London",
        "postal_code": "N1 7AA",
        "country": "gb",
    })
}
