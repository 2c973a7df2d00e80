//! # Checkout
//!
//! Turns a cart into one order per partner, all paid through a single
//! PaymentTransaction and one provider PaymentIntent. Stock is reserved when
//! the orders are written and released again if the intent cannot be created.

use super::cart::CartService;
use kit_core::{
    BoxedPaymentGateway, CartError, CreatePaymentIntent, MarketError, MarketResult, Money, Order,
    OrderStatus, PaymentStatus, PaymentTransaction, Profile, ShippingDetails, ShippingPolicy,
};
use kit_store::SharedStore;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Checkout request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    /// Falls back to the profile's default shipping address
    #[serde(default)]
    pub shipping: Option<ShippingDetails>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the browser needs to confirm payment
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub transaction_id: Uuid,
    pub orders: Vec<Order>,
    pub payment_intent_id: String,
    pub client_secret: String,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishable_key: Option<String>,
}

pub struct CheckoutService {
    store: SharedStore,
    gateway: BoxedPaymentGateway,
    shipping: ShippingPolicy,
}

impl CheckoutService {
    pub fn new(store: SharedStore, gateway: BoxedPaymentGateway, shipping: ShippingPolicy) -> Self {
        Self {
            store,
            gateway,
            shipping,
        }
    }

    #[instrument(skip(self, customer, request), fields(customer_id = %customer.user_id))]
    pub async fn checkout(
        &self,
        customer: &Profile,
        request: CheckoutRequest,
    ) -> MarketResult<CheckoutResult> {
        let shipping = request
            .shipping
            .or_else(|| customer.default_shipping.clone())
            .ok_or_else(|| MarketError::validation("shipping", "a shipping address is required"))?;
        shipping.validate()?;
        let shipping = shipping.normalized();
        let notes = request.notes.filter(|n| !n.trim().is_empty());

        let carts = CartService::new(self.store.clone());
        let cart = carts.load(customer.user_id).await?;
        if cart.is_empty() {
            return Err(CartError::Empty.into());
        }
        let validated = carts.validate(&cart).await?;

        let mut transaction = PaymentTransaction::new(
            customer.user_id,
            self.gateway.provider_name(),
            Money::zero(validated.currency),
        );

        let mut orders = Vec::with_capacity(validated.groups.len());
        for group in &validated.groups {
            let items = group.lines.iter().map(|line| line.to_order_item()).collect();
            let fee = self.shipping.fee_for(&group.subtotal);
            let mut order = Order::new(
                customer.user_id,
                group.partner_id,
                transaction.id,
                items,
                shipping.clone(),
                fee,
            )?;
            order.notes = notes.clone();
            transaction.amount = transaction.amount.checked_add(&order.total)?;
            orders.push(order);
        }

        self.store.create_checkout(&transaction, &orders).await?;
        info!(
            transaction_id = %transaction.id,
            orders = orders.len(),
            amount = %transaction.amount.display(),
            "Checkout created"
        );

        let order_ids = orders.iter().map(|o| o.id).collect();
        let numbers = orders
            .iter()
            .map(|o| o.order_number.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut intent_request =
            CreatePaymentIntent::new(&transaction, order_ids).with_description(format!("Labkit order {numbers}"));
        if !customer.email.is_empty() {
            intent_request = intent_request.with_receipt_email(customer.email.clone());
        }

        let intent = match self.gateway.create_payment_intent(&intent_request).await {
            Ok(intent) => intent,
            Err(e) => {
                self.abandon(&mut transaction, &mut orders, &e).await;
                return Err(e);
            }
        };

        self.store
            .attach_payment_intent(transaction.id, &intent.id)
            .await?;
        self.store.clear_cart(customer.user_id).await?;

        Ok(CheckoutResult {
            transaction_id: transaction.id,
            orders,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: transaction.amount,
            publishable_key: self.gateway.publishable_key().map(str::to_string),
        })
    }

    /// Fail the transaction, cancel its orders, and release their stock
    async fn abandon(
        &self,
        transaction: &mut PaymentTransaction,
        orders: &mut [Order],
        cause: &MarketError,
    ) {
        error!(transaction_id = %transaction.id, error = %cause, "PaymentIntent creation failed");

        transaction.set_status(PaymentStatus::Failed, Some(cause.to_string()));
        if let Err(e) = self.store.update_transaction(transaction).await {
            warn!(transaction_id = %transaction.id, error = %e, "Failed to mark transaction failed");
        }
        for order in orders.iter_mut() {
            if order.transition(OrderStatus::Cancelled).is_ok() {
                order.payment_status = PaymentStatus::Failed;
                if let Err(e) = self.store.update_order(order).await {
                    warn!(order_id = %order.id, error = %e, "Failed to cancel order");
                }
            }
        }
        if let Err(e) = self.store.restock(orders).await {
            warn!(transaction_id = %transaction.id, error = %e, "Failed to release stock");
        }
    }

    /// Hand back the client secret of a transaction's intent so payment can be retried
    #[instrument(skip(self, customer), fields(customer_id = %customer.user_id))]
    pub async fn retry_payment(
        &self,
        customer: &Profile,
        transaction_id: Uuid,
    ) -> MarketResult<CheckoutResult> {
        let mut transaction = self
            .store
            .get_transaction(transaction_id)
            .await?
            .filter(|t| t.customer_id == customer.user_id)
            .ok_or_else(|| MarketError::not_found("transaction", transaction_id))?;

        if !matches!(
            transaction.status,
            PaymentStatus::Failed | PaymentStatus::Pending | PaymentStatus::RequiresAction
        ) {
            return Err(MarketError::Conflict(format!(
                "transaction is {}, nothing to retry",
                transaction.status
            )));
        }

        let orders: Vec<Order> = self
            .store
            .orders_for_transaction(transaction.id)
            .await?
            .into_iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .collect();
        if orders.is_empty() {
            return Err(MarketError::Conflict(
                "transaction has no pending orders".to_string(),
            ));
        }

        let intent_id = transaction.payment_intent_id.clone().ok_or_else(|| {
            MarketError::Conflict("transaction has no payment intent".to_string())
        })?;
        let intent = self.gateway.retrieve_payment_intent(&intent_id).await?;
        if !intent.status.is_confirmable() {
            return Err(MarketError::Conflict(format!(
                "payment intent can no longer be confirmed ({:?})",
                intent.status
            )));
        }

        if transaction.status == PaymentStatus::Failed {
            transaction.set_status(PaymentStatus::Pending, None);
            self.store.update_transaction(&transaction).await?;
        }
        info!(transaction_id = %transaction.id, "Payment retry issued");

        Ok(CheckoutResult {
            transaction_id: transaction.id,
            orders,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: transaction.amount,
            publishable_key: self.gateway.publishable_key().map(str::to_string),
        })
    }
}
