//! Order lifecycle after checkout: customer cancellation, partner
//! fulfillment, and admin refunds.

use kit_core::{
    BoxedPaymentGateway, FulfillmentUpdate, MarketError, MarketResult, Money, Order, OrderFilter,
    OrderStatus, PaymentStatus, PaymentTransaction,
};
use kit_store::SharedStore;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct OrderService {
    store: SharedStore,
    gateway: BoxedPaymentGateway,
}

impl OrderService {
    pub fn new(store: SharedStore, gateway: BoxedPaymentGateway) -> Self {
        Self { store, gateway }
    }

    pub async fn list(&self, filter: &OrderFilter) -> MarketResult<Vec<Order>> {
        Ok(self.store.list_orders(filter).await?)
    }

    pub async fn get(&self, order_id: Uuid) -> MarketResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| MarketError::not_found("order", order_id))
    }

    /// An order visible to its customer; anyone else gets `NotFound`
    pub async fn get_for_customer(&self, customer_id: Uuid, order_id: Uuid) -> MarketResult<Order> {
        let order = self.get(order_id).await?;
        if order.customer_id != customer_id {
            return Err(MarketError::not_found("order", order_id));
        }
        Ok(order)
    }

    /// An order visible to the partner fulfilling it
    pub async fn get_for_partner(&self, partner_id: Uuid, order_id: Uuid) -> MarketResult<Order> {
        let order = self.get(order_id).await?;
        if order.partner_id != partner_id {
            return Err(MarketError::not_found("order", order_id));
        }
        Ok(order)
    }

    async fn transaction(&self, order: &Order) -> MarketResult<PaymentTransaction> {
        self.store
            .get_transaction(order.transaction_id)
            .await?
            .ok_or_else(|| MarketError::not_found("transaction", order.transaction_id))
    }

    /// Cancel an unpaid order and shrink or cancel the shared PaymentIntent
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, customer_id: Uuid, order_id: Uuid) -> MarketResult<Order> {
        let mut order = self.get_for_customer(customer_id, order_id).await?;
        if !order.is_customer_cancellable() {
            return Err(MarketError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }

        let mut tx = self.transaction(&order).await?;
        let remaining: Vec<Order> = self
            .store
            .orders_for_transaction(tx.id)
            .await?
            .into_iter()
            .filter(|o| o.id != order.id && o.status == OrderStatus::Pending)
            .collect();
        let remaining_total = remaining
            .iter()
            .try_fold(Money::zero(tx.amount.currency), |acc, o| acc.checked_add(&o.total))?;

        // Settle with the provider first so a gateway error leaves our records untouched.
        if let Some(ref intent_id) = tx.payment_intent_id {
            if remaining.is_empty() {
                self.gateway.cancel_payment_intent(intent_id).await?;
            } else {
                self.gateway
                    .update_payment_intent_amount(intent_id, remaining_total.amount)
                    .await?;
            }
        }

        order.transition(OrderStatus::Cancelled)?;
        order.payment_status = PaymentStatus::Cancelled;
        self.store.update_order(&order).await?;
        self.store.restock(std::slice::from_ref(&order)).await?;

        if remaining.is_empty() {
            tx.set_status(PaymentStatus::Cancelled, Some("cancelled by customer".to_string()));
        } else {
            tx.amount = remaining_total;
            tx.updated_at = chrono::Utc::now();
        }
        self.store.update_transaction(&tx).await?;

        info!(order_number = %order.order_number, "Order cancelled by customer");
        Ok(order)
    }

    /// Apply a fulfillment update to one of the partner's orders
    #[instrument(skip(self, update))]
    pub async fn fulfill(
        &self,
        partner_id: Uuid,
        order_id: Uuid,
        update: FulfillmentUpdate,
    ) -> MarketResult<Order> {
        let mut order = self.get_for_partner(partner_id, order_id).await?;
        order.fulfill(update)?;
        self.store.update_order(&order).await?;
        info!(order_number = %order.order_number, status = %order.status, "Order fulfillment updated");
        Ok(order)
    }

    /// Refund a paid order in full through the provider
    #[instrument(skip(self))]
    pub async fn refund_order(&self, order_id: Uuid) -> MarketResult<Order> {
        let mut order = self.get(order_id).await?;
        if !order.status.can_transition_to(OrderStatus::Refunded) {
            return Err(MarketError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Refunded.to_string(),
            });
        }

        let mut tx = self.transaction(&order).await?;
        let intent_id = tx.payment_intent_id.clone().ok_or_else(|| {
            MarketError::Conflict("order has no payment to refund".to_string())
        })?;
        let refund = self
            .gateway
            .refund_payment_intent(&intent_id, Some(order.total.amount))
            .await?;

        let was_paid = order.status == OrderStatus::Paid;
        order.transition(OrderStatus::Refunded)?;
        order.payment_status = PaymentStatus::Refunded;
        self.store.update_order(&order).await?;
        if was_paid {
            self.store.restock(std::slice::from_ref(&order)).await?;
        }

        let all_closed = self
            .store
            .orders_for_transaction(tx.id)
            .await?
            .iter()
            .all(|o| o.status.is_terminal());
        if all_closed {
            tx.set_status(PaymentStatus::Refunded, None);
            self.store.update_transaction(&tx).await?;
        }

        info!(
            order_number = %order.order_number,
            refund_id = %refund.id,
            amount = %order.total.display(),
            "Order refunded"
        );
        Ok(order)
    }
}
