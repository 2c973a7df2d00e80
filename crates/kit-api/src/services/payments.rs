//! # Payment Events
//!
//! Applies verified provider webhooks to transactions and orders. Each event
//! id is recorded before it is handled so redeliveries are acknowledged
//! without being applied twice. A failed event is forgotten again so the
//! provider's retry gets another chance.

use async_trait::async_trait;
use kit_core::{
    MarketResult, Order, OrderStatus, PaymentEvent, PaymentStatus, PaymentTransaction,
};
use kit_store::SharedStore;
use kit_stripe::{dispatch_webhook_event, WebhookHandler};
use tracing::{debug, info, instrument, warn};

/// Result of processing one webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Processed,
    Duplicate,
}

pub struct PaymentEventProcessor {
    store: SharedStore,
}

impl PaymentEventProcessor {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, event), fields(event_id = %event.event_id, event_type = %event.event_type))]
    pub async fn process(&self, event: &PaymentEvent) -> MarketResult<EventOutcome> {
        if !self
            .store
            .record_webhook_event(&event.event_id, &event.event_type)
            .await?
        {
            info!("Duplicate webhook event, skipping");
            return Ok(EventOutcome::Duplicate);
        }

        if let Err(e) = dispatch_webhook_event(self, event).await {
            warn!(error = %e, "Webhook handling failed");
            if let Err(forget) = self.store.forget_webhook_event(&event.event_id).await {
                warn!(error = %forget, "Failed to release webhook event for retry");
            }
            return Err(e);
        }
        Ok(EventOutcome::Processed)
    }

    /// The transaction an event refers to, by intent id then by metadata
    async fn transaction_for(
        &self,
        event: &PaymentEvent,
    ) -> MarketResult<Option<PaymentTransaction>> {
        if let Some(ref intent_id) = event.payment_intent_id {
            if let Some(tx) = self.store.get_transaction_by_intent(intent_id).await? {
                return Ok(Some(tx));
            }
        }
        match event.transaction_id() {
            Some(id) => Ok(self.store.get_transaction(id).await?),
            None => Ok(None),
        }
    }

    async fn load(
        &self,
        event: &PaymentEvent,
    ) -> MarketResult<Option<(PaymentTransaction, Vec<Order>)>> {
        let Some(tx) = self.transaction_for(event).await? else {
            warn!(payment_intent = ?event.payment_intent_id, "No transaction for payment event");
            return Ok(None);
        };
        let orders = self.store.orders_for_transaction(tx.id).await?;
        Ok(Some((tx, orders)))
    }

    /// Record a non-terminal payment state on the transaction and its open orders
    async fn mark_progress(&self, event: &PaymentEvent, status: PaymentStatus) -> MarketResult<()> {
        let Some((mut tx, orders)) = self.load(event).await? else {
            return Ok(());
        };
        if tx.status.is_settled() || tx.status == PaymentStatus::Refunded {
            debug!(transaction_id = %tx.id, status = %tx.status, "Ignoring stale payment progress");
            return Ok(());
        }

        tx.set_status(status, None);
        self.store.update_transaction(&tx).await?;
        for mut order in orders.into_iter().filter(|o| o.status == OrderStatus::Pending) {
            order.payment_status = status;
            self.store.update_order(&order).await?;
        }
        info!(transaction_id = %tx.id, status = %status, "Payment progress recorded");
        Ok(())
    }
}

#[async_trait]
impl WebhookHandler for PaymentEventProcessor {
    async fn on_payment_succeeded(&self, event: &PaymentEvent) -> MarketResult<()> {
        let Some((mut tx, orders)) = self.load(event).await? else {
            return Ok(());
        };
        if let Some(received) = event.amount {
            if received != tx.amount.amount {
                warn!(
                    transaction_id = %tx.id,
                    expected = tx.amount.amount,
                    received,
                    "Received amount differs from transaction amount"
                );
            }
        }

        tx.set_status(PaymentStatus::Succeeded, None);
        self.store.update_transaction(&tx).await?;

        for mut order in orders {
            match order.status {
                OrderStatus::Pending => {
                    order.transition(OrderStatus::Paid)?;
                    order.payment_status = PaymentStatus::Succeeded;
                    self.store.update_order(&order).await?;
                    info!(order_id = %order.id, order_number = %order.order_number, "Order paid");
                }
                OrderStatus::Cancelled => {
                    warn!(order_id = %order.id, "Payment succeeded for a cancelled order");
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn on_payment_processing(&self, event: &PaymentEvent) -> MarketResult<()> {
        self.mark_progress(event, PaymentStatus::Processing).await
    }

    async fn on_payment_requires_action(&self, event: &PaymentEvent) -> MarketResult<()> {
        self.mark_progress(event, PaymentStatus::RequiresAction).await
    }

    async fn on_payment_failed(&self, event: &PaymentEvent) -> MarketResult<()> {
        let Some((mut tx, orders)) = self.load(event).await? else {
            return Ok(());
        };
        if tx.status.is_settled() {
            return Ok(());
        }

        let reason = event
            .failure_reason
            .clone()
            .unwrap_or_else(|| "payment failed".to_string());
        warn!(transaction_id = %tx.id, reason = %reason, "Payment failed");
        tx.set_status(PaymentStatus::Failed, Some(reason));
        self.store.update_transaction(&tx).await?;

        // Orders stay pending so the customer can retry with another card.
        for mut order in orders.into_iter().filter(|o| o.status == OrderStatus::Pending) {
            order.payment_status = PaymentStatus::Failed;
            self.store.update_order(&order).await?;
        }
        Ok(())
    }

    async fn on_payment_canceled(&self, event: &PaymentEvent) -> MarketResult<()> {
        let Some((mut tx, orders)) = self.load(event).await? else {
            return Ok(());
        };
        tx.set_status(PaymentStatus::Cancelled, event.failure_reason.clone());
        self.store.update_transaction(&tx).await?;

        let mut released = Vec::new();
        for mut order in orders.into_iter().filter(|o| o.status == OrderStatus::Pending) {
            order.transition(OrderStatus::Cancelled)?;
            order.payment_status = PaymentStatus::Cancelled;
            self.store.update_order(&order).await?;
            released.push(order);
        }
        self.store.restock(&released).await?;
        info!(transaction_id = %tx.id, cancelled = released.len(), "Payment canceled");
        Ok(())
    }

    async fn on_refund(&self, event: &PaymentEvent) -> MarketResult<()> {
        let Some((mut tx, orders)) = self.load(event).await? else {
            return Ok(());
        };
        let refunded = event.amount.unwrap_or(0);
        if refunded < tx.amount.amount {
            info!(transaction_id = %tx.id, refunded, "Partial refund recorded");
            return Ok(());
        }

        let mut released = Vec::new();
        for mut order in orders {
            if !order.status.can_transition_to(OrderStatus::Refunded) {
                continue;
            }
            let was_paid = order.status == OrderStatus::Paid;
            order.transition(OrderStatus::Refunded)?;
            order.payment_status = PaymentStatus::Refunded;
            self.store.update_order(&order).await?;
            if was_paid {
                released.push(order);
            }
        }
        self.store.restock(&released).await?;

        tx.set_status(PaymentStatus::Refunded, None);
        self.store.update_transaction(&tx).await?;
        info!(transaction_id = %tx.id, refunded, "Transaction fully refunded");
        Ok(())
    }
}
