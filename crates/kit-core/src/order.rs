//! # Order Types
//!
//! Orders, their items, shipping details, and the order status machine.
//!
//! ```text
//! pending ──► paid ──► processing ──► shipped ──► delivered
//!    │         │           │             │            │
//!    ▼         ▼           ▼             ▼            ▼
//! cancelled  cancelled  cancelled     refunded     refunded
//!            refunded   refunded
//! ```

use crate::error::{MarketError, MarketResult};
use crate::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a kit is shipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    /// ISO-3166 alpha-2
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingDetails {
    pub fn validate(&self) -> MarketResult<()> {
        let required = [
            ("shipping.full_name", &self.full_name),
            ("shipping.line1", &self.line1),
            ("shipping.city", &self.city),
            ("shipping.postal_code", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(MarketError::validation(field, "must not be empty"));
            }
        }
        let country = self.country.trim();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MarketError::validation(
                "shipping.country",
                "must be a two-letter country code",
            ));
        }
        Ok(())
    }

    /// Same details with the country code upper-cased
    pub fn normalized(mut self) -> Self {
        self.country = self.country.trim().to_ascii_uppercase();
        self
    }
}

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> MarketResult<Self> {
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(MarketError::validation(
                "status",
                format!("unknown order status: {other}"),
            )),
        }
    }

    /// Whether the state machine allows `self -> next`
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Processing)
                | (Paid, Cancelled)
                | (Paid, Refunded)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Processing, Refunded)
                | (Shipped, Delivered)
                | (Shipped, Refunded)
                | (Delivered, Refunded)
        )
    }

    /// No further transitions possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state as seen by the order and its transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    RequiresAction,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> MarketResult<Self> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "requires_action" => Ok(PaymentStatus::RequiresAction),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(MarketError::validation(
                "payment_status",
                format!("unknown payment status: {other}"),
            )),
        }
    }

    /// Money has been captured and not returned
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a purchased listing, frozen at checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub partner_product_id: Uuid,
    pub admin_product_id: Uuid,
    /// Product name (denormalized for display)
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// A purchase from a single partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable reference, e.g. `LK-20261016-3FA9C2`
    pub order_number: String,
    pub customer_id: Uuid,
    pub partner_id: Uuid,
    /// The payment transaction that pays for this order
    pub transaction_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping: ShippingDetails,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a pending order from priced items
    pub fn new(
        customer_id: Uuid,
        partner_id: Uuid,
        transaction_id: Uuid,
        items: Vec<OrderItem>,
        shipping: ShippingDetails,
        shipping_fee: Money,
    ) -> MarketResult<Self> {
        if items.is_empty() {
            return Err(MarketError::InvalidRequest("Order has no items".to_string()));
        }
        let currency = items[0].unit_price.currency;
        let subtotal = items
            .iter()
            .try_fold(Money::zero(currency), |acc, item| acc.checked_add(&item.line_total))?;
        let total = subtotal.checked_add(&shipping_fee)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        Ok(Self {
            id,
            order_number: order_number(&id, now),
            customer_id,
            partner_id,
            transaction_id,
            items,
            shipping,
            subtotal,
            shipping_fee,
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            tracking_number: None,
            carrier: None,
            notes: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        })
    }

    pub fn currency(&self) -> Currency {
        self.total.currency
    }

    /// Total units across all items
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Move to `next`, stamping the matching timestamp
    pub fn transition(&mut self, next: OrderStatus) -> MarketResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(MarketError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        match next {
            OrderStatus::Paid => self.paid_at = Some(now),
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a partner's fulfillment update
    pub fn fulfill(&mut self, update: FulfillmentUpdate) -> MarketResult<()> {
        update.validate()?;
        let next = update.status.as_order_status();
        self.transition(next)?;
        if next == OrderStatus::Shipped {
            self.tracking_number = update.tracking_number.map(|t| t.trim().to_string());
            self.carrier = update.carrier;
        }
        Ok(())
    }

    /// Only unpaid orders can be cancelled by the customer
    pub fn is_customer_cancellable(&self) -> bool {
        self.status == OrderStatus::Pending && !self.payment_status.is_settled()
    }
}

/// Build `LK-YYYYMMDD-XXXXXX` from the order id and creation date
pub fn order_number(id: &Uuid, at: DateTime<Utc>) -> String {
    let hex = id.simple().to_string().to_ascii_uppercase();
    format!("LK-{}-{}", at.format("%Y%m%d"), &hex[..6])
}

/// Fulfillment statuses a partner may set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Processing,
    Shipped,
    Delivered,
}

impl FulfillmentStatus {
    pub fn as_order_status(&self) -> OrderStatus {
        match self {
            FulfillmentStatus::Processing => OrderStatus::Processing,
            FulfillmentStatus::Shipped => OrderStatus::Shipped,
            FulfillmentStatus::Delivered => OrderStatus::Delivered,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentUpdate {
    pub status: FulfillmentStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
}

impl FulfillmentUpdate {
    pub fn validate(&self) -> MarketResult<()> {
        let has_tracking = self
            .tracking_number
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if self.status == FulfillmentStatus::Shipped && !has_tracking {
            return Err(MarketError::validation(
                "tracking_number",
                "required when marking an order shipped",
            ));
        }
        Ok(())
    }
}

/// Flat shipping fee charged once per partner order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Fee in smallest currency unit
    pub flat_fee: i64,
    /// Subtotal at or above which shipping is free
    pub free_over: Option<i64>,
}

impl ShippingPolicy {
    pub fn free() -> Self {
        Self {
            flat_fee: 0,
            free_over: None,
        }
    }

    pub fn fee_for(&self, subtotal: &Money) -> Money {
        let waived = self.free_over.is_some_and(|limit| subtotal.amount >= limit);
        if waived {
            Money::zero(subtotal.currency)
        } else {
            Money::from_cents(self.flat_fee, subtotal.currency)
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self::free()
    }
}

/// Query filter for order listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub partner_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.map_or(true, |c| order.customer_id == c)
            && self.partner_id.map_or(true, |p| order.partner_id == p)
            && self.status.map_or(true, |s| order.status == s)
    }
}
