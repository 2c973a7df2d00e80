//! # Request Handlers
//!
//! Axum request handlers, one module per audience:
//! storefront (`catalog`, `blog`), signed-in customers (`profile`, `cart`,
//! `checkout`, `orders`), partners, admins, and the Stripe webhook.

pub mod admin;
pub mod blog;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod partner;
pub mod profile;
pub mod webhooks;

use kit_core::OrderStatus;
use serde::Deserialize;

/// `?status=` filter shared by order listings
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}
