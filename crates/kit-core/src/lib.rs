//! # kit-core
//!
//! Core domain types and traits for the labkit marketplace.
//!
//! This crate provides:
//! - `Partner`, `AdminProduct`, `PartnerProduct`, and `Listing` for the catalog
//! - `Cart` and `validate_cart` for checkout-time validation
//! - `Order`, `OrderStatus`, and `ShippingDetails` for fulfillment
//! - `PaymentTransaction` and the `PaymentGateway` trait for payments
//! - `BlogPost` for the admin-managed blog
//! - `Profile` and `Role` for access control
//! - `MarketError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use kit_core::{validate_cart, Order, PaymentTransaction, CreatePaymentIntent};
//!
//! // Price the cart against live listings
//! let validated = validate_cart(&cart, &listings)?;
//!
//! // One order per partner, one transaction for the whole checkout
//! let tx = PaymentTransaction::new(customer_id, "stripe", validated.total);
//!
//! // Ask the gateway for a PaymentIntent and hand the client secret to the browser
//! let intent = gateway.create_payment_intent(&CreatePaymentIntent::new(&tx, order_ids)).await?;
//! ```

pub mod blog;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod order;
pub mod payment;
pub mod profile;

// Re-exports for convenience
pub use blog::{BlogPost, NewBlogPost, PostFilter, PostStatus};
pub use cart::{validate_cart, Cart, CartError, CartItem, PartnerGroup, PricedLine, ValidatedCart};
pub use catalog::{
    slugify, AdminProduct, Listing, ListingFilter, NewAdminProduct, NewPartner,
    NewPartnerProduct, Partner, PartnerProduct, PartnerProductUpdate, TestCategory,
};
pub use error::{MarketError, MarketResult};
pub use money::{Currency, Money};
pub use order::{
    FulfillmentStatus, FulfillmentUpdate, Order, OrderFilter, OrderItem, OrderStatus,
    PaymentStatus, ShippingDetails, ShippingPolicy,
};
pub use payment::{
    BoxedPaymentGateway, CreatePaymentIntent, PaymentEvent, PaymentEventKind, PaymentGateway,
    PaymentIntent, PaymentIntentStatus, PaymentTransaction, Refund,
};
pub use profile::{Profile, ProfileUpdate, Role, RoleAssignment};
