//! # kit-api
//!
//! HTTP API layer for the labkit marketplace.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Bearer-token extractors for customers, partners, and admins
//! - Services for cart, checkout, order lifecycle, and payment events
//! - The Stripe webhook endpoint
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | Storefront listings |
//! | POST | `/api/v1/cart/items` | Add to cart |
//! | POST | `/api/v1/checkout` | Orders + PaymentIntent |
//! | POST | `/api/v1/orders/{id}/cancel` | Cancel unpaid order |
//! | POST | `/api/v1/partner/orders/{id}/fulfillment` | Partner fulfillment |
//! | POST | `/api/v1/admin/orders/{id}/refund` | Admin refund |
//! | POST | `/webhook/stripe` | Stripe webhook |
//!
//! See [`routes::create_router`] for the full table.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::{AdminUser, AuthUser, Claims, JwtVerifier, PartnerUser};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
