//! # Routes
//!
//! Axum router configuration for the marketplace API.

use crate::handlers::{
    admin, blog, cart, catalog, checkout, health, orders, partner, profile, webhooks,
};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Maximum concurrent requests across the JSON API
const API_MAX_CONCURRENT_REQUESTS: usize = 128;

/// Create the main application router
///
/// Routes:
/// - Storefront (public):
///   - GET  /api/v1/products, /api/v1/products/{id}
///   - GET  /api/v1/partners, /api/v1/partners/{slug}
///   - GET  /api/v1/blog, /api/v1/blog/{slug}
///
/// - Customer (bearer token):
///   - GET/PUT /api/v1/me
///   - /api/v1/cart, /api/v1/cart/items, /api/v1/cart/items/{partner_product_id}
///   - POST /api/v1/checkout, /api/v1/checkout/{transaction_id}/retry
///   - /api/v1/orders, /api/v1/orders/{id}, /api/v1/orders/{id}/cancel
///
/// - Partner: /api/v1/partner/products, /api/v1/partner/orders
/// - Admin: /api/v1/admin/{products,partners,users,orders,blog}
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;

    let storefront_routes = Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/partners", get(catalog::list_partners))
        .route("/partners/{slug}", get(catalog::get_partner))
        .route("/blog", get(blog::list_posts))
        .route("/blog/{slug}", get(blog::get_post));

    let customer_routes = Router::new()
        .route("/me", get(profile::get_me).put(profile::update_me))
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{partner_product_id}",
            put(cart::set_quantity).delete(cart::remove_item),
        )
        .route("/checkout", post(checkout::checkout))
        .route("/checkout/{transaction_id}/retry", post(checkout::retry_payment))
        .route("/orders", get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/cancel", post(orders::cancel_order));

    let partner_routes = Router::new()
        .route(
            "/products",
            get(partner::list_products).post(partner::create_product),
        )
        .route("/products/{id}", put(partner::update_product))
        .route("/orders", get(partner::list_orders))
        .route("/orders/{id}/fulfillment", post(partner::fulfill_order));

    let admin_routes = Router::new()
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route(
            "/partners",
            get(admin::list_partners).post(admin::create_partner),
        )
        .route("/partners/{id}", put(admin::update_partner))
        .route("/users/{user_id}/role", put(admin::assign_role))
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/refund", post(admin::refund_order))
        .route("/blog", get(admin::list_posts).post(admin::create_post))
        .route(
            "/blog/{id}",
            put(admin::update_post).delete(admin::delete_post),
        )
        .route("/blog/{id}/publish", post(admin::publish_post));

    let api_routes = Router::new()
        .merge(storefront_routes)
        .merge(customer_routes)
        .nest("/partner", partner_routes)
        .nest("/admin", admin_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    // Webhook routes (must see the raw body for signature checks)
    let webhook_routes = Router::new().route("/stripe", post(webhooks::stripe_webhook));

    Router::new()
        .route("/health", get(health::health))
        .route("/", get(health::health))
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the CORS layer from configured origins
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cors_layer_accepts_bad_origins() {
        // Unparseable origins are dropped rather than failing startup.
        let _ = build_cors_layer(&["https://labkit.test".into(), "not a header\n".into()]);
        let _ = build_cors_layer(&["*".into()]);
    }
}
