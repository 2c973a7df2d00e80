//! Partner dashboard: own listings and order fulfillment.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use kit_core::{
    FulfillmentUpdate, MarketError, Money, NewPartnerProduct, Order, OrderFilter, PartnerProduct,
    PartnerProductUpdate,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::StatusQuery;
use crate::auth::PartnerUser;
use crate::error::ApiResult;
use crate::services::OrderService;
use crate::state::AppState;

/// Listings are priced in the marketplace currency only
fn check_currency(state: &AppState, price: &Money) -> Result<(), MarketError> {
    if price.currency != state.config.currency {
        return Err(MarketError::CurrencyMismatch {
            expected: state.config.currency.to_string(),
            found: price.currency.to_string(),
        });
    }
    Ok(())
}

async fn own_listing(
    state: &AppState,
    partner_id: Uuid,
    id: Uuid,
) -> ApiResult<PartnerProduct> {
    let listing = state
        .store
        .get_partner_product(id)
        .await?
        .filter(|l| l.partner_id == partner_id)
        .ok_or_else(|| MarketError::not_found("partner product", id))?;
    Ok(listing)
}

pub async fn list_products(
    State(state): State<AppState>,
    partner: PartnerUser,
) -> ApiResult<Json<Value>> {
    let products = state.store.list_partner_products(partner.partner_id).await?;
    Ok(Json(json!({
        "count": products.len(),
        "products": products,
    })))
}

#[instrument(skip(state, partner, request), fields(partner_id = %partner.partner_id))]
pub async fn create_product(
    State(state): State<AppState>,
    partner: PartnerUser,
    Json(request): Json<NewPartnerProduct>,
) -> ApiResult<(StatusCode, Json<PartnerProduct>)> {
    check_currency(&state, &request.price)?;
    let product = state
        .store
        .get_admin_product(request.admin_product_id)
        .await?
        .ok_or_else(|| MarketError::not_found("product", request.admin_product_id))?;
    if !product.active {
        return Err(MarketError::validation(
            "admin_product_id",
            "product is not available for listing",
        )
        .into());
    }

    let listing = request.into_listing(partner.partner_id)?;
    state.store.insert_partner_product(&listing).await?;
    info!(listing_id = %listing.id, product = %product.slug, "Listing created");
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn update_product(
    State(state): State<AppState>,
    partner: PartnerUser,
    Path(id): Path<Uuid>,
    Json(update): Json<PartnerProductUpdate>,
) -> ApiResult<Json<PartnerProduct>> {
    if let Some(ref price) = update.price {
        check_currency(&state, price)?;
    }
    let mut listing = own_listing(&state, partner.partner_id, id).await?;
    update.apply(&mut listing)?;
    state.store.update_partner_product(&listing).await?;
    Ok(Json(listing))
}

pub async fn list_orders(
    State(state): State<AppState>,
    partner: PartnerUser,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    let filter = OrderFilter {
        partner_id: Some(partner.partner_id),
        status: query.status,
        ..OrderFilter::default()
    };
    let orders = state.store.list_orders(&filter).await?;
    Ok(Json(json!({
        "count": orders.len(),
        "orders": orders,
    })))
}

/// Move one of the partner's orders through processing, shipped, delivered
pub async fn fulfill_order(
    State(state): State<AppState>,
    partner: PartnerUser,
    Path(id): Path<Uuid>,
    Json(update): Json<FulfillmentUpdate>,
) -> ApiResult<Json<Order>> {
    let order = OrderService::new(state.store.clone(), state.gateway.clone())
        .fulfill(partner.partner_id, id, update)
        .await?;
    Ok(Json(order))
}
