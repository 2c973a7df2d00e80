//! Public storefront: listings and partners.

use axum::extract::{Path, Query, State};
use axum::Json;
use kit_core::{Listing, ListingFilter, MarketError, Partner};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// Purchasable listings (`?category=&partner=&q=`)
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ListingFilter>,
) -> ApiResult<Json<Value>> {
    let products = state.store.list_listings(&filter).await?;
    Ok(Json(json!({
        "count": products.len(),
        "products": products,
    })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Listing>> {
    let listing = state
        .store
        .get_listing(id)
        .await?
        .filter(Listing::is_purchasable)
        .ok_or_else(|| MarketError::not_found("product", id))?;
    Ok(Json(listing))
}

pub async fn list_partners(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let partners = state.store.list_partners(false).await?;
    Ok(Json(json!({
        "count": partners.len(),
        "partners": partners,
    })))
}

#[derive(Debug, Serialize)]
pub struct PartnerPage {
    pub partner: Partner,
    pub products: Vec<Listing>,
}

/// An active partner with its purchasable listings
pub async fn get_partner(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PartnerPage>> {
    let partner = state
        .store
        .get_partner_by_slug(&slug)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| MarketError::not_found("partner", &slug))?;

    let filter = ListingFilter {
        partner: Some(partner.slug.clone()),
        ..ListingFilter::default()
    };
    let products = state.store.list_listings(&filter).await?;
    Ok(Json(PartnerPage { partner, products }))
}
