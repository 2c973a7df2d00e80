//! # Admin Handlers
//!
//! Catalog, partners, role assignment, orders, and the blog. Every handler
//! takes `AdminUser`, so non-admins are rejected before any work is done.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use kit_core::{
    AdminProduct, BlogPost, MarketError, NewAdminProduct, NewBlogPost, NewPartner, Order,
    OrderFilter, Partner, PostFilter, Profile, RoleAssignment,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::services::OrderService;
use crate::state::AppState;

// =============================================================================
// Catalog
// =============================================================================

pub async fn list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Value>> {
    let products = state.store.list_admin_products(true).await?;
    Ok(Json(json!({
        "count": products.len(),
        "products": products,
    })))
}

pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<NewAdminProduct>,
) -> ApiResult<(StatusCode, Json<AdminProduct>)> {
    let product = request.into_product()?;
    state.store.insert_admin_product(&product).await?;
    info!(product_id = %product.id, slug = %product.slug, "Catalog product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<NewAdminProduct>,
) -> ApiResult<Json<AdminProduct>> {
    let existing = state
        .store
        .get_admin_product(id)
        .await?
        .ok_or_else(|| MarketError::not_found("product", id))?;
    let product = request.apply_to(&existing)?;
    state.store.update_admin_product(&product).await?;
    Ok(Json(product))
}

/// Delete a product no partner lists; listed products must be deactivated instead
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_admin_product(id).await?;
    info!(product_id = %id, "Catalog product deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Partners and roles
// =============================================================================

pub async fn list_partners(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Value>> {
    let partners = state.store.list_partners(true).await?;
    Ok(Json(json!({
        "count": partners.len(),
        "partners": partners,
    })))
}

pub async fn create_partner(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<NewPartner>,
) -> ApiResult<(StatusCode, Json<Partner>)> {
    let partner = request.into_partner()?;
    state.store.insert_partner(&partner).await?;
    info!(partner_id = %partner.id, slug = %partner.slug, "Partner created");
    Ok((StatusCode::CREATED, Json(partner)))
}

pub async fn update_partner(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<NewPartner>,
) -> ApiResult<Json<Partner>> {
    let existing = state
        .store
        .get_partner(id)
        .await?
        .ok_or_else(|| MarketError::not_found("partner", id))?;
    let partner = request.apply_to(&existing)?;
    state.store.update_partner(&partner).await?;
    Ok(Json(partner))
}

/// Grant a user a role; partner roles must name an existing partner
#[instrument(skip(state, admin, assignment), fields(admin_id = %admin.user.user_id))]
pub async fn assign_role(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(assignment): Json<RoleAssignment>,
) -> ApiResult<Json<Profile>> {
    let mut profile = state
        .store
        .get_profile(user_id)
        .await?
        .ok_or_else(|| MarketError::not_found("profile", user_id))?;

    if let Some(partner_id) = assignment.partner_id {
        if state.store.get_partner(partner_id).await?.is_none() {
            return Err(MarketError::not_found("partner", partner_id).into());
        }
    }

    assignment.apply(&mut profile)?;
    state.store.upsert_profile(&profile).await?;
    info!(user_id = %user_id, role = %profile.role, "Role assigned");
    Ok(Json(profile))
}

// =============================================================================
// Orders
// =============================================================================

/// All orders (`?status=&partner_id=&customer_id=`)
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<Json<Value>> {
    let orders = state.store.list_orders(&filter).await?;
    Ok(Json(json!({
        "count": orders.len(),
        "orders": orders,
    })))
}

pub async fn refund_order(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let order = OrderService::new(state.store.clone(), state.gateway.clone())
        .refund_order(id)
        .await?;
    info!(admin_id = %admin.user.user_id, order_id = %id, "Refund issued by admin");
    Ok(Json(order))
}

// =============================================================================
// Blog
// =============================================================================

async fn existing_post(state: &AppState, id: Uuid) -> ApiResult<BlogPost> {
    let post = state
        .store
        .get_post(id)
        .await?
        .ok_or_else(|| MarketError::not_found("post", id))?;
    Ok(post)
}

/// Every post including drafts (`?status=&tag=&page=&per_page=`)
pub async fn list_posts(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<PostFilter>,
) -> ApiResult<Json<Value>> {
    let posts = state.store.list_posts(&filter).await?;
    Ok(Json(json!({
        "page": filter.page.max(1),
        "count": posts.len(),
        "posts": posts,
    })))
}

pub async fn create_post(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(request): Json<NewBlogPost>,
) -> ApiResult<(StatusCode, Json<BlogPost>)> {
    let post = request.into_post(admin.user.user_id)?;
    state.store.insert_post(&post).await?;
    info!(post_id = %post.id, slug = %post.slug, "Draft post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<NewBlogPost>,
) -> ApiResult<Json<BlogPost>> {
    let existing = existing_post(&state, id).await?;
    let post = request.apply_to(&existing)?;
    state.store.update_post(&post).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BlogPost>> {
    let mut post = existing_post(&state, id).await?;
    post.publish();
    state.store.update_post(&post).await?;
    info!(post_id = %post.id, slug = %post.slug, "Post published");
    Ok(Json(post))
}
