use axum::extract::{Path, Query, State};
use axum::Json;
use kit_core::{BlogPost, MarketError, PostFilter, PostStatus};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

/// Published posts, newest first (`?tag=&page=&per_page=`)
pub async fn list_posts(
    State(state): State<AppState>,
    Query(mut filter): Query<PostFilter>,
) -> ApiResult<Json<Value>> {
    filter.status = Some(PostStatus::Published);
    let posts = state.store.list_posts(&filter).await?;
    Ok(Json(json!({
        "page": filter.page.max(1),
        "count": posts.len(),
        "posts": posts,
    })))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<BlogPost>> {
    let post = state
        .store
        .get_post_by_slug(&slug)
        .await?
        .filter(BlogPost::is_public)
        .ok_or_else(|| MarketError::not_found("post", &slug))?;
    Ok(Json(post))
}
