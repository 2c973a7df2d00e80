use axum::extract::State;
use axum::Json;
use kit_core::{Profile, ProfileUpdate};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_me(user: AuthUser) -> Json<Profile> {
    Json(user.profile)
}

/// Update name, phone, and default shipping address
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<Profile>> {
    let mut profile = user.profile;
    update.apply(&mut profile)?;
    state.store.upsert_profile(&profile).await?;
    tracing::info!(user_id = %profile.user_id, "Profile updated");
    Ok(Json(profile))
}
