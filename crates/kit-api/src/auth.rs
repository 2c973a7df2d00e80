//! Authentication extractors.
//!
//! - `AuthUser`: any signed-in user; the profile is created on first use
//! - `PartnerUser`: a user bound to a partner
//! - `AdminUser`: a platform administrator
//!
//! Tokens are HS256 JWTs issued by the hosted auth provider. `sub` is the
//! user's UUID.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use kit_core::Profile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Claims the marketplace reads from a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    pub exp: i64,
}

/// Validates bearer tokens against the shared secret
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                ApiError::Unauthorized
            })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)
}

/// An authenticated user and their profile
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub profile: Profile,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = state.auth.verify(bearer_token(parts)?)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

        let profile = match state.store.get_profile(user_id).await? {
            Some(profile) => profile,
            None => {
                let profile = Profile::new_client(user_id, claims.email.unwrap_or_default());
                state.store.upsert_profile(&profile).await?;
                tracing::info!(user_id = %user_id, "Created client profile");
                profile
            }
        };

        Ok(AuthUser { user_id, profile })
    }
}

/// A user who manages a partner
#[derive(Debug, Clone)]
pub struct PartnerUser {
    pub user: AuthUser,
    pub partner_id: Uuid,
}

impl FromRequestParts<AppState> for PartnerUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let partner_id = user
            .profile
            .managed_partner()
            .ok_or_else(|| ApiError::Forbidden("partner access required".into()))?;
        Ok(PartnerUser { user, partner_id })
    }
}

/// A platform administrator
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: AuthUser,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.profile.is_admin() {
            return Err(ApiError::Forbidden("admin access required".into()));
        }
        tracing::info!(admin_id = %user.user_id, "Admin authenticated");
        Ok(AdminUser { user })
    }
}
