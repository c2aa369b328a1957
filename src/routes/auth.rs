use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::db::{User, UserRepository};
use crate::error::AppError;
use crate::AppState;

// ============================================================================
// JWT
// ============================================================================
//
// Tokens are minted by the account service; this backend only verifies them.
// `sub` carries the numeric user id.

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Create a signed JWT for a user id
pub fn create_jwt(config: &JwtConfig, user_id: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(config.expiration_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok(token)
}

/// Decode and validate a JWT, returning the claims
pub fn decode_jwt(config: &JwtConfig, token: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

async fn get_user_from_token(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = decode_jwt(&state.config.jwt, token)?;
    let user_id: i64 = claims.sub.parse().map_err(|_| {
        tracing::debug!("Token subject is not a user id: {}", claims.sub);
        AppError::Unauthorized
    })?;

    UserRepository::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

// ============================================================================
// Auth Extractor
// ============================================================================

/// The authenticated caller. Every API handler takes this; its id scopes
/// every query the handler makes.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if auth_header.len() < 7 || !auth_header[..7].eq_ignore_ascii_case("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let user = get_user_from_token(state, token).await.map_err(|e| {
            tracing::debug!("Failed to get user from token: {:?}", e);
            e
        })?;

        Ok(AuthUser(user))
    }
}
