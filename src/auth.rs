//! Bearer token verification.
//!
//! Tokens are HS256 JWTs issued by the auth provider; the `sub` claim carries the user id.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{config::AuthSettings, error::AppError, state::SharedState};

const MISSING_TOKEN: &str = "Unauthorized - missing or invalid token";
const INVALID_TOKEN: &str = "Unauthorized - invalid token";

/// JWT claims understood by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
    /// Audience, checked only when one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Authenticated caller extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    /// Identifier of the user.
    pub user_id: Uuid,
}

/// Caller that may or may not be authenticated.
///
/// A missing header yields `None`; a present but invalid token is still rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

/// Verify a bearer token and return its user.
pub fn verify_token(token: &str, settings: &AuthSettings) -> Result<AuthUser, AppError> {
    let secret = settings
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.into()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    match settings.jwt_audience.as_deref() {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| {
        debug!(error = %err, "rejected bearer token");
        AppError::Unauthorized(INVALID_TOKEN.into())
    })?;

    let user_id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| AppError::Unauthorized(INVALID_TOKEN.into()))?;
    Ok(AuthUser { user_id })
}

/// Sign a token for `user_id`, valid for `ttl_secs` seconds.
pub fn issue_token(
    user_id: Uuid,
    settings: &AuthSettings,
    ttl_secs: u64,
) -> Result<String, AppError> {
    let secret = settings
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Internal("AUTH_JWT_SECRET is not configured".into()))?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| AppError::Internal(err.to_string()))?
        .as_secs();

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl_secs) as usize,
        aud: settings.jwt_audience.clone(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AppError::Internal(err.to_string()))
}

fn bearer(parts: &Parts) -> Option<Result<&str, AppError>> {
    let value = parts.headers.get(header::AUTHORIZATION)?;
    Some(
        value
            .to_str()
            .ok()
            .and_then(|raw| raw.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.into())),
    )
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.into()))??;
        verify_token(token, state.config().auth())
    }
}

impl FromRequestParts<SharedState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match bearer(parts) {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => verify_token(token?, state.config().auth()).map(|user| Self(Some(user))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: Some("test-secret".into()),
            jwt_audience: None,
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, &settings(), 60).unwrap();
        assert_eq!(verify_token(&token, &settings()).unwrap().user_id, user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), &settings(), 60).unwrap();
        let other = AuthSettings {
            jwt_secret: Some("other".into()),
            jwt_audience: None,
        };
        assert!(matches!(
            verify_token(&token, &other),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn audience_is_enforced_when_configured() {
        let token = issue_token(Uuid::new_v4(), &settings(), 60).unwrap();
        let strict = AuthSettings {
            jwt_secret: Some("test-secret".into()),
            jwt_audience: Some("authenticated".into()),
        };
        assert!(verify_token(&token, &strict).is_err());

        let token = issue_token(Uuid::new_v4(), &strict, 60).unwrap();
        assert!(verify_token(&token, &strict).is_ok());
    }

    #[test]
    fn missing_secret_rejects_everything() {
        let token = issue_token(Uuid::new_v4(), &settings(), 60).unwrap();
        assert!(verify_token(&token, &AuthSettings::default()).is_err());
    }
}
