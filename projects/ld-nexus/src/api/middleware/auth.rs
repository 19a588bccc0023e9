use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::api::AppState;
use crate::auth::jwt::Claims;
use crate::auth::session::SessionError;
use crate::error::AppError;

pub const ACCESS_COOKIE: &str = "ld_access";
pub const REFRESH_COOKIE: &str = "ld_refresh";

/// Axum extractor that requires a valid access token.
/// The `Authorization: Bearer` header wins; the `ld_access` cookie is the fallback.
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.sub
    }

    pub fn role(&self) -> &str {
        &self.0.role
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers, ACCESS_COOKIE))
            .ok_or(AppError::AuthFailed)?;

        let claims = state.sessions.verify_access(&token).map_err(|e| {
            if matches!(e, SessionError::Revoked) {
                tracing::warn!("Rejected revoked access token on {}", parts.uri.path());
            }
            AppError::AuthFailed
        })?;

        Ok(AuthUser(claims))
    }
}
