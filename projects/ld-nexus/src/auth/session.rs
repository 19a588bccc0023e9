//! Access/refresh token pairs with a process-local refresh table.
//!
//! Access tokens are short-lived and verified statelessly, except for a small
//! denylist of jtis revoked by logout. Refresh tokens are single use: each
//! `consume_refresh` removes the jti, and the caller issues a fresh pair.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use super::jwt::{self, Claims, TokenKind};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid token")]
    Invalid,
    #[error("wrong token kind")]
    WrongKind,
    #[error("token revoked")]
    Revoked,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Identity embedded in issued tokens.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
}

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: String,
    exp: usize,
}

pub struct SessionManager {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// refresh jti → owner and expiry
    refresh_tokens: DashMap<String, TokenRecord>,
    /// access jti → owner and expiry, so a user's live access tokens can be revoked
    issued_access: DashMap<String, TokenRecord>,
    /// access jti → expiry, for tokens revoked before they expire
    revoked_access: DashMap<String, usize>,
}

impl SessionManager {
    pub fn new(secret: impl Into<String>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            access_ttl,
            refresh_ttl,
            refresh_tokens: DashMap::new(),
            issued_access: DashMap::new(),
            revoked_access: DashMap::new(),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue(&self, user: &SessionUser) -> Result<TokenPair, SessionError> {
        let (access_token, access_claims) = jwt::generate(
            &user.id, &user.email, &user.role,
            TokenKind::Access, &self.secret, self.access_ttl,
        )
        .map_err(|e| SessionError::Signing(e.to_string()))?;

        let (refresh_token, refresh_claims) = jwt::generate(
            &user.id, &user.email, &user.role,
            TokenKind::Refresh, &self.secret, self.refresh_ttl,
        )
        .map_err(|e| SessionError::Signing(e.to_string()))?;

        self.issued_access.insert(
            access_claims.jti,
            TokenRecord { user_id: user.id.clone(), exp: access_claims.exp },
        );
        self.refresh_tokens.insert(
            refresh_claims.jti,
            TokenRecord { user_id: user.id.clone(), exp: refresh_claims.exp },
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            refresh_expires_in: self.refresh_ttl.num_seconds(),
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, SessionError> {
        let claims = jwt::verify(token, &self.secret).map_err(|_| SessionError::Invalid)?;
        if claims.kind != TokenKind::Access {
            return Err(SessionError::WrongKind);
        }
        if self.revoked_access.contains_key(&claims.jti) {
            return Err(SessionError::Revoked);
        }
        Ok(claims)
    }

    /// Validate a refresh token and remove it from the table.
    pub fn consume_refresh(&self, token: &str) -> Result<Claims, SessionError> {
        let claims = jwt::verify(token, &self.secret).map_err(|_| SessionError::Invalid)?;
        if claims.kind != TokenKind::Refresh {
            return Err(SessionError::WrongKind);
        }
        match self.refresh_tokens.remove(&claims.jti) {
            Some((_, record)) if record.user_id == claims.sub => Ok(claims),
            _ => Err(SessionError::Revoked),
        }
    }

    /// Logout: forget the refresh token and denylist the access token.
    pub fn revoke(&self, refresh_token: Option<&str>, access: Option<&Claims>) {
        if let Some(token) = refresh_token {
            if let Ok(claims) = jwt::verify(token, &self.secret) {
                self.refresh_tokens.remove(&claims.jti);
            }
        }
        if let Some(claims) = access {
            self.issued_access.remove(&claims.jti);
            self.revoked_access.insert(claims.jti.clone(), claims.exp);
        }
    }

    /// End every session of `user_id`: drop its refresh tokens and reject access
    /// tokens issued so far. Returns how many refresh tokens were removed.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        self.issued_access.retain(|jti, record| {
            if record.user_id == user_id {
                self.revoked_access.insert(jti.clone(), record.exp);
                false
            } else {
                true
            }
        });
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|_, record| record.user_id != user_id);
        before - self.refresh_tokens.len()
    }

    /// Remove expired entries from every table.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now().timestamp() as usize;
        let before = self.tracked();
        self.refresh_tokens.retain(|_, record| record.exp > now);
        self.issued_access.retain(|_, record| record.exp > now);
        self.revoked_access.retain(|_, exp| *exp > now);
        before - self.tracked()
    }

    fn tracked(&self) -> usize {
        self.refresh_tokens.len() + self.issued_access.len() + self.revoked_access.len()
    }

    pub fn active_refresh_tokens(&self) -> usize {
        self.refresh_tokens.len()
    }
}
