use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::api::handlers::profiles::load_profile_json;
use crate::api::middleware::auth::{bearer_token, cookie_token, AuthUser, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::api::middleware::rate_limit::{self, ClientIp};
use crate::api::sanitize;
use crate::api::validators::{EmailValidator, PasswordValidator, Validator};
use crate::api::AppState;
use crate::auth::password;
use crate::auth::session::{SessionUser, TokenPair};
use crate::db::models::user::{LoginRequest, RegisterRequest, Role, User};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

pub(crate) async fn fetch_user(db: &DbPool, id: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", User::COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(db).await?)
}

fn session_user(user: &User) -> SessionUser {
    SessionUser {
        id: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
    }
}

fn with_session_cookies(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    let access = Cookie::build((ACCESS_COOKIE, pair.access_token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/");
    let refresh = Cookie::build((REFRESH_COOKIE, pair.refresh_token.clone()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path(REFRESH_COOKIE_PATH);
    jar.add(access).add(refresh)
}

fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH))
}

fn session_body(user: &User, pair: &TokenPair) -> Value {
    json!({
        "user": user.to_json(),
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "token_type": "Bearer",
        "expires_in": pair.expires_in,
        "refresh_expires_in": pair.refresh_expires_in,
    })
}

/// The body is optional; when present it must be a JSON object.
fn parse_refresh_body(body: &Bytes) -> AppResult<RefreshRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RefreshRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(CookieJar, Json<Value>)> {
    if req.role == Role::Admin {
        return Err(AppError::Validation(
            "Role must be one of: professional, company".to_string(),
        ));
    }

    EmailValidator::new().validate(&req.email)?;
    PasswordValidator::new().validate(&req.password)?;
    let email = req.email.trim().to_lowercase();
    let name = sanitize::required("Name", &req.name, 100, false)?;

    let id = Uuid::new_v4().to_string();
    let password_hash = password::hash(&req.password)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
    let now = Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, email, password, name, role, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 1, ?, ?)"
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&name)
    .bind(req.role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::unique_violation(e, format!("Email '{}' is already registered", email)))?;

    if req.role == Role::Company {
        sqlx::query("INSERT INTO company_profiles (user_id, company_name, updated_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(&name)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query("INSERT INTO professional_profiles (user_id, updated_at) VALUES (?, ?)")
            .bind(&id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        "INSERT INTO subscriptions (user_id, plan, status, current_period_end, updated_at)
         VALUES (?, 'free', 'active', NULL, ?)"
    )
    .bind(&id)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let user = fetch_user(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::Internal("Registered user vanished".to_string()))?;
    let pair = state
        .sessions
        .issue(&session_user(&user))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    state.metrics.inc_registration();
    tracing::info!("Registered {} account {}", user.role, user.id);

    let jar = with_session_cookies(jar, &pair, state.cookie_secure);
    Ok((jar, Json(session_body(&user, &pair))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<Value>)> {
    let lockout = Duration::from_secs(state.rate_limit.login_lockout_secs);
    if rate_limit::is_locked(&state.login_attempts, &ip, state.rate_limit.max_login_failures, lockout) {
        tracing::warn!("Login blocked for {}: too many failures", ip);
        return Err(AppError::TooManyRequests);
    }

    let email = req.email.trim().to_lowercase();
    let sql = format!("SELECT {} FROM users WHERE email = ?", User::COLUMNS);
    let user: Option<User> = sqlx::query_as(&sql)
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    // Unknown emails pay for a hash check too, so timing does not reveal accounts
    let verified = match &user {
        Some(u) => password::verify(&req.password, &u.password),
        None => password::verify_dummy(&req.password),
    };

    let user = match user {
        Some(u) if verified && u.is_active() => u,
        _ => {
            rate_limit::record_failure(&state.login_attempts, &ip, lockout);
            state.metrics.inc_login(false);
            tracing::warn!("Failed login for '{}' from {}", email, ip);
            return Err(AppError::AuthFailed);
        }
    };

    state.login_attempts.remove(&ip);

    let pair = state
        .sessions
        .issue(&session_user(&user))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    state.metrics.inc_login(true);

    let jar = with_session_cookies(jar, &pair, state.cookie_secure);
    Ok((jar, Json(session_body(&user, &pair))))
}

/// Rotate a refresh token. The token comes from the JSON body or the refresh cookie.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, Json<Value>)> {
    let token = parse_refresh_body(&body)?
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AppError::AuthFailed)?;

    let claims = state.sessions.consume_refresh(&token).map_err(|e| {
        tracing::warn!("Refresh rejected: {}", e);
        AppError::AuthFailed
    })?;

    // Role and active flag may have changed since the token was issued
    let user = fetch_user(&state.db, &claims.sub)
        .await?
        .filter(User::is_active)
        .ok_or(AppError::AuthFailed)?;

    let pair = state
        .sessions
        .issue(&session_user(&user))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    state.metrics.inc_refresh();

    let jar = with_session_cookies(jar, &pair, state.cookie_secure);
    Ok((jar, Json(session_body(&user, &pair))))
}

/// Revokes whatever tokens the request carries. Only a malformed body fails.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, Json<Value>)> {
    let access = bearer_token(&headers)
        .or_else(|| cookie_token(&headers, ACCESS_COOKIE))
        .and_then(|t| state.sessions.verify_access(&t).ok());

    let refresh = parse_refresh_body(&body)?
        .refresh_token
        .or_else(|| cookie_token(&headers, REFRESH_COOKIE));

    state.sessions.revoke(refresh.as_deref(), access.as_ref());

    Ok((without_session_cookies(jar), Json(json!({"success": true}))))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> AppResult<Json<Value>> {
    let user = fetch_user(&state.db, auth.id())
        .await?
        .filter(User::is_active)
        .ok_or(AppError::AuthFailed)?;

    let profile = load_profile_json(&state.db, &user).await?;

    Ok(Json(json!({
        "user": user.to_json(),
        "profile": profile,
    })))
}
