use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, Extensions},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::AppState;
use crate::error::AppError;

const REQUEST_WINDOW: Duration = Duration::from_secs(60);

/// Count one hit for `key` in a fixed window. Returns false once `limit` is exceeded.
pub fn hit(windows: &DashMap<String, (u32, Instant)>, key: &str, limit: u32, window: Duration) -> bool {
    let now = Instant::now();
    let mut entry = windows.entry(key.to_string()).or_insert((0, now));
    let (count, started) = entry.value_mut();
    if now.duration_since(*started) >= window {
        *count = 0;
        *started = now;
    }
    *count += 1;
    *count <= limit
}

/// True while `key` has `max_failures` or more failures inside `lockout`.
pub fn is_locked(attempts: &DashMap<String, (u32, Instant)>, key: &str, max_failures: u32, lockout: Duration) -> bool {
    match attempts.get(key) {
        Some(entry) => {
            let (count, started) = *entry.value();
            count >= max_failures && started.elapsed() < lockout
        }
        None => false,
    }
}

/// Record a failed login. A window older than `lockout` starts over.
pub fn record_failure(attempts: &DashMap<String, (u32, Instant)>, key: &str, lockout: Duration) {
    let now = Instant::now();
    let mut entry = attempts.entry(key.to_string()).or_insert((0, now));
    let (count, started) = entry.value_mut();
    if now.duration_since(*started) >= lockout {
        *count = 0;
        *started = now;
    }
    *count += 1;
}

/// Drop windows that ended more than `max_age` ago.
pub fn purge(windows: &DashMap<String, (u32, Instant)>, max_age: Duration) -> usize {
    let before = windows.len();
    windows.retain(|_, (_, started)| started.elapsed() < max_age);
    before - windows.len()
}

pub fn peer_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Peer IP of the request, or `"unknown"` when the server runs without ConnectInfo.
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(peer_ip(&parts.extensions).unwrap_or_else(|| "unknown".to_string())))
    }
}

/// Per-IP fixed-window limiter. Requests without a known peer are let through.
pub async fn limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    state.metrics.inc_request();

    if let Some(ip) = peer_ip(req.extensions()) {
        if !hit(&state.request_windows, &ip, state.rate_limit.requests_per_minute, REQUEST_WINDOW) {
            state.metrics.inc_rate_limited();
            tracing::warn!("Rate limit exceeded for {} on {}", ip, req.uri().path());
            return AppError::TooManyRequests.into_response();
        }
    }

    next.run(req).await
}

/// Background sweep of stale limiter and session entries.
pub fn spawn_janitor(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let lockout = Duration::from_secs(state.rate_limit.login_lockout_secs);
            let windows = purge(&state.request_windows, REQUEST_WINDOW);
            let logins = purge(&state.login_attempts, lockout);
            let sessions = state.sessions.purge_expired();
            tracing::debug!(
                "Janitor purged {} request windows, {} login windows, {} session entries",
                windows, logins, sessions
            );
        }
    });
}
