use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use chrono::Duration;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::session::SessionManager;
use crate::config::{Config, RateLimitConfig};
use crate::db::DbPool;
use crate::metrics::ApiMetrics;

pub mod handlers;
pub mod middleware;
pub mod pagination;
pub mod router;
pub mod sanitize;
pub mod validators;

pub struct AppState {
    pub db: DbPool,
    pub sessions: SessionManager,
    pub metrics: Arc<ApiMetrics>,
    pub rate_limit: RateLimitConfig,
    pub cookie_secure: bool,
    pub static_dir: String,
    /// Request window per client: ip → (request_count, window_start)
    pub request_windows: DashMap<String, (u32, Instant)>,
    /// Login failure tracking: ip → (failure_count, window_start)
    pub login_attempts: DashMap<String, (u32, Instant)>,
}

impl AppState {
    pub fn new(cfg: &Config, db: DbPool, metrics: Arc<ApiMetrics>) -> Self {
        Self {
            db,
            sessions: SessionManager::new(
                cfg.auth.jwt_secret.clone(),
                Duration::minutes(cfg.auth.access_token_ttl_minutes as i64),
                Duration::days(cfg.auth.refresh_token_ttl_days as i64),
            ),
            metrics,
            rate_limit: cfg.rate_limit.clone(),
            cookie_secure: cfg.auth.cookie_secure,
            static_dir: cfg.api.static_dir.clone(),
            request_windows: DashMap::new(),
            login_attempts: DashMap::new(),
        }
    }
}

pub async fn serve(cfg: Config, state: Arc<AppState>) -> Result<()> {
    let bind_addr = format!("{}:{}", cfg.api.bind, cfg.api.port);
    let cors = build_cors_layer(&cfg.api.cors_allowed_origins);
    let app = build_app(state, cors);

    // ConnectInfo exposes the peer IP to the rate limiter and login throttle
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("L&D Nexus API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured; CORS will block all cross-origin requests");
        return CorsLayer::new();
    }

    // Credentials are needed for the cookie session
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn build_app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(router::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
