use axum::{middleware::from_fn_with_state, routing::{get, post, put}, Router};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use super::handlers;
use super::middleware::rate_limit;
use super::AppState;

pub fn routes(state: Arc<AppState>) -> Router {
    let index = format!("{}/index.html", state.static_dir);
    let static_files = ServeDir::new(&state.static_dir).fallback(ServeFile::new(index));

    Router::new()
        // Health (public)
        .route("/health", get(handlers::health::health_check))
        // Auth (public, except me/logout)
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        // Profiles
        .route("/api/v1/profile", get(handlers::profiles::get_own).put(handlers::profiles::update_own))
        .route("/api/v1/professionals", get(handlers::profiles::list_professionals))
        .route("/api/v1/professionals/{id}", get(handlers::profiles::get_professional))
        .route("/api/v1/companies/{id}", get(handlers::profiles::get_company))
        // Jobs
        .route("/api/v1/jobs", get(handlers::jobs::list).post(handlers::jobs::create))
        .route("/api/v1/jobs/{id}", get(handlers::jobs::get).put(handlers::jobs::update).delete(handlers::jobs::delete))
        // Matching
        .route("/api/v1/jobs/{id}/matches", get(handlers::matches::for_job))
        .route("/api/v1/matches", get(handlers::matches::for_me))
        // Forum
        .route("/api/v1/forum/posts", get(handlers::forum::list).post(handlers::forum::create))
        .route("/api/v1/forum/posts/{id}", get(handlers::forum::get).put(handlers::forum::update).delete(handlers::forum::delete))
        .route("/api/v1/forum/posts/{id}/replies", post(handlers::forum::reply))
        // Resource hub
        .route("/api/v1/resources", get(handlers::resources::list).post(handlers::resources::create))
        .route("/api/v1/resources/{id}", get(handlers::resources::get).put(handlers::resources::update).delete(handlers::resources::delete))
        // Subscription status
        .route("/api/v1/subscription", get(handlers::subscription::get_own))
        // Admin panel
        .route("/api/v1/admin/stats", get(handlers::admin::stats))
        .route("/api/v1/admin/users", get(handlers::admin::list_users))
        .route("/api/v1/admin/users/{id}/status", put(handlers::admin::update_status))
        .route("/api/v1/admin/users/{id}/role", put(handlers::admin::update_role))
        .route("/api/v1/admin/users/{id}/subscription", put(handlers::subscription::admin_update))
        .route("/api/v1/admin/audit-log", get(handlers::audit_log::list))
        // Prometheus metrics (public)
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .layer(from_fn_with_state(state.clone(), rate_limit::limit))
        .with_state(state)
        // SPA bundle + index.html fallback (must come after with_state)
        .fallback_service(static_files)
}
