//! Shared setup for the integration tests.
//!
//! Two modes:
//! 1. oneshot: call the router directly without binding a port. Handlers see
//!    no ConnectInfo, so the rate limiter is skipped and the client IP reads
//!    as "unknown".
//! 2. bound server: listen on a random port and talk HTTP through reqwest,
//!    for cookie sessions and per-IP behaviour.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt; // for .collect()
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt; // for .oneshot()

use ld_nexus::api::{build_app, AppState};
use ld_nexus::config::{
    AdminConfig, ApiConfig, AuthConfig, Config, DatabaseConfig, RateLimitConfig,
};
use ld_nexus::metrics::ApiMetrics;

pub const ADMIN_EMAIL: &str = "admin@nexus.test";
pub const ADMIN_PASSWORD: &str = "AdminPass123";
pub const PASSWORD: &str = "Password123";

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            port: 18099,
            bind: "127.0.0.1".to_string(),
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            static_dir: "frontend/dist".to_string(),
        },
        database: DatabaseConfig {
            path: ":memory:".to_string(),
        },
        auth: AuthConfig {
            jwt_secret: "test-jwt-secret-for-integration-tests-only-32chars".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            cookie_secure: false,
        },
        rate_limit: RateLimitConfig {
            requests_per_minute: 1000,
            max_login_failures: 5,
            login_lockout_secs: 300,
        },
        admin: AdminConfig {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        },
    }
}

/// In-memory database with migrations applied and the admin seeded.
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_db(cfg: &Config) -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    ld_nexus::db::migrate(&pool).await.expect("Migration failed");
    ld_nexus::db::seed_admin(&pool, cfg).await.expect("Failed to seed admin");
    pool
}

pub async fn build_test_app_with(cfg: Config) -> (Router, Arc<AppState>) {
    let db = setup_db(&cfg).await;
    let metrics = Arc::new(ApiMetrics::default());
    let state = Arc::new(AppState::new(&cfg, db, metrics));

    // CORS is irrelevant to in-process requests
    let cors = tower_http::cors::CorsLayer::new();
    let app = build_app(state.clone(), cors);
    (app, state)
}

pub async fn build_test_app() -> (Router, Arc<AppState>) {
    build_test_app_with(test_config()).await
}

/// App over a real database file with the production pool, for tests that
/// need several connections writing at once. Remove the file with `remove_db`.
pub async fn build_file_backed_app() -> (Router, Arc<AppState>, PathBuf) {
    let path = std::env::temp_dir().join(format!("ld-nexus-test-{}.db", uuid::Uuid::new_v4()));
    let mut cfg = test_config();
    cfg.database.path = path.to_string_lossy().into_owned();

    let db = ld_nexus::db::init(&cfg).await.expect("Failed to open file database");
    ld_nexus::db::seed_admin(&db, &cfg).await.expect("Failed to seed admin");
    let state = Arc::new(AppState::new(&cfg, db, Arc::new(ApiMetrics::default())));
    let app = build_app(state.clone(), tower_http::cors::CorsLayer::new());
    (app, state, path)
}

pub fn remove_db(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        std::fs::remove_file(file).ok();
    }
}

/// Serve the app on a random local port. The server task ends with the runtime.
pub async fn start_test_server_with(cfg: Config) -> (String, Arc<AppState>) {
    let (app, state) = build_test_app_with(cfg).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .ok();
    });

    (format!("http://127.0.0.1:{}", addr.port()), state)
}

pub async fn start_test_server() -> (String, Arc<AppState>) {
    start_test_server_with(test_config()).await
}

/// Read a response body as JSON; non-JSON bodies read as `Value::Null`.
pub async fn body_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// One oneshot request. `token` goes into the Authorization header.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let req = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_json(resp.into_body()).await)
}

pub struct Account {
    pub id: String,
    pub token: String,
    pub refresh_token: String,
}

fn account(body: &Value) -> Account {
    Account {
        id: body["user"]["id"].as_str().expect("user id").to_string(),
        token: body["access_token"].as_str().expect("access token").to_string(),
        refresh_token: body["refresh_token"].as_str().expect("refresh token").to_string(),
    }
}

pub async fn register(app: &Router, email: &str, name: &str, role: &str) -> Account {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({"email": email, "password": PASSWORD, "name": name, "role": role})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    account(&body)
}

pub async fn login(app: &Router, email: &str, password: &str) -> Account {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    account(&body)
}

pub async fn login_admin(app: &Router) -> Account {
    login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}
