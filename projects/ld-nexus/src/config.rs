use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins. Defaults to localhost dev ports.
    /// Set LD_NEXUS__API__CORS_ALLOWED_ORIGINS in production.
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
    /// Built single-page app served as the router fallback.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: u64,
    /// Mark session cookies `Secure`. Enable behind HTTPS.
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_max_login_failures")]
    pub max_login_failures: u32,
    #[serde(default = "default_login_lockout")]
    pub login_lockout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_email")]
    pub email: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
}

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_api_port() -> u16 { 8080 }
fn default_static_dir() -> String { "frontend/dist".to_string() }
fn default_db_path() -> String { "./ld-nexus.db".to_string() }
fn default_access_ttl() -> u64 { 15 }
fn default_refresh_ttl() -> u64 { 7 }
fn default_requests_per_minute() -> u32 { 120 }
fn default_max_login_failures() -> u32 { 5 }
fn default_login_lockout() -> u64 { 300 }
fn default_admin_email() -> String { "admin@ldnexus.local".to_string() }
fn default_admin_password() -> String { "admin-change-me".to_string() }
fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

pub fn validate(cfg: &Config) -> Result<()> {
    if cfg.auth.jwt_secret == DEFAULT_JWT_SECRET {
        anyhow::bail!(
            "SECURITY ERROR: JWT secret must be changed from default value '{}'. \
            Set LD_NEXUS__AUTH__JWT_SECRET environment variable with a strong random value.",
            DEFAULT_JWT_SECRET
        );
    }

    if cfg.auth.jwt_secret.len() < 32 {
        anyhow::bail!(
            "CONFIG ERROR: JWT secret must be at least 32 characters (current: {})",
            cfg.auth.jwt_secret.len()
        );
    }

    if cfg.auth.access_token_ttl_minutes == 0 || cfg.auth.refresh_token_ttl_days == 0 {
        anyhow::bail!("CONFIG ERROR: token lifetimes must be non-zero");
    }

    // Refresh tokens must outlive the access tokens they renew
    if cfg.auth.refresh_token_ttl_days * 24 * 60 <= cfg.auth.access_token_ttl_minutes {
        anyhow::bail!(
            "CONFIG ERROR: refresh_token_ttl_days ({}d) must exceed access_token_ttl_minutes ({}m)",
            cfg.auth.refresh_token_ttl_days,
            cfg.auth.access_token_ttl_minutes
        );
    }

    if cfg.rate_limit.requests_per_minute == 0 || cfg.rate_limit.max_login_failures == 0 {
        anyhow::bail!("CONFIG ERROR: rate limits must be non-zero");
    }

    if let Some(parent) = std::path::Path::new(&cfg.database.path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            anyhow::bail!(
                "CONFIG ERROR: Database directory does not exist: {}",
                parent.display()
            );
        }
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}

pub fn load() -> Result<Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(
            config::Environment::with_prefix("LD_NEXUS")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("api.cors_allowed_origins")
                .try_parsing(true),
        )
        .set_default("api.bind", "0.0.0.0")?
        .set_default("api.port", 8080)?
        .set_default("api.static_dir", "frontend/dist")?
        .set_default("database.path", "./ld-nexus.db")?
        .set_default("auth.jwt_secret", DEFAULT_JWT_SECRET)?
        .set_default("auth.access_token_ttl_minutes", 15)?
        .set_default("auth.refresh_token_ttl_days", 7)?
        .set_default("auth.cookie_secure", false)?
        .set_default("rate_limit.requests_per_minute", 120)?
        .set_default("rate_limit.max_login_failures", 5)?
        .set_default("rate_limit.login_lockout_secs", 300)?
        .set_default("admin.email", "admin@ldnexus.local")?
        .set_default("admin.password", "admin-change-me")?
        .build()?
        .try_deserialize()?;

    validate(&cfg)?;

    Ok(cfg)
}
