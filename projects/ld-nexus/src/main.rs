use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use ld_nexus::api::{self, middleware::rate_limit, AppState};
use ld_nexus::{config, db, metrics};

const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ld_nexus=info".parse()?)
        )
        .init();

    info!("Starting L&D Nexus v{}", env!("CARGO_PKG_VERSION"));

    let cfg = config::load()?;
    info!("Configuration loaded");

    let db_pool = db::init(&cfg).await?;
    info!("Database initialized");

    // Seed initial admin user if none exist
    db::seed_admin(&db_pool, &cfg).await?;

    let metrics = Arc::new(metrics::ApiMetrics::default());
    let state = Arc::new(AppState::new(&cfg, db_pool, metrics));

    // Expired sessions and stale rate-limit windows live in memory only
    rate_limit::spawn_janitor(state.clone(), JANITOR_INTERVAL);

    api::serve(cfg, state).await
}
