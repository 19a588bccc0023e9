use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;

pub mod audit;
pub mod models;

pub type DbPool = SqlitePool;

pub async fn init(cfg: &Config) -> Result<DbPool> {
    let db_url = format!("sqlite://{}?mode=rwc", cfg.database.path);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::from_str(&db_url)?
                .create_if_missing(true)
                .foreign_keys(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal),
        )
        .await?;

    migrate(&pool).await?;

    tracing::info!("Database connected: {}", cfg.database.path);
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./src/db/migrations").run(pool).await?;
    Ok(())
}

/// Create the configured admin account if no admin exists yet.
pub async fn seed_admin(pool: &DbPool, cfg: &Config) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(pool)
        .await?;

    if count.0 == 0 {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let password = crate::auth::password::hash(&cfg.admin.password)?;
        let email = cfg.admin.email.trim().to_lowercase();

        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, email, password, name, role, is_active, created_at, updated_at)
             VALUES (?, ?, ?, 'Administrator', 'admin', 1, ?, ?)"
        )
        .bind(&id)
        .bind(&email)
        .bind(&password)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO subscriptions (user_id, plan, status, current_period_end, updated_at)
             VALUES (?, 'enterprise', 'active', NULL, ?)"
        )
        .bind(&id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::warn!(
            "Created default admin user ({}). Change the password immediately in production!",
            email
        );
    }

    Ok(())
}
