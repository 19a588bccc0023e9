use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::handlers::auth::fetch_user;
use crate::api::middleware::rate_limit::ClientIp;
use crate::api::middleware::rbac::AdminUser;
use crate::api::pagination::{like_pattern, where_clause, Paging};
use crate::api::sanitize;
use crate::api::AppState;
use crate::db::audit;
use crate::db::DbPool;
use crate::db::models::user::{Role, User};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub role: Option<String>,
    pub q: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

async fn count(db: &DbPool, sql: &str) -> AppResult<i64> {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(db).await?;
    Ok(n)
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<Value>> {
    let db = &state.db;

    let roles: Vec<(String, i64)> = sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
        .fetch_all(db)
        .await?;
    let plans: Vec<(String, i64)> = sqlx::query_as("SELECT plan, COUNT(*) FROM subscriptions GROUP BY plan")
        .fetch_all(db)
        .await?;

    let by_role: serde_json::Map<String, Value> = roles.into_iter().map(|(r, n)| (r, json!(n))).collect();
    let by_plan: serde_json::Map<String, Value> = plans.into_iter().map(|(p, n)| (p, json!(n))).collect();

    Ok(Json(json!({
        "users": {
            "total": count(db, "SELECT COUNT(*) FROM users").await?,
            "active": count(db, "SELECT COUNT(*) FROM users WHERE is_active = 1").await?,
            "by_role": by_role,
        },
        "jobs": {
            "total": count(db, "SELECT COUNT(*) FROM job_postings").await?,
            "open": count(db, "SELECT COUNT(*) FROM job_postings WHERE status = 'open'").await?,
        },
        "forum": {
            "threads": count(db, "SELECT COUNT(*) FROM forum_posts WHERE parent_id IS NULL").await?,
            "replies": count(db, "SELECT COUNT(*) FROM forum_posts WHERE parent_id IS NOT NULL").await?,
        },
        "resources": count(db, "SELECT COUNT(*) FROM resources").await?,
        "subscriptions": by_plan,
        "active_sessions": state.sessions.active_refresh_tokens(),
    })))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<UserQuery>,
) -> AppResult<Json<Value>> {
    let paging = Paging::new(params.page, params.per_page);

    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(role) = params.role.as_deref().filter(|r| !r.is_empty()) {
        let role = Role::parse(role)
            .ok_or_else(|| AppError::Validation(format!("Invalid role '{}'", role)))?;
        conditions.push("role = ?".to_string());
        binds.push(role.as_str().to_string());
    }
    if let Some(q) = sanitize::optional(params.q.as_deref()) {
        conditions.push("(email LIKE ? ESCAPE '\\' OR name LIKE ? ESCAPE '\\')".to_string());
        let pattern = like_pattern(&q);
        binds.extend([pattern.clone(), pattern]);
    }
    if let Some(active) = params.active {
        conditions.push(format!("is_active = {}", active as i64));
    }
    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM users {where_sql}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &binds {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(&state.db).await?;

    let data_sql = format!(
        "SELECT {} FROM users {where_sql} ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
        User::COLUMNS
    );
    let mut data_query = sqlx::query_as::<_, User>(&data_sql);
    for b in &binds {
        data_query = data_query.bind(b);
    }
    let rows = data_query
        .bind(paging.per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    let data = rows.iter().map(User::to_json).collect();
    Ok(Json(paging.envelope(data, total)))
}

/// Activate or deactivate an account. Deactivation ends its sessions.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<Value>> {
    if id == admin.sub && !req.is_active {
        return Err(AppError::Forbidden("You cannot deactivate your own account".to_string()));
    }

    fetch_user(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(req.is_active as i64)
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await?;

    if !req.is_active {
        let revoked = state.sessions.revoke_user(&id);
        tracing::info!("Deactivated user {} ({} sessions revoked)", id, revoked);
    }

    audit::log_action(
        state.db.clone(),
        &admin,
        if req.is_active { "activate" } else { "deactivate" },
        "user",
        Some(id.clone()),
        None,
        ip,
    );

    let user = fetch_user(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(user.to_json()))
}

/// Change an account's role. Existing sessions are revoked so the new role takes effect.
/// The caller stays an active admin, so at least one admin always remains.
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> AppResult<Json<Value>> {
    if id == admin.sub {
        return Err(AppError::Forbidden("You cannot change your own role".to_string()));
    }

    let user = fetch_user(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    let new_role = req.role;
    if user.role == new_role.as_str() {
        return Ok(Json(user.to_json()));
    }

    let now = Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(new_role.as_str())
        .bind(&now)
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    // Profile rows are kept across role changes; create the one the new role needs
    match new_role {
        Role::Professional => {
            sqlx::query("INSERT OR IGNORE INTO professional_profiles (user_id, updated_at) VALUES (?, ?)")
                .bind(&id)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }
        Role::Company => {
            sqlx::query("INSERT OR IGNORE INTO company_profiles (user_id, company_name, updated_at) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(&user.name)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }
        Role::Admin => {}
    }
    tx.commit().await?;

    state.sessions.revoke_user(&id);

    audit::log_action(
        state.db.clone(),
        &admin,
        "update_role",
        "user",
        Some(id.clone()),
        Some(format!("{} -> {}", user.role, new_role.as_str())),
        ip,
    );

    let updated = fetch_user(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(updated.to_json()))
}
