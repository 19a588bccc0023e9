use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rate_limit::ClientIp;
use crate::api::middleware::rbac::AdminUser;
use crate::api::AppState;
use crate::db::audit;
use crate::db::models::subscription::{Plan, Subscription, UpdateSubscriptionRequest};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

/// Stored subscription, or an implicit free plan for accounts without a row.
pub(crate) async fn load(db: &DbPool, user_id: &str) -> AppResult<Subscription> {
    let sql = format!("SELECT {} FROM subscriptions WHERE user_id = ?", Subscription::COLUMNS);
    let row: Option<Subscription> = sqlx::query_as(&sql)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(row.unwrap_or_else(|| Subscription {
        user_id: user_id.to_string(),
        plan: Plan::Free.as_str().to_string(),
        status: "active".to_string(),
        current_period_end: None,
        updated_at: Utc::now().to_rfc3339(),
    }))
}

pub(crate) async fn open_job_count(db: &DbPool, company_id: &str) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM job_postings WHERE company_id = ? AND status = 'open'"
    )
    .bind(company_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

/// The plan whose limits apply to `user_id` right now.
pub(crate) async fn effective_plan(db: &DbPool, user_id: &str) -> AppResult<Plan> {
    Ok(load(db, user_id).await?.effective_plan(Utc::now()))
}

/// Guard that holds while a company (first bind) has fewer open jobs than a
/// quota (second bind). Writes that open a job carry it in their own WHERE.
pub(crate) const UNDER_JOB_QUOTA: &str =
    "(SELECT COUNT(*) FROM job_postings WHERE company_id = ? AND status = 'open') < ?";

pub(crate) fn job_quota_exceeded(plan: Plan) -> AppError {
    AppError::Forbidden(format!(
        "The {} plan allows {} open job postings; close one or upgrade",
        plan.as_str(),
        plan.open_job_quota().unwrap_or_default()
    ))
}

pub async fn get_own(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> AppResult<Json<Value>> {
    let sub = load(&state.db, auth.id()).await?;
    let mut body = sub.to_json(Utc::now());
    if auth.role() == "company" {
        body["open_jobs"] = json!(open_job_count(&state.db, auth.id()).await?);
    }
    Ok(Json(body))
}

/// Set a user's plan and status. There is no payment flow; this is the only writer.
pub async fn admin_update(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> AppResult<Json<Value>> {
    let period_end = match req.current_period_end.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| AppError::Validation(format!("Invalid current_period_end '{}': expected RFC 3339", raw)))?
                .with_timezone(&Utc)
                .to_rfc3339(),
        ),
        None => None,
    };

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO subscriptions (user_id, plan, status, current_period_end, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
             plan = excluded.plan,
             status = excluded.status,
             current_period_end = excluded.current_period_end,
             updated_at = excluded.updated_at"
    )
    .bind(&user_id)
    .bind(req.plan.as_str())
    .bind(req.status.as_str())
    .bind(&period_end)
    .bind(&now)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        &admin,
        "update",
        "subscription",
        Some(user_id.clone()),
        Some(format!("{} / {}", req.plan.as_str(), req.status.as_str())),
        ip,
    );

    let sub = load(&state.db, &user_id).await?;
    Ok(Json(sub.to_json(Utc::now())))
}
