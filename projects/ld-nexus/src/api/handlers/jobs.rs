use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::handlers::subscription::{effective_plan, job_quota_exceeded, UNDER_JOB_QUOTA};
use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rate_limit::ClientIp;
use crate::api::middleware::rbac::{require, require_owner};
use crate::api::pagination::{like_pattern, where_clause, Paging};
use crate::api::sanitize;
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::db::models::encode_list;
use crate::db::models::job::{CreateJobRequest, JobPosting, JobStatus, UpdateJobRequest};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// `open` (default), `closed` or `all`
    pub status: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub remote: Option<bool>,
    pub company_id: Option<String>,
}

pub(crate) async fn fetch_job(db: &DbPool, id: &str) -> AppResult<JobPosting> {
    let sql = format!("{} WHERE j.id = ?", JobPosting::SELECT);
    sqlx::query_as::<_, JobPosting>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
}

fn check_budget(min: Option<f64>, max: Option<f64>) -> AppResult<()> {
    for value in [min, max].into_iter().flatten() {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation("Budget must be a non-negative number".to_string()));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(AppError::Validation("budget_min cannot exceed budget_max".to_string()));
        }
    }
    Ok(())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<JobQuery>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::BrowseMarketplace)?;
    let paging = Paging::new(params.page, params.per_page);

    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    match params.status.as_deref().unwrap_or("open") {
        "all" => {}
        status @ ("open" | "closed") => {
            conditions.push("j.status = ?".to_string());
            binds.push(status.to_string());
        }
        other => {
            return Err(AppError::Validation(format!(
                "Invalid status '{}': expected open, closed or all",
                other
            )));
        }
    }
    if let Some(category) = sanitize::optional(params.category.as_deref()) {
        conditions.push("lower(j.category) = lower(?)".to_string());
        binds.push(category);
    }
    if let Some(q) = sanitize::optional(params.q.as_deref()) {
        conditions.push("(j.title LIKE ? ESCAPE '\\' OR j.description LIKE ? ESCAPE '\\')".to_string());
        let pattern = like_pattern(&q);
        binds.extend([pattern.clone(), pattern]);
    }
    if let Some(remote) = params.remote {
        conditions.push(format!("j.remote = {}", remote as i64));
    }
    if let Some(company_id) = params.company_id.filter(|c| !c.is_empty()) {
        conditions.push("j.company_id = ?".to_string());
        binds.push(company_id);
    }

    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM job_postings j {where_sql}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &binds {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(&state.db).await?;

    let data_sql = format!(
        "{} {where_sql} ORDER BY j.created_at DESC, j.id LIMIT ? OFFSET ?",
        JobPosting::SELECT
    );
    let mut data_query = sqlx::query_as::<_, JobPosting>(&data_sql);
    for b in &binds {
        data_query = data_query.bind(b);
    }
    let rows = data_query
        .bind(paging.per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    let data = rows.iter().map(JobPosting::to_json).collect();
    Ok(Json(paging.envelope(data, total)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateJobRequest>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::PostJobs)?;

    let title = sanitize::required("Title", &req.title, 200, false)?;
    let description = sanitize::required("Description", &req.description, 10_000, true)?;
    let category = sanitize::optional(req.category.as_deref());
    let location = sanitize::optional(req.location.as_deref());
    let skills = sanitize::list(&req.required_skills);
    check_budget(req.budget_min, req.budget_max)?;

    let plan = effective_plan(&state.db, auth.id()).await?;
    let quota = plan.open_job_quota();

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let sql = format!(
        "INSERT INTO job_postings
             (id, company_id, title, description, category, required_skills,
              budget_min, budget_max, location, remote, status, created_at, updated_at)
         SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'open', ?, ?
         WHERE ? IS NULL OR {UNDER_JOB_QUOTA}"
    );
    let inserted = sqlx::query(&sql)
        .bind(&id)
        .bind(auth.id())
        .bind(&title)
        .bind(&description)
        .bind(&category)
        .bind(encode_list(&skills))
        .bind(req.budget_min)
        .bind(req.budget_max)
        .bind(&location)
        .bind(req.remote as i64)
        .bind(&now)
        .bind(&now)
        .bind(quota)
        .bind(auth.id())
        .bind(quota)
        .execute(&state.db)
        .await?;

    if inserted.rows_affected() == 0 {
        return Err(job_quota_exceeded(plan));
    }

    tracing::info!("Company {} posted job {}", auth.id(), id);

    let job = fetch_job(&state.db, &id).await?;
    Ok(Json(job.to_json()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::BrowseMarketplace)?;
    let job = fetch_job(&state.db, &id).await?;
    Ok(Json(job.to_json()))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    Json(req): Json<UpdateJobRequest>,
) -> AppResult<Json<Value>> {
    let existing = fetch_job(&state.db, &id).await?;
    require_owner(&auth, &existing.company_id)?;

    let title = match req.title {
        Some(t) => sanitize::required("Title", &t, 200, false)?,
        None => existing.title,
    };
    let description = match req.description {
        Some(d) => sanitize::required("Description", &d, 10_000, true)?,
        None => existing.description,
    };
    let category = match req.category {
        Some(c) => sanitize::optional(Some(&c)),
        None => existing.category,
    };
    let location = match req.location {
        Some(l) => sanitize::optional(Some(&l)),
        None => existing.location,
    };
    let skills = req
        .required_skills
        .map(|s| encode_list(&sanitize::list(&s)))
        .unwrap_or(existing.required_skills);
    let budget_min = req.budget_min.or(existing.budget_min);
    let budget_max = req.budget_max.or(existing.budget_max);
    check_budget(budget_min, budget_max)?;
    let remote = req.remote.map(|r| r as i64).unwrap_or(existing.remote);

    let status = req.status.map(|s| s.as_str()).unwrap_or(existing.status.as_str()).to_string();
    // Reopening counts against the owner's quota like a new posting
    let reopen_plan = if existing.status != JobStatus::Open.as_str() && status == JobStatus::Open.as_str() {
        Some(effective_plan(&state.db, &existing.company_id).await?)
    } else {
        None
    };
    let quota = reopen_plan.and_then(|p| p.open_job_quota());

    let now = Utc::now().to_rfc3339();
    let sql = format!(
        "UPDATE job_postings
         SET title = ?, description = ?, category = ?, required_skills = ?, budget_min = ?,
             budget_max = ?, location = ?, remote = ?, status = ?, updated_at = ?
         WHERE id = ? AND (? IS NULL OR {UNDER_JOB_QUOTA})"
    );
    let updated = sqlx::query(&sql)
        .bind(&title)
        .bind(&description)
        .bind(&category)
        .bind(&skills)
        .bind(budget_min)
        .bind(budget_max)
        .bind(&location)
        .bind(remote)
        .bind(&status)
        .bind(&now)
        .bind(&id)
        .bind(quota)
        .bind(&existing.company_id)
        .bind(quota)
        .execute(&state.db)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(match reopen_plan {
            Some(plan) => job_quota_exceeded(plan),
            None => AppError::NotFound(format!("Job {} not found", id)),
        });
    }

    if auth.id() != existing.company_id {
        audit::log_action(state.db.clone(), &auth.0, "update", "job", Some(id.clone()), None, ip);
    }

    let job = fetch_job(&state.db, &id).await?;
    Ok(Json(job.to_json()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let existing = fetch_job(&state.db, &id).await?;
    require_owner(&auth, &existing.company_id)?;

    sqlx::query("DELETE FROM job_postings WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if auth.id() != existing.company_id {
        audit::log_action(
            state.db.clone(),
            &auth.0,
            "delete",
            "job",
            Some(id.clone()),
            Some(existing.title),
            ip,
        );
    }

    Ok(Json(json!({"success": true})))
}
