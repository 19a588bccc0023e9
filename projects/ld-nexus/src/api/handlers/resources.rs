use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rate_limit::ClientIp;
use crate::api::middleware::rbac::{require, require_owner};
use crate::api::pagination::{like_pattern, where_clause, Paging};
use crate::api::sanitize;
use crate::api::validators::{UrlValidator, Validator};
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::db::models::encode_list;
use crate::db::models::resource::{CreateResourceRequest, Resource, UpdateResourceRequest, RESOURCE_TYPES};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub tag: Option<String>,
    pub q: Option<String>,
}

async fn fetch_resource(db: &DbPool, id: &str) -> AppResult<Resource> {
    let sql = format!("{} WHERE r.id = ?", Resource::SELECT);
    sqlx::query_as::<_, Resource>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", id)))
}

fn resource_type(raw: &str) -> AppResult<String> {
    let t = raw.trim().to_lowercase();
    if RESOURCE_TYPES.contains(&t.as_str()) {
        Ok(t)
    } else {
        Err(AppError::Validation(format!(
            "Invalid resource type '{}': expected one of {}",
            raw,
            RESOURCE_TYPES.join(", ")
        )))
    }
}

fn resource_url(raw: Option<&str>) -> AppResult<Option<String>> {
    let url = sanitize::optional(raw);
    if let Some(ref u) = url {
        UrlValidator::new().validate(u)?;
    }
    Ok(url)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<ResourceQuery>,
) -> AppResult<Json<Value>> {
    let paging = Paging::new(params.page, params.per_page);

    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(category) = sanitize::optional(params.category.as_deref()) {
        conditions.push("lower(r.category) = lower(?)".to_string());
        binds.push(category);
    }
    if let Some(t) = sanitize::optional(params.resource_type.as_deref()) {
        conditions.push("r.resource_type = ?".to_string());
        binds.push(resource_type(&t)?);
    }
    if let Some(tag) = sanitize::optional(params.tag.as_deref()) {
        conditions.push("EXISTS (SELECT 1 FROM json_each(r.tags) t WHERE lower(t.value) = lower(?))".to_string());
        binds.push(tag);
    }
    if let Some(q) = sanitize::optional(params.q.as_deref()) {
        conditions.push("(r.title LIKE ? ESCAPE '\\' OR r.description LIKE ? ESCAPE '\\')".to_string());
        let pattern = like_pattern(&q);
        binds.extend([pattern.clone(), pattern]);
    }

    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM resources r {where_sql}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &binds {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(&state.db).await?;

    let data_sql = format!(
        "{} {where_sql} ORDER BY r.created_at DESC, r.id LIMIT ? OFFSET ?",
        Resource::SELECT
    );
    let mut data_query = sqlx::query_as::<_, Resource>(&data_sql);
    for b in &binds {
        data_query = data_query.bind(b);
    }
    let rows = data_query
        .bind(paging.per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    let data = rows.iter().map(Resource::to_json).collect();
    Ok(Json(paging.envelope(data, total)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateResourceRequest>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::PublishResources)?;

    let title = sanitize::required("Title", &req.title, 200, false)?;
    let description = sanitize::text(&req.description);
    sanitize::check_len("Description", &description, 5000)?;
    let category = sanitize::optional(req.category.as_deref());
    let kind = resource_type(&req.resource_type)?;
    let url = resource_url(req.url.as_deref())?;
    let tags = sanitize::list(&req.tags);

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO resources
             (id, author_id, title, description, category, resource_type, url, tags, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&id)
    .bind(auth.id())
    .bind(&title)
    .bind(&description)
    .bind(&category)
    .bind(&kind)
    .bind(&url)
    .bind(encode_list(&tags))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let resource = fetch_resource(&state.db, &id).await?;
    Ok(Json(resource.to_json()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let resource = fetch_resource(&state.db, &id).await?;
    Ok(Json(resource.to_json()))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    Json(req): Json<UpdateResourceRequest>,
) -> AppResult<Json<Value>> {
    let existing = fetch_resource(&state.db, &id).await?;
    require_owner(&auth, &existing.author_id)?;

    let title = match req.title {
        Some(t) => sanitize::required("Title", &t, 200, false)?,
        None => existing.title,
    };
    let description = match req.description {
        Some(d) => {
            let d = sanitize::text(&d);
            sanitize::check_len("Description", &d, 5000)?;
            d
        }
        None => existing.description,
    };
    let category = match req.category {
        Some(c) => sanitize::optional(Some(&c)),
        None => existing.category,
    };
    let kind = match req.resource_type {
        Some(t) => resource_type(&t)?,
        None => existing.resource_type,
    };
    let url = match req.url {
        Some(u) => resource_url(Some(&u))?,
        None => existing.url,
    };
    let tags = req.tags.map(|t| encode_list(&sanitize::list(&t))).unwrap_or(existing.tags);

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE resources
         SET title = ?, description = ?, category = ?, resource_type = ?, url = ?, tags = ?, updated_at = ?
         WHERE id = ?"
    )
    .bind(&title)
    .bind(&description)
    .bind(&category)
    .bind(&kind)
    .bind(&url)
    .bind(&tags)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    if auth.id() != existing.author_id {
        audit::log_action(state.db.clone(), &auth.0, "update", "resource", Some(id.clone()), None, ip);
    }

    let resource = fetch_resource(&state.db, &id).await?;
    Ok(Json(resource.to_json()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let existing = fetch_resource(&state.db, &id).await?;
    require_owner(&auth, &existing.author_id)?;

    sqlx::query("DELETE FROM resources WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if auth.id() != existing.author_id {
        audit::log_action(
            state.db.clone(),
            &auth.0,
            "delete",
            "resource",
            Some(id.clone()),
            Some(existing.title),
            ip,
        );
    }

    Ok(Json(json!({"success": true})))
}
