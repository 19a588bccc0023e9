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
use crate::api::pagination::{where_clause, Paging};
use crate::api::sanitize;
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::db::models::forum::{CreatePostRequest, CreateReplyRequest, ForumPost, UpdatePostRequest};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

const MAX_TITLE: usize = 200;
const MAX_CONTENT: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct ForumQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
}

async fn fetch_post(db: &DbPool, id: &str) -> AppResult<ForumPost> {
    let sql = format!("{} WHERE f.id = ?", ForumPost::SELECT);
    sqlx::query_as::<_, ForumPost>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<ForumQuery>,
) -> AppResult<Json<Value>> {
    let paging = Paging::new(params.page, params.per_page);

    let mut conditions = vec!["f.parent_id IS NULL".to_string()];
    let mut binds: Vec<String> = Vec::new();
    if let Some(category) = sanitize::optional(params.category.as_deref()) {
        conditions.push("lower(f.category) = lower(?)".to_string());
        binds.push(category);
    }
    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM forum_posts f {where_sql}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &binds {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(&state.db).await?;

    let data_sql = format!(
        "{} {where_sql} ORDER BY f.created_at DESC, f.id LIMIT ? OFFSET ?",
        ForumPost::SELECT
    );
    let mut data_query = sqlx::query_as::<_, ForumPost>(&data_sql);
    for b in &binds {
        data_query = data_query.bind(b);
    }
    let rows = data_query
        .bind(paging.per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    let data = rows.iter().map(ForumPost::to_json).collect();
    Ok(Json(paging.envelope(data, total)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::PostForum)?;

    let title = sanitize::required("Title", &req.title, MAX_TITLE, false)?;
    let content = sanitize::required("Content", &req.content, MAX_CONTENT, true)?;
    let category = sanitize::optional(req.category.as_deref());

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO forum_posts (id, author_id, parent_id, title, content, category, created_at, updated_at)
         VALUES (?, ?, NULL, ?, ?, ?, ?, ?)"
    )
    .bind(&id)
    .bind(auth.id())
    .bind(&title)
    .bind(&content)
    .bind(&category)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let post = fetch_post(&state.db, &id).await?;
    Ok(Json(post.to_json()))
}

/// A thread with its replies, oldest first.
pub async fn get(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let post = fetch_post(&state.db, &id).await?;

    let sql = format!("{} WHERE f.parent_id = ? ORDER BY f.created_at ASC, f.id", ForumPost::SELECT);
    let replies: Vec<ForumPost> = sqlx::query_as(&sql)
        .bind(&id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({
        "post": post.to_json(),
        "replies": replies.iter().map(ForumPost::to_json).collect::<Vec<_>>(),
    })))
}

pub async fn reply(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CreateReplyRequest>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::PostForum)?;

    let parent = fetch_post(&state.db, &id).await?;
    if parent.parent_id.is_some() {
        return Err(AppError::Validation("Replies can only be added to top-level posts".to_string()));
    }

    let content = sanitize::required("Content", &req.content, MAX_CONTENT, true)?;
    let reply_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO forum_posts (id, author_id, parent_id, title, content, category, created_at, updated_at)
         VALUES (?, ?, ?, NULL, ?, ?, ?, ?)"
    )
    .bind(&reply_id)
    .bind(auth.id())
    .bind(&parent.id)
    .bind(&content)
    .bind(&parent.category)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let post = fetch_post(&state.db, &reply_id).await?;
    Ok(Json(post.to_json()))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<Value>> {
    let existing = fetch_post(&state.db, &id).await?;
    require_owner(&auth, &existing.author_id)?;

    let is_reply = existing.parent_id.is_some();
    let title = match req.title {
        Some(_) if is_reply => {
            return Err(AppError::Validation("Replies do not have a title".to_string()));
        }
        Some(t) => Some(sanitize::required("Title", &t, MAX_TITLE, false)?),
        None => existing.title,
    };
    let content = match req.content {
        Some(c) => sanitize::required("Content", &c, MAX_CONTENT, true)?,
        None => existing.content,
    };
    let category = match req.category {
        Some(c) => sanitize::optional(Some(&c)),
        None => existing.category,
    };

    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE forum_posts SET title = ?, content = ?, category = ?, updated_at = ? WHERE id = ?")
        .bind(&title)
        .bind(&content)
        .bind(&category)
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await?;

    if auth.id() != existing.author_id {
        audit::log_action(state.db.clone(), &auth.0, "update", "forum_post", Some(id.clone()), None, ip);
    }

    let post = fetch_post(&state.db, &id).await?;
    Ok(Json(post.to_json()))
}

/// Delete a post; deleting a thread removes its replies too.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let existing = fetch_post(&state.db, &id).await?;
    require_owner(&auth, &existing.author_id)?;

    let mut tx = state.db.begin().await?;
    let replies = sqlx::query("DELETE FROM forum_posts WHERE parent_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM forum_posts WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    if auth.id() != existing.author_id {
        audit::log_action(
            state.db.clone(),
            &auth.0,
            "delete",
            "forum_post",
            Some(id.clone()),
            Some(format!("{} replies removed", replies)),
            ip,
        );
    }

    Ok(Json(json!({"success": true, "replies_deleted": replies})))
}
