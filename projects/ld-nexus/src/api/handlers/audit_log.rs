use axum::{extract::{Query, State}, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::AppState;
use crate::api::middleware::rbac::AdminUser;
use crate::api::pagination::{where_clause, Paging};
use crate::db::audit::AuditEntry;
use crate::error::{AppError, AppResult};

#[derive(Deserialize)]
pub struct AuditLogParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    /// RFC 3339 lower bound on `time`
    pub since: Option<String>,
}

/// Admin actions, newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<Value>> {
    let paging = Paging::new(params.page, params.per_page);

    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    for (column, value) in [
        ("user_id", params.user_id),
        ("action", params.action),
        ("resource", params.resource),
    ] {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            conditions.push(format!("{column} = ?"));
            binds.push(v);
        }
    }
    if let Some(since) = params.since.filter(|s| !s.is_empty()) {
        let since = DateTime::parse_from_rfc3339(&since)
            .map_err(|_| AppError::Validation(format!("Invalid since '{}': expected RFC 3339", since)))?;
        conditions.push("time >= ?".to_string());
        binds.push(since.with_timezone(&Utc).to_rfc3339());
    }
    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM audit_log {where_sql}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &binds {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(&state.db).await?;

    let data_sql = format!(
        "SELECT {} FROM audit_log {where_sql} ORDER BY time DESC, id DESC LIMIT ? OFFSET ?",
        AuditEntry::COLUMNS
    );
    let mut data_query = sqlx::query_as::<_, AuditEntry>(&data_sql);
    for b in &binds {
        data_query = data_query.bind(b);
    }
    let rows = data_query
        .bind(paging.per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    let data = rows.iter().map(AuditEntry::to_json).collect();
    Ok(Json(paging.envelope(data, total)))
}
