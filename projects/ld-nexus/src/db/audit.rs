use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::jwt::Claims;
use crate::db::DbPool;

/// Fire-and-forget: write an audit log entry to the database.
/// Spawns a background task so the caller is never blocked.
pub fn log_action(
    db: DbPool,
    actor: &Claims,
    action: impl Into<String> + Send + 'static,
    resource: impl Into<String> + Send + 'static,
    resource_id: Option<String>,
    detail: Option<String>,
    ip: String,
) {
    let user_id = actor.sub.clone();
    let email = actor.email.clone();
    let action = action.into();
    let resource = resource.into();
    let now = Utc::now().to_rfc3339();

    tokio::spawn(async move {
        let result = sqlx::query(
            "INSERT INTO audit_log (time, user_id, email, action, resource, resource_id, detail, ip)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&now)
        .bind(&user_id)
        .bind(&email)
        .bind(&action)
        .bind(&resource)
        .bind(resource_id.as_deref())
        .bind(detail.as_deref())
        .bind(&ip)
        .execute(&db)
        .await;

        if let Err(e) = result {
            tracing::warn!("Audit log write failed ({} {}): {}", action, resource, e);
        }
    });
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub time: String,
    pub user_id: String,
    pub email: String,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub detail: Option<String>,
    pub ip: String,
}

impl AuditEntry {
    pub const COLUMNS: &'static str = "id, time, user_id, email, action, resource, resource_id, detail, ip";

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "time": self.time,
            "user_id": self.user_id,
            "email": self.email,
            "action": self.action,
            "resource": self.resource,
            "resource_id": self.resource_id,
            "detail": self.detail,
            "ip": self.ip,
        })
    }
}
