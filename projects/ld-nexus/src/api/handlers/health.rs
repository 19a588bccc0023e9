use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::AppState;
use crate::error::AppResult;

pub async fn health_check(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let (one,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(&state.db).await?;
    Ok(Json(json!({
        "status": "ok",
        "database": one == 1,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
