use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::api::AppState;

pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .to_prometheus_text(state.sessions.active_refresh_tokens());
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
