use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::handlers::jobs::fetch_job;
use crate::api::handlers::profiles::fetch_professional;
use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rbac::{require, require_owner};
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::models::job::JobPosting;
use crate::db::models::profile::ProfessionalProfile;
use crate::error::{AppError, AppResult};
use crate::matching::{self, MatchScore, Scored, DEFAULT_LIMIT, MAX_LIMIT};

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub min_score: Option<u8>,
    pub limit: Option<usize>,
}

impl MatchQuery {
    fn min_score(&self) -> AppResult<u8> {
        match self.min_score {
            Some(s) if s > 100 => Err(AppError::Validation("min_score must be between 0 and 100".to_string())),
            Some(s) => Ok(s),
            None => Ok(0),
        }
    }

    fn limit(&self) -> AppResult<usize> {
        match self.limit {
            Some(n) if n == 0 || n > MAX_LIMIT => Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            ))),
            Some(n) => Ok(n),
            None => Ok(DEFAULT_LIMIT),
        }
    }
}

fn match_json(key: &str, item: Value, score: &MatchScore) -> Value {
    json!({
        key: item,
        "score": score.score,
        "score_display": score.display(),
        "breakdown": {
            "skills": score.skills,
            "expertise": score.expertise,
            "budget": score.budget,
            "location": score.location,
        },
        "matched_skills": score.matched_skills,
        "missing_skills": score.missing_skills,
    })
}

/// Professionals ranked against one job. Job owner or admin only.
pub async fn for_job(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Query(params): Query<MatchQuery>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::ViewJobMatches)?;
    let min_score = params.min_score()?;
    let limit = params.limit()?;

    let job = fetch_job(&state.db, &id).await?;
    require_owner(&auth, &job.company_id)?;

    let sql = format!("{} WHERE u.is_active = 1", ProfessionalProfile::SELECT);
    let professionals: Vec<ProfessionalProfile> = sqlx::query_as(&sql).fetch_all(&state.db).await?;
    let candidates = professionals.len();

    let scored = professionals
        .into_iter()
        .map(|pro| Scored {
            id: pro.user_id.clone(),
            score: matching::score(&job, &pro),
            item: pro,
        })
        .collect();
    let ranked = matching::rank(scored, min_score, limit);

    tracing::debug!("Job {}: {} of {} professionals matched", job.id, ranked.len(), candidates);

    let data: Vec<Value> = ranked
        .iter()
        .map(|s| match_json("professional", s.item.to_json(), &s.score))
        .collect();

    Ok(Json(json!({
        "job": job.to_json(),
        "data": data,
        "total": data.len(),
    })))
}

/// Open jobs ranked for the calling professional.
pub async fn for_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<MatchQuery>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::ViewRecommendedJobs)?;
    let min_score = params.min_score()?;
    let limit = params.limit()?;

    let profile = fetch_professional(&state.db, auth.id())
        .await?
        .ok_or_else(|| AppError::NotFound("Professional profile not found".to_string()))?;

    let sql = format!("{} WHERE j.status = 'open'", JobPosting::SELECT);
    let jobs: Vec<JobPosting> = sqlx::query_as(&sql).fetch_all(&state.db).await?;

    let scored = jobs
        .into_iter()
        .map(|job| Scored {
            id: job.id.clone(),
            score: matching::score(&job, &profile),
            item: job,
        })
        .collect();
    let ranked = matching::rank(scored, min_score, limit);

    let data: Vec<Value> = ranked
        .iter()
        .map(|s| match_json("job", s.item.to_json(), &s.score))
        .collect();

    Ok(Json(json!({
        "data": data,
        "total": data.len(),
    })))
}
