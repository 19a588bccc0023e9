use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::handlers::auth::fetch_user;
use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rbac::require;
use crate::api::pagination::{like_pattern, where_clause, Paging};
use crate::api::sanitize;
use crate::api::validators::{UrlValidator, Validator};
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::models::encode_list;
use crate::db::models::profile::{
    CompanyProfile, ProfessionalProfile, UpdateCompanyRequest, UpdateProfessionalRequest,
};
use crate::db::models::user::User;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

const MAX_HOURLY_RATE: f64 = 10_000.0;

#[derive(Debug, Deserialize)]
pub struct ProfessionalQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub skill: Option<String>,
    pub location: Option<String>,
    pub q: Option<String>,
}

pub(crate) async fn fetch_professional(db: &DbPool, user_id: &str) -> AppResult<Option<ProfessionalProfile>> {
    let sql = format!("{} WHERE p.user_id = ?", ProfessionalProfile::SELECT);
    Ok(sqlx::query_as::<_, ProfessionalProfile>(&sql)
        .bind(user_id)
        .fetch_optional(db)
        .await?)
}

async fn fetch_company(db: &DbPool, user_id: &str) -> AppResult<Option<CompanyProfile>> {
    let sql = format!("{} WHERE c.user_id = ?", CompanyProfile::SELECT);
    Ok(sqlx::query_as::<_, CompanyProfile>(&sql)
        .bind(user_id)
        .fetch_optional(db)
        .await?)
}

/// The role-specific profile of `user`, or `null` for admins.
pub(crate) async fn load_profile_json(db: &DbPool, user: &User) -> AppResult<Value> {
    let profile = match user.role.as_str() {
        "professional" => fetch_professional(db, &user.id).await?.map(|p| p.to_json()),
        "company" => fetch_company(db, &user.id).await?.map(|c| c.to_json()),
        _ => None,
    };
    Ok(profile.unwrap_or(Value::Null))
}

fn optional_url(raw: Option<String>) -> AppResult<Option<String>> {
    match sanitize::optional(raw.as_deref()) {
        Some(url) => {
            UrlValidator::new().validate(&url)?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

fn optional_line(field: &str, raw: Option<String>, max: usize) -> AppResult<Option<String>> {
    let value = sanitize::optional(raw.as_deref());
    if let Some(ref v) = value {
        sanitize::check_len(field, v, max)?;
    }
    Ok(value)
}

pub async fn get_own(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> AppResult<Json<Value>> {
    let user = fetch_user(&state.db, auth.id())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let profile = load_profile_json(&state.db, &user).await?;
    if profile.is_null() {
        return Err(AppError::NotFound("No marketplace profile for this account".to_string()));
    }
    Ok(Json(profile))
}

/// Update the caller's own profile. Accepted fields depend on the caller's role.
pub async fn update_own(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::EditOwnProfile)?;

    match auth.role() {
        "professional" => {
            let req: UpdateProfessionalRequest = serde_json::from_value(body)
                .map_err(|e| AppError::Validation(format!("Invalid profile: {}", e)))?;
            update_professional(&state.db, auth.id(), req).await.map(Json)
        }
        "company" => {
            let req: UpdateCompanyRequest = serde_json::from_value(body)
                .map_err(|e| AppError::Validation(format!("Invalid profile: {}", e)))?;
            update_company(&state.db, auth.id(), req).await.map(Json)
        }
        _ => Err(AppError::NotFound("No marketplace profile for this account".to_string())),
    }
}

async fn update_name(db: &DbPool, user_id: &str, name: Option<String>, now: &str) -> AppResult<()> {
    if let Some(raw) = name {
        let name = sanitize::required("Name", &raw, 100, false)?;
        sqlx::query("UPDATE users SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(now)
            .bind(user_id)
            .execute(db)
            .await?;
    }
    Ok(())
}

async fn update_professional(db: &DbPool, user_id: &str, req: UpdateProfessionalRequest) -> AppResult<Value> {
    let existing = fetch_professional(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Professional profile not found".to_string()))?;

    let headline = match req.headline {
        Some(h) => {
            let h = sanitize::line(&h);
            sanitize::check_len("Headline", &h, 160)?;
            h
        }
        None => existing.headline,
    };
    let bio = match req.bio {
        Some(b) => {
            let b = sanitize::text(&b);
            sanitize::check_len("Bio", &b, 5000)?;
            b
        }
        None => existing.bio,
    };
    let skills = req.skills.map(|s| encode_list(&sanitize::list(&s))).unwrap_or(existing.skills);
    let expertise = req
        .expertise_areas
        .map(|s| encode_list(&sanitize::list(&s)))
        .unwrap_or(existing.expertise_areas);

    let hourly_rate = match req.hourly_rate {
        Some(rate) if !(0.0..=MAX_HOURLY_RATE).contains(&rate) || rate.is_nan() => {
            return Err(AppError::Validation(format!(
                "Hourly rate must be between 0 and {}",
                MAX_HOURLY_RATE
            )));
        }
        Some(rate) => Some(rate),
        None => existing.hourly_rate,
    };
    let years_experience = match req.years_experience {
        Some(y) if !(0..=70).contains(&y) => {
            return Err(AppError::Validation("Years of experience must be between 0 and 70".to_string()));
        }
        Some(y) => Some(y),
        None => existing.years_experience,
    };

    let location = match req.location {
        Some(l) => optional_line("Location", Some(l), 120)?,
        None => existing.location,
    };
    let availability = match req.availability {
        Some(a) => optional_line("Availability", Some(a), 120)?,
        None => existing.availability,
    };
    let portfolio_url = match req.portfolio_url {
        Some(u) => optional_url(Some(u))?,
        None => existing.portfolio_url,
    };

    let now = Utc::now().to_rfc3339();
    update_name(db, user_id, req.name, &now).await?;

    sqlx::query(
        "UPDATE professional_profiles
         SET headline = ?, bio = ?, skills = ?, expertise_areas = ?, hourly_rate = ?,
             years_experience = ?, location = ?, availability = ?, portfolio_url = ?, updated_at = ?
         WHERE user_id = ?"
    )
    .bind(&headline)
    .bind(&bio)
    .bind(&skills)
    .bind(&expertise)
    .bind(hourly_rate)
    .bind(years_experience)
    .bind(&location)
    .bind(&availability)
    .bind(&portfolio_url)
    .bind(&now)
    .bind(user_id)
    .execute(db)
    .await?;

    let updated = fetch_professional(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Professional profile not found".to_string()))?;
    Ok(updated.to_json())
}

async fn update_company(db: &DbPool, user_id: &str, req: UpdateCompanyRequest) -> AppResult<Value> {
    let existing = fetch_company(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Company profile not found".to_string()))?;

    let company_name = match req.company_name {
        Some(n) => sanitize::required("Company name", &n, 160, false)?,
        None => existing.company_name,
    };
    let description = match req.description {
        Some(d) => {
            let d = sanitize::text(&d);
            sanitize::check_len("Description", &d, 5000)?;
            d
        }
        None => existing.description,
    };
    let industry = match req.industry {
        Some(i) => optional_line("Industry", Some(i), 120)?,
        None => existing.industry,
    };
    let company_size = match req.company_size {
        Some(s) => optional_line("Company size", Some(s), 40)?,
        None => existing.company_size,
    };
    let website = match req.website {
        Some(w) => optional_url(Some(w))?,
        None => existing.website,
    };
    let location = match req.location {
        Some(l) => optional_line("Location", Some(l), 120)?,
        None => existing.location,
    };

    let now = Utc::now().to_rfc3339();
    update_name(db, user_id, req.name, &now).await?;

    sqlx::query(
        "UPDATE company_profiles
         SET company_name = ?, industry = ?, company_size = ?, website = ?, description = ?,
             location = ?, updated_at = ?
         WHERE user_id = ?"
    )
    .bind(&company_name)
    .bind(&industry)
    .bind(&company_size)
    .bind(&website)
    .bind(&description)
    .bind(&location)
    .bind(&now)
    .bind(user_id)
    .execute(db)
    .await?;

    let updated = fetch_company(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Company profile not found".to_string()))?;
    Ok(updated.to_json())
}

pub async fn list_professionals(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<ProfessionalQuery>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::BrowseMarketplace)?;
    let paging = Paging::new(params.page, params.per_page);

    let mut conditions = vec!["u.is_active = 1".to_string()];
    let mut binds: Vec<String> = Vec::new();

    if let Some(skill) = sanitize::optional(params.skill.as_deref()) {
        conditions.push(
            "EXISTS (SELECT 1 FROM json_each(p.skills) s WHERE lower(s.value) = lower(?))".to_string(),
        );
        binds.push(skill);
    }
    if let Some(location) = sanitize::optional(params.location.as_deref()) {
        conditions.push("p.location LIKE ? ESCAPE '\\'".to_string());
        binds.push(like_pattern(&location));
    }
    if let Some(q) = sanitize::optional(params.q.as_deref()) {
        conditions.push(
            "(u.name LIKE ? ESCAPE '\\' OR p.headline LIKE ? ESCAPE '\\' OR p.bio LIKE ? ESCAPE '\\')".to_string(),
        );
        let pattern = like_pattern(&q);
        binds.extend([pattern.clone(), pattern.clone(), pattern]);
    }

    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) {} {where_sql}", ProfessionalProfile::FROM);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &binds {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(&state.db).await?;

    let data_sql = format!(
        "{} {where_sql} ORDER BY p.updated_at DESC LIMIT ? OFFSET ?",
        ProfessionalProfile::SELECT
    );
    let mut data_query = sqlx::query_as::<_, ProfessionalProfile>(&data_sql);
    for b in &binds {
        data_query = data_query.bind(b);
    }
    let rows = data_query
        .bind(paging.per_page)
        .bind(paging.offset())
        .fetch_all(&state.db)
        .await?;

    let data = rows.iter().map(ProfessionalProfile::to_json).collect();
    Ok(Json(paging.envelope(data, total)))
}

pub async fn get_professional(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::BrowseMarketplace)?;
    let profile = fetch_professional(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Professional {} not found", id)))?;
    Ok(Json(profile.to_json()))
}

pub async fn get_company(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require(&auth, Permission::BrowseMarketplace)?;
    let company = fetch_company(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {} not found", id)))?;

    let (open_jobs,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM job_postings WHERE company_id = ? AND status = 'open'"
    )
    .bind(&id)
    .fetch_one(&state.db)
    .await?;

    let mut body = company.to_json();
    body["open_jobs"] = json!(open_jobs);
    Ok(Json(body))
}
