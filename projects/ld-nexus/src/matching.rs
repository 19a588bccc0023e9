//! Job ↔ professional match scoring.
//!
//! A score is a weighted sum of four components, each in `0.0..=1.0`:
//!
//! | component | weight | rule |
//! |-----------|--------|------|
//! | skills    | 0.6    | share of required skills the professional lists |
//! | expertise | 0.2    | job category is one of the expertise areas |
//! | budget    | 0.1    | hourly rate within the job's maximum budget |
//! | location  | 0.1    | remote job, or same location |
//!
//! Unknown inputs score a neutral 0.5 rather than zero.

use serde::Serialize;
use std::collections::HashSet;

use crate::db::models::job::JobPosting;
use crate::db::models::profile::ProfessionalProfile;

const W_SKILLS: f64 = 0.6;
const W_EXPERTISE: f64 = 0.2;
const W_BUDGET: f64 = 0.1;
const W_LOCATION: f64 = 0.1;
const NEUTRAL: f64 = 0.5;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct MatchScore {
    /// Weighted total as a percentage, 0-100.
    pub score: u8,
    pub skills: f64,
    pub expertise: f64,
    pub budget: f64,
    pub location: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
}

impl MatchScore {
    pub fn display(&self) -> String {
        format_score(self.score)
    }
}

#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub id: String,
    pub item: T,
    pub score: MatchScore,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

pub fn score(job: &JobPosting, pro: &ProfessionalProfile) -> MatchScore {
    let required = job.skill_list();
    let have: HashSet<String> = pro.skill_list().iter().map(|s| normalize(s)).collect();

    let (matched_skills, missing_skills): (Vec<String>, Vec<String>) = required
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .partition(|s| have.contains(&normalize(s)));

    let required_count = matched_skills.len() + missing_skills.len();
    let skills = if required_count == 0 {
        NEUTRAL
    } else {
        matched_skills.len() as f64 / required_count as f64
    };

    let expertise = match job.category.as_deref().map(normalize).filter(|c| !c.is_empty()) {
        None => NEUTRAL,
        Some(category) => {
            if pro.expertise_list().iter().any(|e| normalize(e) == category) { 1.0 } else { 0.0 }
        }
    };

    let budget = budget_fit(pro.hourly_rate, job.budget_max);
    let location = location_fit(job.is_remote(), job.location.as_deref(), pro.location.as_deref());

    let total = skills * W_SKILLS + expertise * W_EXPERTISE + budget * W_BUDGET + location * W_LOCATION;

    MatchScore {
        score: to_percent(total),
        skills,
        expertise,
        budget,
        location,
        matched_skills,
        missing_skills,
    }
}

fn budget_fit(rate: Option<f64>, budget_max: Option<f64>) -> f64 {
    match (rate, budget_max) {
        (Some(rate), Some(max)) if max > 0.0 && rate >= 0.0 => {
            if rate <= max {
                1.0
            } else {
                (1.0 - (rate - max) / max).max(0.0)
            }
        }
        _ => NEUTRAL,
    }
}

fn location_fit(remote: bool, job_location: Option<&str>, pro_location: Option<&str>) -> f64 {
    if remote {
        return 1.0;
    }
    let job_location = job_location.map(normalize).filter(|s| !s.is_empty());
    let pro_location = pro_location.map(normalize).filter(|s| !s.is_empty());
    match (job_location, pro_location) {
        (Some(a), Some(b)) => if a == b { 1.0 } else { 0.0 },
        _ => NEUTRAL,
    }
}

fn to_percent(total: f64) -> u8 {
    (total.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Render a score as shown to users, e.g. `"85%"`.
pub fn format_score(score: u8) -> String {
    format!("{}%", score.min(100))
}

/// Highest score first, ties by id; drop entries under `min_score`; keep `limit`.
pub fn rank<T>(mut scored: Vec<Scored<T>>, min_score: u8, limit: usize) -> Vec<Scored<T>> {
    scored.retain(|s| s.score.score >= min_score);
    scored.sort_by(|a, b| {
        b.score.score
            .cmp(&a.score.score)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(limit.clamp(1, MAX_LIMIT));
    scored
}
