use serde::Deserialize;
use serde_json::{json, Value};

use super::decode_list;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobPosting {
    pub id: String,
    pub company_id: String,
    pub company_name: Option<String>,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub required_skills: String,  // JSON array
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub location: Option<String>,
    pub remote: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl JobPosting {
    /// Select list for a `job_postings j LEFT JOIN company_profiles c` query.
    pub const SELECT: &'static str =
        "SELECT j.id, j.company_id, c.company_name, j.title, j.description, j.category,
                j.required_skills, j.budget_min, j.budget_max, j.location, j.remote, j.status,
                j.created_at, j.updated_at
         FROM job_postings j LEFT JOIN company_profiles c ON c.user_id = j.company_id";

    pub fn skill_list(&self) -> Vec<String> {
        decode_list(&self.required_skills)
    }

    pub fn is_remote(&self) -> bool {
        self.remote != 0
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "company_id": self.company_id,
            "company_name": self.company_name,
            "title": self.title,
            "description": self.description,
            "category": self.category,
            "required_skills": self.skill_list(),
            "budget_min": self.budget_min,
            "budget_max": self.budget_max,
            "location": self.location,
            "remote": self.is_remote(),
            "status": self.status,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub location: Option<String>,
    #[serde(default)]
    pub remote: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub required_skills: Option<Vec<String>>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub status: Option<JobStatus>,
}
