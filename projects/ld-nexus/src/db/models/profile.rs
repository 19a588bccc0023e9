use serde::Deserialize;
use serde_json::{json, Value};

use super::decode_list;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfessionalProfile {
    pub user_id: String,
    pub name: String,
    pub headline: String,
    pub bio: String,
    pub skills: String,           // JSON array
    pub expertise_areas: String,  // JSON array
    pub hourly_rate: Option<f64>,
    pub years_experience: Option<i64>,
    pub location: Option<String>,
    pub availability: Option<String>,
    pub portfolio_url: Option<String>,
    pub updated_at: String,
}

impl ProfessionalProfile {
    /// Join of profiles to users that currently hold the professional role.
    /// Profile rows outlive role changes, so the role check belongs in the join.
    pub const FROM: &'static str =
        "FROM professional_profiles p JOIN users u ON u.id = p.user_id AND u.role = 'professional'";

    pub const SELECT: &'static str =
        "SELECT p.user_id, u.name, p.headline, p.bio, p.skills, p.expertise_areas, p.hourly_rate,
                p.years_experience, p.location, p.availability, p.portfolio_url, p.updated_at
         FROM professional_profiles p JOIN users u ON u.id = p.user_id AND u.role = 'professional'";

    pub fn skill_list(&self) -> Vec<String> {
        decode_list(&self.skills)
    }

    pub fn expertise_list(&self) -> Vec<String> {
        decode_list(&self.expertise_areas)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "user_id": self.user_id,
            "name": self.name,
            "headline": self.headline,
            "bio": self.bio,
            "skills": self.skill_list(),
            "expertise_areas": self.expertise_list(),
            "hourly_rate": self.hourly_rate,
            "years_experience": self.years_experience,
            "location": self.location,
            "availability": self.availability,
            "portfolio_url": self.portfolio_url,
            "updated_at": self.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanyProfile {
    pub user_id: String,
    pub company_name: String,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub website: Option<String>,
    pub description: String,
    pub location: Option<String>,
    pub updated_at: String,
}

impl CompanyProfile {
    /// Company profiles of users that currently hold the company role.
    pub const SELECT: &'static str =
        "SELECT c.user_id, c.company_name, c.industry, c.company_size, c.website, c.description,
                c.location, c.updated_at
         FROM company_profiles c JOIN users u ON u.id = c.user_id AND u.role = 'company'";

    pub fn to_json(&self) -> Value {
        json!({
            "user_id": self.user_id,
            "company_name": self.company_name,
            "industry": self.industry,
            "company_size": self.company_size,
            "website": self.website,
            "description": self.description,
            "location": self.location,
            "updated_at": self.updated_at,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfessionalRequest {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub expertise_areas: Option<Vec<String>>,
    pub hourly_rate: Option<f64>,
    pub years_experience: Option<i64>,
    pub location: Option<String>,
    pub availability: Option<String>,
    pub portfolio_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}
