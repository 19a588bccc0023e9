use serde::Deserialize;
use serde_json::{json, Value};

use super::decode_list;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Resource {
    pub id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub resource_type: String,
    pub url: Option<String>,
    pub tags: String,  // JSON array
    pub created_at: String,
    pub updated_at: String,
}

impl Resource {
    pub const SELECT: &'static str =
        "SELECT r.id, r.author_id, u.name AS author_name, r.title, r.description, r.category,
                r.resource_type, r.url, r.tags, r.created_at, r.updated_at
         FROM resources r LEFT JOIN users u ON u.id = r.author_id";

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "author_id": self.author_id,
            "author_name": self.author_name,
            "title": self.title,
            "description": self.description,
            "category": self.category,
            "type": self.resource_type,
            "url": self.url,
            "tags": decode_list(&self.tags),
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

pub const RESOURCE_TYPES: &[&str] = &["article", "video", "course", "template", "toolkit", "podcast", "other"];

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResourceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub url: Option<String>,
    pub tags: Option<Vec<String>>,
}
