use serde::Deserialize;
use serde_json::{json, Value};

/// A top-level thread (`parent_id` = None) or a reply.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ForumPost {
    pub id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub parent_id: Option<String>,
    pub title: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub reply_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl ForumPost {
    pub const SELECT: &'static str =
        "SELECT f.id, f.author_id, u.name AS author_name, f.parent_id, f.title, f.content,
                f.category,
                (SELECT COUNT(*) FROM forum_posts r WHERE r.parent_id = f.id) AS reply_count,
                f.created_at, f.updated_at
         FROM forum_posts f LEFT JOIN users u ON u.id = f.author_id";

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "author_id": self.author_id,
            "author_name": self.author_name,
            "parent_id": self.parent_id,
            "title": self.title,
            "content": self.content,
            "category": self.category,
            "reply_count": self.reply_count,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReplyRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}
