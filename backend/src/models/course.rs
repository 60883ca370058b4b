use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub subject: String,
    pub class: String,
    pub description: String,
    pub tags: Json<Vec<String>>,
    pub is_free: bool,
    /// Minor currency units; zero for free courses.
    pub price: i64,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub subject: String,
    pub class: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub price: i64,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    pub subject: Option<String>,
    pub class: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_free: Option<bool>,
    pub price: Option<i64>,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilter {
    pub class: Option<String>,
    pub subject: Option<String>,
    pub search: Option<String>,
    pub is_free: Option<bool>,
}
