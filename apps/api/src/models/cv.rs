use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::nullable;

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cv {
    pub id: i64,
    pub job_seeker_id: i64,
    pub template_id: Option<i64>,
    pub title: String,
    /// Opaque reference to externally stored file content.
    pub file_url: String,
    pub is_default: bool,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub version: i32,
    pub language: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvDraft {
    pub template_id: Option<i64>,
    pub title: String,
    pub file_url: String,
    pub is_default: Option<bool>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub language: Option<String>,
    pub is_public: Option<bool>,
}

/// `Some(None)` on a nullable column clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvPatch {
    #[serde(default, deserialize_with = "nullable")]
    pub template_id: Option<Option<i64>>,
    pub title: Option<String>,
    pub file_url: Option<String>,
    pub is_default: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub file_size: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub file_type: Option<Option<String>>,
    pub language: Option<String>,
    pub is_public: Option<bool>,
}

/// Outcome of a CV soft delete: the default flag may have moved to a sibling.
#[derive(Debug, Clone, Serialize)]
pub struct CvDeletion {
    pub deleted_id: i64,
    pub promoted_id: Option<i64>,
}
