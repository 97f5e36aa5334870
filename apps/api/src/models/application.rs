use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Interviewing,
    Offered,
    Hired,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewed,
        ApplicationStatus::Interviewing,
        ApplicationStatus::Offered,
        ApplicationStatus::Hired,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewed => "reviewed",
            ApplicationStatus::Interviewing => "interviewing",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: i64,
    pub job_id: i64,
    pub job_seeker_id: i64,
    pub cv_id: Option<i64>,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub applied_date: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub source: Option<String>,
    pub referral_id: Option<i64>,
    pub match_score: Option<f64>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Job-seeker supplied fields when applying. Status and dates are set by the
/// lifecycle manager, never by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationDraft {
    pub cv_id: Option<i64>,
    pub cover_letter: Option<String>,
    pub source: Option<String>,
    pub referral_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: i64,
    pub job_seeker_id: i64,
    /// Explicit CV; `None` attaches the applicant's default when inserting.
    pub cv_id: Option<i64>,
    pub cover_letter: Option<String>,
    pub source: Option<String>,
    pub referral_id: Option<i64>,
    pub applied_date: DateTime<Utc>,
}

impl NewApplication {
    pub fn into_application(self, id: i64) -> Application {
        Application {
            id,
            job_id: self.job_id,
            job_seeker_id: self.job_seeker_id,
            cv_id: self.cv_id,
            cover_letter: self.cover_letter,
            status: ApplicationStatus::Pending,
            applied_date: self.applied_date,
            last_updated: Some(self.applied_date),
            review_notes: None,
            source: self.source,
            referral_id: self.referral_id,
            match_score: None,
            deleted_at: None,
        }
    }
}

/// Seeker-editable details, only while the application is still pending.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationDetailsPatch {
    pub cover_letter: Option<String>,
    pub cv_id: Option<i64>,
}
