use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::nullable;

/// Listing status value that makes a listing visible to job seekers.
pub const STATUS_ACTIVE: &str = "active";
/// Status forced onto a listing when it is soft-deleted.
pub const STATUS_INACTIVE: &str = "inactive";
pub const DEFAULT_SALARY_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "remote_type", rename_all = "snake_case")]
pub enum RemoteType {
    #[default]
    None,
    FullyRemote,
    Hybrid,
    Flexible,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobListing {
    pub id: i64,
    pub employer_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub salary_period: Option<String>,
    pub remote_type: RemoteType,
    pub posted_date: DateTime<Utc>,
    pub deadline_date: Option<DateTime<Utc>>,
    pub status: String,
    pub views_count: i64,
    pub applications_count: i64,
    pub is_featured: bool,
    pub department: Option<String>,
    pub employment_type: Option<String>,
    pub work_schedule: Option<String>,
    pub hiring_manager_id: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl JobListing {
    /// Live listings are the only ones job seekers can find or apply to.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none() && self.status == STATUS_ACTIVE
    }
}

/// Employer-supplied fields for a new listing. Counters, ownership and the
/// soft-delete marker are never caller-controlled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListingDraft {
    pub category_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub posted_date: Option<DateTime<Utc>>,
    pub deadline_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub is_featured: Option<bool>,
    pub department: Option<String>,
    pub employment_type: Option<String>,
    pub work_schedule: Option<String>,
    pub hiring_manager_id: Option<i64>,
}

/// A fully resolved listing ready for insertion (defaults applied).
#[derive(Debug, Clone)]
pub struct NewJobListing {
    pub employer_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub salary_period: Option<String>,
    pub remote_type: RemoteType,
    pub posted_date: DateTime<Utc>,
    pub deadline_date: Option<DateTime<Utc>>,
    pub status: String,
    pub is_featured: bool,
    pub department: Option<String>,
    pub employment_type: Option<String>,
    pub work_schedule: Option<String>,
    pub hiring_manager_id: Option<i64>,
}

impl NewJobListing {
    pub fn from_draft(employer_id: i64, draft: JobListingDraft, now: DateTime<Utc>) -> Self {
        NewJobListing {
            employer_id,
            category_id: draft.category_id,
            title: draft.title,
            description: draft.description,
            requirements: draft.requirements,
            responsibilities: draft.responsibilities,
            benefits: draft.benefits,
            location: draft.location,
            job_type: draft.job_type,
            experience_level: draft.experience_level,
            education_level: draft.education_level,
            salary_min: draft.salary_min,
            salary_max: draft.salary_max,
            salary_currency: draft
                .salary_currency
                .unwrap_or_else(|| DEFAULT_SALARY_CURRENCY.to_string()),
            salary_period: draft.salary_period,
            remote_type: draft.remote_type.unwrap_or_default(),
            posted_date: draft.posted_date.unwrap_or(now),
            deadline_date: draft.deadline_date,
            status: draft.status.unwrap_or_else(|| STATUS_ACTIVE.to_string()),
            is_featured: draft.is_featured.unwrap_or(false),
            department: draft.department,
            employment_type: draft.employment_type,
            work_schedule: draft.work_schedule,
            hiring_manager_id: draft.hiring_manager_id,
        }
    }

    /// Materialises the row the store will hold, counters at zero.
    pub fn into_listing(self, id: i64) -> JobListing {
        JobListing {
            id,
            employer_id: self.employer_id,
            category_id: self.category_id,
            title: self.title,
            description: self.description,
            requirements: self.requirements,
            responsibilities: self.responsibilities,
            benefits: self.benefits,
            location: self.location,
            job_type: self.job_type,
            experience_level: self.experience_level,
            education_level: self.education_level,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            salary_currency: self.salary_currency,
            salary_period: self.salary_period,
            remote_type: self.remote_type,
            posted_date: self.posted_date,
            deadline_date: self.deadline_date,
            status: self.status,
            views_count: 0,
            applications_count: 0,
            is_featured: self.is_featured,
            department: self.department,
            employment_type: self.employment_type,
            work_schedule: self.work_schedule,
            hiring_manager_id: self.hiring_manager_id,
            deleted_at: None,
        }
    }
}

/// Partial update. `None` leaves the stored value untouched; on nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListingPatch {
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i64>>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub requirements: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub responsibilities: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub benefits: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub job_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub experience_level: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub education_level: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub salary_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub salary_max: Option<Option<f64>>,
    pub salary_currency: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub salary_period: Option<Option<String>>,
    pub remote_type: Option<RemoteType>,
    #[serde(default, deserialize_with = "nullable")]
    pub deadline_date: Option<Option<DateTime<Utc>>>,
    pub status: Option<String>,
    pub is_featured: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub department: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub employment_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub work_schedule: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub hiring_manager_id: Option<Option<i64>>,
}

impl JobListingPatch {
    pub fn apply_to(&self, listing: &mut JobListing) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(v) = &self.$field {
                        listing.$field = v.clone();
                    }
                )*
            };
        }

        set!(
            category_id,
            title,
            description,
            requirements,
            responsibilities,
            benefits,
            location,
            job_type,
            experience_level,
            education_level,
            salary_min,
            salary_max,
            salary_currency,
            salary_period,
            remote_type,
            deadline_date,
            status,
            is_featured,
            department,
            employment_type,
            work_schedule,
            hiring_manager_id,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> JobListing {
        let draft = JobListingDraft {
            title: "Backend".into(),
            description: "APIs".into(),
            salary_max: Some(90_000.0),
            location: Some("Berlin".into()),
            ..Default::default()
        };
        NewJobListing::from_draft(1, draft, Utc::now()).into_listing(1)
    }

    #[test]
    fn test_patch_null_clears_nullable_columns() {
        let mut listing = listing();
        listing.deadline_date = Some(Utc::now());
        let patch: JobListingPatch =
            serde_json::from_str(r#"{"salary_max": null, "deadline_date": null}"#).unwrap();
        patch.apply_to(&mut listing);
        assert_eq!(listing.salary_max, None);
        assert_eq!(listing.deadline_date, None);
        assert_eq!(listing.location.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_patch_absent_fields_are_untouched() {
        let mut listing = listing();
        let patch: JobListingPatch = serde_json::from_str(r#"{"title": "Platform"}"#).unwrap();
        patch.apply_to(&mut listing);
        assert_eq!(listing.title, "Platform");
        assert_eq!(listing.salary_max, Some(90_000.0));
        assert_eq!(listing.location.as_deref(), Some("Berlin"));
    }
}
