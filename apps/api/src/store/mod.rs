//! Entity Store — transactional persistence for listings, applications and CVs.
//!
//! Every multi-step invariant (clear-then-set default, live-check + CV
//! resolution + insert) is a single trait method so each backend can make it atomic:
//! `PgStore` with one database transaction, `MemoryStore` under one lock.
//! All reads filter out soft-deleted rows unless stated otherwise.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::LifecycleError;
use crate::listings::search::ListingSearch;
use crate::models::application::{Application, ApplicationStatus, NewApplication};
use crate::models::cv::{Cv, CvDeletion, CvDraft, CvPatch};
use crate::models::job_listing::{JobListing, JobListingPatch, NewJobListing};

pub use memory::MemoryStore;
pub use pg::PgStore;

pub type StoreResult<T> = Result<T, LifecycleError>;

// ────────────────────────────────────────────────────────────────────────────
// Pagination
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub take: i64,
}

impl Page {
    pub fn new(skip: i64, take: i64) -> Self {
        Self {
            skip: skip.max(0),
            take: take.max(0),
        }
    }

    /// Applies the window to an already ordered in-memory result.
    pub fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.skip as usize)
            .take(self.take as usize)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub rows: Vec<T>,
    pub total: i64,
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator: profile lookup
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    JobSeeker,
    Employer,
}

impl ProfileKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProfileKind::JobSeeker => "Job seeker",
            ProfileKind::Employer => "Employer",
        }
    }
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profile_exists(&self, user_id: i64, kind: ProfileKind) -> StoreResult<bool>;
}

// ────────────────────────────────────────────────────────────────────────────
// Entity stores
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert_listing(&self, new: NewJobListing) -> StoreResult<JobListing>;

    /// Listing by id regardless of status; `None` once soft-deleted.
    async fn get_listing(&self, id: i64) -> StoreResult<Option<JobListing>>;

    /// Owning employer, including soft-deleted listings.
    async fn listing_owner(&self, id: i64) -> StoreResult<Option<i64>>;

    async fn update_listing(
        &self,
        id: i64,
        patch: &JobListingPatch,
    ) -> StoreResult<Option<JobListing>>;

    /// Sets `deleted_at` and forces status to inactive in one write.
    async fn soft_delete_listing(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool>;

    async fn increment_views(&self, id: i64) -> StoreResult<bool>;

    /// In-place +1 on a live listing only (active, not soft-deleted).
    async fn increment_applications(&self, id: i64) -> StoreResult<bool>;

    async fn search_listings(
        &self,
        filter: &ListingSearch,
        page: Page,
    ) -> StoreResult<Paged<JobListing>>;

    async fn featured_listings(&self, limit: i64) -> StoreResult<Vec<JobListing>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationScope {
    Job(i64),
    JobSeeker(i64),
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Atomically: require a live listing, resolve the CV (an explicit one
    /// must still be a live CV of the applicant, otherwise the current
    /// default is attached) and insert the pending application. Fails with
    /// `JobNotFound`, `Validation` or `DuplicateApplication` without side
    /// effects. Listing counters are left to the listings module.
    async fn insert_application(&self, new: NewApplication) -> StoreResult<Application>;

    async fn get_application(&self, id: i64) -> StoreResult<Option<Application>>;

    async fn list_applications(
        &self,
        scope: ApplicationScope,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> StoreResult<Paged<Application>>;

    /// Compare-and-set on status. `None` when the row is gone or its status is
    /// no longer `expected`.
    async fn transition_application(
        &self,
        id: i64,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Application>>;

    /// Updates seeker details only while the application is still pending.
    async fn update_application_details(
        &self,
        id: i64,
        cover_letter: Option<&str>,
        cv_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Application>>;

    async fn soft_delete_application(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Live application counts grouped by status; statuses with no rows are absent.
    async fn count_by_status(&self, job_id: i64) -> StoreResult<Vec<(ApplicationStatus, i64)>>;
}

#[async_trait]
pub trait CvStore: Send + Sync {
    async fn get_cv(&self, id: i64) -> StoreResult<Option<Cv>>;

    async fn get_public_cv(&self, id: i64) -> StoreResult<Option<Cv>>;

    /// Live CVs for a job seeker, most recently updated first.
    async fn list_cvs(&self, job_seeker_id: i64) -> StoreResult<Vec<Cv>>;

    /// Inserts at version 1, resolving the default flag and clearing siblings
    /// in the same atomic step.
    async fn insert_cv(
        &self,
        job_seeker_id: i64,
        draft: &CvDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Cv>;

    async fn update_cv(&self, id: i64, patch: &CvPatch, now: DateTime<Utc>)
        -> StoreResult<Option<Cv>>;

    /// Soft-deletes and, when the row was default, promotes a successor.
    async fn soft_delete_cv(&self, id: i64, now: DateTime<Utc>) -> StoreResult<Option<CvDeletion>>;

    async fn set_default_cv(&self, id: i64) -> StoreResult<Option<Cv>>;
}

/// Everything a backend must provide to host the lifecycle managers.
pub trait EntityStore: ListingStore + ApplicationStore + CvStore + ProfileDirectory {}

impl<T> EntityStore for T where T: ListingStore + ApplicationStore + CvStore + ProfileDirectory {}
