//! In-process store backend.
//!
//! All tables sit behind one mutex, so every trait method is a single
//! critical section: the same atomicity the Postgres backend gets from a
//! transaction. Used for tests and for `STORE_BACKEND=memory` local runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    ApplicationScope, ApplicationStore, CvStore, ListingStore, Page, Paged, ProfileDirectory,
    ProfileKind, StoreResult,
};
use crate::cv::rules;
use crate::errors::LifecycleError;
use crate::listings::search::ListingSearch;
use crate::models::application::{Application, ApplicationStatus, NewApplication};
use crate::models::cv::{Cv, CvDeletion, CvDraft, CvPatch};
use crate::models::job_listing::{JobListing, JobListingPatch, NewJobListing, STATUS_INACTIVE};

#[derive(Default)]
struct Tables {
    listings: BTreeMap<i64, JobListing>,
    applications: BTreeMap<i64, Application>,
    cvs: BTreeMap<i64, Cv>,
    job_seekers: HashSet<i64>,
    employers: HashSet<i64>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn live_cv_mut(&mut self, id: i64) -> Option<&mut Cv> {
        self.cvs.get_mut(&id).filter(|cv| cv.deleted_at.is_none())
    }

    fn clear_default_siblings(&mut self, job_seeker_id: i64, except: Option<i64>) {
        for cv in self.cvs.values_mut() {
            if cv.job_seeker_id == job_seeker_id
                && cv.deleted_at.is_none()
                && Some(cv.id) != except
            {
                cv.is_default = false;
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    open_profiles: bool,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every user is treated as having both profiles. Local runs only.
    pub fn with_open_profiles() -> Self {
        Self {
            open_profiles: true,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn register_job_seeker(&self, user_id: i64) {
        self.lock().job_seekers.insert(user_id);
    }

    #[cfg(test)]
    pub fn register_employer(&self, user_id: i64) {
        self.lock().employers.insert(user_id);
    }

    /// Raw row access, soft-deleted rows included.
    #[cfg(test)]
    pub fn listing_row(&self, id: i64) -> Option<JobListing> {
        self.lock().listings.get(&id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Poisoning leaves the tables intact.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProfileDirectory for MemoryStore {
    async fn profile_exists(&self, user_id: i64, kind: ProfileKind) -> StoreResult<bool> {
        if self.open_profiles {
            return Ok(true);
        }
        let tables = self.lock();
        Ok(match kind {
            ProfileKind::JobSeeker => tables.job_seekers.contains(&user_id),
            ProfileKind::Employer => tables.employers.contains(&user_id),
        })
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn insert_listing(&self, new: NewJobListing) -> StoreResult<JobListing> {
        let mut tables = self.lock();
        let id = tables.next_id();
        let listing = new.into_listing(id);
        tables.listings.insert(id, listing.clone());
        Ok(listing)
    }

    async fn get_listing(&self, id: i64) -> StoreResult<Option<JobListing>> {
        Ok(self
            .lock()
            .listings
            .get(&id)
            .filter(|l| l.deleted_at.is_none())
            .cloned())
    }

    async fn listing_owner(&self, id: i64) -> StoreResult<Option<i64>> {
        Ok(self.lock().listings.get(&id).map(|l| l.employer_id))
    }

    async fn update_listing(
        &self,
        id: i64,
        patch: &JobListingPatch,
    ) -> StoreResult<Option<JobListing>> {
        let mut tables = self.lock();
        let Some(listing) = tables
            .listings
            .get_mut(&id)
            .filter(|l| l.deleted_at.is_none())
        else {
            return Ok(None);
        };
        patch.apply_to(listing);
        Ok(Some(listing.clone()))
    }

    async fn soft_delete_listing(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables
            .listings
            .get_mut(&id)
            .filter(|l| l.deleted_at.is_none())
        {
            Some(listing) => {
                listing.deleted_at = Some(now);
                listing.status = STATUS_INACTIVE.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_views(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables
            .listings
            .get_mut(&id)
            .filter(|l| l.deleted_at.is_none())
        {
            Some(listing) => {
                listing.views_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_applications(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.listings.get_mut(&id).filter(|l| l.is_live()) {
            Some(listing) => {
                listing.applications_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search_listings(
        &self,
        filter: &ListingSearch,
        page: Page,
    ) -> StoreResult<Paged<JobListing>> {
        let tables = self.lock();
        let mut hits: Vec<JobListing> = tables
            .listings
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.posted_date
                .cmp(&a.posted_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(Paged {
            total: hits.len() as i64,
            rows: page.slice(&hits),
        })
    }

    async fn featured_listings(&self, limit: i64) -> StoreResult<Vec<JobListing>> {
        let tables = self.lock();
        let mut hits: Vec<JobListing> = tables
            .listings
            .values()
            .filter(|l| l.is_live() && l.is_featured)
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.posted_date
                .cmp(&a.posted_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert_application(&self, new: NewApplication) -> StoreResult<Application> {
        let mut tables = self.lock();

        let live = tables
            .listings
            .get(&new.job_id)
            .is_some_and(JobListing::is_live);
        if !live {
            return Err(LifecycleError::JobNotFound(new.job_id));
        }

        let duplicate = tables.applications.values().any(|a| {
            a.deleted_at.is_none() && a.job_id == new.job_id && a.job_seeker_id == new.job_seeker_id
        });
        if duplicate {
            return Err(LifecycleError::DuplicateApplication {
                job_id: new.job_id,
                job_seeker_id: new.job_seeker_id,
            });
        }

        let cv_id = match new.cv_id {
            Some(cv_id) => {
                let owned = tables.cvs.get(&cv_id).is_some_and(|cv| {
                    cv.deleted_at.is_none() && cv.job_seeker_id == new.job_seeker_id
                });
                if !owned {
                    return Err(LifecycleError::foreign_cv(cv_id));
                }
                Some(cv_id)
            }
            None => tables
                .cvs
                .values()
                .find(|cv| {
                    cv.job_seeker_id == new.job_seeker_id
                        && cv.deleted_at.is_none()
                        && cv.is_default
                })
                .map(|cv| cv.id),
        };

        let id = tables.next_id();
        let application = NewApplication { cv_id, ..new }.into_application(id);
        tables.applications.insert(id, application.clone());
        Ok(application)
    }

    async fn get_application(&self, id: i64) -> StoreResult<Option<Application>> {
        Ok(self
            .lock()
            .applications
            .get(&id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn list_applications(
        &self,
        scope: ApplicationScope,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> StoreResult<Paged<Application>> {
        let tables = self.lock();
        let mut hits: Vec<Application> = tables
            .applications
            .values()
            .filter(|a| a.deleted_at.is_none())
            .filter(|a| match scope {
                ApplicationScope::Job(job_id) => a.job_id == job_id,
                ApplicationScope::JobSeeker(seeker) => a.job_seeker_id == seeker,
            })
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.applied_date
                .cmp(&a.applied_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(Paged {
            total: hits.len() as i64,
            rows: page.slice(&hits),
        })
    }

    async fn transition_application(
        &self,
        id: i64,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Application>> {
        let mut tables = self.lock();
        let Some(application) = tables
            .applications
            .get_mut(&id)
            .filter(|a| a.deleted_at.is_none() && a.status == expected)
        else {
            return Ok(None);
        };
        application.status = next;
        if let Some(notes) = notes {
            application.review_notes = Some(notes.to_string());
        }
        application.last_updated = Some(now);
        Ok(Some(application.clone()))
    }

    async fn update_application_details(
        &self,
        id: i64,
        cover_letter: Option<&str>,
        cv_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Application>> {
        let mut tables = self.lock();
        let Some(application) = tables
            .applications
            .get_mut(&id)
            .filter(|a| a.deleted_at.is_none() && a.status == ApplicationStatus::Pending)
        else {
            return Ok(None);
        };
        if let Some(letter) = cover_letter {
            application.cover_letter = Some(letter.to_string());
        }
        if cv_id.is_some() {
            application.cv_id = cv_id;
        }
        application.last_updated = Some(now);
        Ok(Some(application.clone()))
    }

    async fn soft_delete_application(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables
            .applications
            .get_mut(&id)
            .filter(|a| a.deleted_at.is_none())
        {
            Some(application) => {
                application.deleted_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_by_status(&self, job_id: i64) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        let tables = self.lock();
        let mut counts: BTreeMap<ApplicationStatus, i64> = BTreeMap::new();
        for application in tables
            .applications
            .values()
            .filter(|a| a.job_id == job_id && a.deleted_at.is_none())
        {
            *counts.entry(application.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl CvStore for MemoryStore {
    async fn get_cv(&self, id: i64) -> StoreResult<Option<Cv>> {
        Ok(self
            .lock()
            .cvs
            .get(&id)
            .filter(|cv| cv.deleted_at.is_none())
            .cloned())
    }

    async fn get_public_cv(&self, id: i64) -> StoreResult<Option<Cv>> {
        Ok(self
            .lock()
            .cvs
            .get(&id)
            .filter(|cv| cv.deleted_at.is_none() && cv.is_public)
            .cloned())
    }

    async fn list_cvs(&self, job_seeker_id: i64) -> StoreResult<Vec<Cv>> {
        let tables = self.lock();
        let mut cvs: Vec<Cv> = tables
            .cvs
            .values()
            .filter(|cv| cv.job_seeker_id == job_seeker_id && cv.deleted_at.is_none())
            .cloned()
            .collect();
        cvs.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(cvs)
    }

    async fn insert_cv(
        &self,
        job_seeker_id: i64,
        draft: &CvDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Cv> {
        let mut tables = self.lock();
        let live_count = tables
            .cvs
            .values()
            .filter(|cv| cv.job_seeker_id == job_seeker_id && cv.deleted_at.is_none())
            .count();
        let is_default = rules::resolve_initial_default(live_count, draft.is_default);
        if is_default {
            tables.clear_default_siblings(job_seeker_id, None);
        }
        let id = tables.next_id();
        let cv = rules::new_cv(id, job_seeker_id, draft, is_default, now);
        tables.cvs.insert(id, cv.clone());
        Ok(cv)
    }

    async fn update_cv(
        &self,
        id: i64,
        patch: &CvPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Cv>> {
        let mut tables = self.lock();
        let Some(job_seeker_id) = tables.live_cv_mut(id).map(|cv| cv.job_seeker_id) else {
            return Ok(None);
        };
        if patch.is_default == Some(true) {
            tables.clear_default_siblings(job_seeker_id, Some(id));
        }
        let Some(cv) = tables.live_cv_mut(id) else {
            return Ok(None);
        };
        rules::apply_patch(cv, patch, now);
        Ok(Some(cv.clone()))
    }

    async fn soft_delete_cv(&self, id: i64, now: DateTime<Utc>) -> StoreResult<Option<CvDeletion>> {
        let mut tables = self.lock();
        let Some(cv) = tables.live_cv_mut(id) else {
            return Ok(None);
        };
        let was_default = cv.is_default;
        let job_seeker_id = cv.job_seeker_id;
        cv.deleted_at = Some(now);
        cv.is_default = false;

        let promoted_id = if was_default {
            rules::pick_successor(
                tables
                    .cvs
                    .values()
                    .filter(|c| c.job_seeker_id == job_seeker_id && c.id != id),
            )
            .map(|c| c.id)
        } else {
            None
        };
        if let Some(successor) = promoted_id.and_then(|sid| tables.live_cv_mut(sid)) {
            successor.is_default = true;
        }

        Ok(Some(CvDeletion {
            deleted_id: id,
            promoted_id,
        }))
    }

    async fn set_default_cv(&self, id: i64) -> StoreResult<Option<Cv>> {
        let mut tables = self.lock();
        let Some(job_seeker_id) = tables.live_cv_mut(id).map(|cv| cv.job_seeker_id) else {
            return Ok(None);
        };
        tables.clear_default_siblings(job_seeker_id, Some(id));
        let Some(cv) = tables.live_cv_mut(id) else {
            return Ok(None);
        };
        cv.is_default = true;
        Ok(Some(cv.clone()))
    }
}
