use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::auth::{Actor, Role};
use crate::errors::LifecycleError;
use crate::listings::search::ListingSearch;
use crate::models::job_listing::{JobListing, JobListingDraft, JobListingPatch, NewJobListing};
use crate::store::{ListingStore, Page, Paged, ProfileDirectory, ProfileKind};

/// Upper bound for the featured carousel regardless of what the caller asks for.
pub const MAX_FEATURED: i64 = 50;

const ENTITY: &str = "Job listing";

/// Owns posting, soft delete and the counters of job listings.
#[derive(Clone)]
pub struct ListingManager {
    store: Arc<dyn ListingStore>,
    profiles: Arc<dyn ProfileDirectory>,
}

impl ListingManager {
    pub fn new(store: Arc<dyn ListingStore>, profiles: Arc<dyn ProfileDirectory>) -> Self {
        Self { store, profiles }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        draft: JobListingDraft,
    ) -> Result<JobListing, LifecycleError> {
        actor.ensure_role(Role::Employer)?;
        if !self
            .profiles
            .profile_exists(actor.user_id, ProfileKind::Employer)
            .await?
        {
            return Err(LifecycleError::ProfileNotFound(ProfileKind::Employer.label()));
        }

        let new = NewJobListing::from_draft(actor.user_id, draft, Utc::now());
        validate_content(&new.title, &new.description, new.salary_min, new.salary_max)?;

        let listing = self.store.insert_listing(new).await?;
        info!(
            "Job listing {} posted by employer {} (status {})",
            listing.id, listing.employer_id, listing.status
        );
        Ok(listing)
    }

    /// Any listing that has not been soft-deleted, whatever its status.
    pub async fn get(&self, id: i64) -> Result<JobListing, LifecycleError> {
        self.store
            .get_listing(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(ENTITY, id))
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        patch: JobListingPatch,
    ) -> Result<JobListing, LifecycleError> {
        let current = self.get(id).await?;
        actor.ensure_owner(current.employer_id)?;

        let mut preview = current;
        patch.apply_to(&mut preview);
        validate_content(
            &preview.title,
            &preview.description,
            preview.salary_min,
            preview.salary_max,
        )?;

        let updated = self
            .store
            .update_listing(id, &patch)
            .await?
            .ok_or_else(|| LifecycleError::not_found(ENTITY, id))?;
        info!("Job listing {id} updated");
        Ok(updated)
    }

    /// Hides the listing from every live query. Returns `false` when it was
    /// already deleted.
    pub async fn soft_delete(&self, actor: &Actor, id: i64) -> Result<bool, LifecycleError> {
        let owner = self.owner_of(id).await?;
        actor.ensure_owner(owner)?;

        let deleted = self.store.soft_delete_listing(id, Utc::now()).await?;
        if deleted {
            info!("Job listing {id} soft-deleted by user {}", actor.user_id);
        }
        Ok(deleted)
    }

    pub async fn increment_view_count(&self, id: i64) -> Result<(), LifecycleError> {
        if !self.store.increment_views(id).await? {
            return Err(LifecycleError::not_found(ENTITY, id));
        }
        debug!("Job listing {id} view counted");
        Ok(())
    }

    /// Called once per created application. Inactive or deleted listings are
    /// refused, the same rule apply uses.
    pub async fn increment_application_count(&self, id: i64) -> Result<(), LifecycleError> {
        if !self.store.increment_applications(id).await? {
            return Err(LifecycleError::not_found(ENTITY, id));
        }
        debug!("Job listing {id} application counted");
        Ok(())
    }

    pub async fn search(
        &self,
        filter: ListingSearch,
        page: Page,
    ) -> Result<Paged<JobListing>, LifecycleError> {
        let filter = filter.normalized();
        if let (Some(min), Some(max)) = (filter.salary_min, filter.salary_max) {
            if min > max {
                return Err(LifecycleError::validation(
                    "salary_min filter cannot exceed salary_max",
                ));
            }
        }
        self.store.search_listings(&filter, page).await
    }

    pub async fn featured(&self, limit: i64) -> Result<Vec<JobListing>, LifecycleError> {
        self.store
            .featured_listings(limit.clamp(0, MAX_FEATURED))
            .await
    }

    /// Owning employer of a listing, soft-deleted or not.
    pub async fn owner_of(&self, id: i64) -> Result<i64, LifecycleError> {
        self.store
            .listing_owner(id)
            .await?
            .ok_or(LifecycleError::JobNotFound(id))
    }
}

fn validate_content(
    title: &str,
    description: &str,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
) -> Result<(), LifecycleError> {
    if title.trim().is_empty() {
        return Err(LifecycleError::validation("Job title is required"));
    }
    if description.trim().is_empty() {
        return Err(LifecycleError::validation("Job description is required"));
    }
    if salary_min.is_some_and(|v| v < 0.0) || salary_max.is_some_and(|v| v < 0.0) {
        return Err(LifecycleError::validation("Salary cannot be negative"));
    }
    if let (Some(min), Some(max)) = (salary_min, salary_max) {
        if min > max {
            return Err(LifecycleError::validation(
                "salary_min cannot exceed salary_max",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job_listing::STATUS_INACTIVE;
    use crate::store::MemoryStore;

    const EMPLOYER: i64 = 10;

    fn setup() -> (Arc<MemoryStore>, ListingManager) {
        let store = Arc::new(MemoryStore::new());
        store.register_employer(EMPLOYER);
        let manager = ListingManager::new(store.clone(), store.clone());
        (store, manager)
    }

    fn employer() -> Actor {
        Actor::new(EMPLOYER, Role::Employer)
    }

    fn draft(title: &str) -> JobListingDraft {
        JobListingDraft {
            title: title.to_string(),
            description: "Work on the platform".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (_, manager) = setup();
        let listing = manager.create(&employer(), draft("Backend")).await.unwrap();

        assert_eq!(listing.status, "active");
        assert_eq!(listing.views_count, 0);
        assert_eq!(listing.applications_count, 0);
        assert_eq!(listing.salary_currency, "USD");
        assert!(listing.is_live());
    }

    #[tokio::test]
    async fn test_create_requires_employer_profile() {
        let (_, manager) = setup();
        let stranger = Actor::new(77, Role::Employer);
        let err = manager.create(&stranger, draft("x")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::ProfileNotFound(_)));

        let seeker = Actor::new(EMPLOYER, Role::JobSeeker);
        let err = manager.create(&seeker, draft("x")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden));
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_salary_range() {
        let (_, manager) = setup();
        let mut d = draft("Backend");
        d.salary_min = Some(90_000.0);
        d.salary_max = Some(60_000.0);
        let err = manager.create(&employer(), d).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_only_by_owner() {
        let (store, manager) = setup();
        store.register_employer(11);
        let listing = manager.create(&employer(), draft("Backend")).await.unwrap();

        let patch = JobListingPatch {
            title: Some("Platform engineer".into()),
            ..Default::default()
        };
        let other = Actor::new(11, Role::Employer);
        let err = manager
            .update(&other, listing.id, patch.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden));

        let updated = manager.update(&employer(), listing.id, patch).await.unwrap();
        assert_eq!(updated.title, "Platform engineer");
    }

    #[tokio::test]
    async fn test_soft_deleted_listing_is_hidden_everywhere() {
        let (_, manager) = setup();
        let mut d = draft("Rust engineer");
        d.is_featured = Some(true);
        let listing = manager.create(&employer(), d).await.unwrap();

        assert!(manager.soft_delete(&employer(), listing.id).await.unwrap());
        assert!(!manager.soft_delete(&employer(), listing.id).await.unwrap());

        let filter = ListingSearch {
            keyword: Some("rust".into()),
            employer_id: Some(EMPLOYER),
            ..Default::default()
        };
        let found = manager.search(filter, Page::new(0, 10)).await.unwrap();
        assert_eq!(found.total, 0);
        assert!(found.rows.is_empty());
        assert!(manager.featured(10).await.unwrap().is_empty());

        let err = manager.get(listing.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
        // Ownership survives the delete.
        assert_eq!(manager.owner_of(listing.id).await.unwrap(), EMPLOYER);
    }

    #[tokio::test]
    async fn test_soft_delete_forces_inactive_status() {
        let (store, manager) = setup();
        let listing = manager.create(&employer(), draft("Backend")).await.unwrap();
        manager.soft_delete(&employer(), listing.id).await.unwrap();

        let row = store.listing_row(listing.id).unwrap();
        assert_eq!(row.status, STATUS_INACTIVE);
        assert!(row.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_search_salary_min_scenario() {
        let (_, manager) = setup();
        for salary in [50_000.0, 70_000.0] {
            let mut d = draft(&format!("Job at {salary}"));
            d.salary_min = Some(salary);
            manager.create(&employer(), d).await.unwrap();
        }

        let filter = ListingSearch {
            salary_min: Some(60_000.0),
            ..Default::default()
        };
        let found = manager.search(filter, Page::new(0, 10)).await.unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.rows[0].salary_min, Some(70_000.0));
    }

    #[tokio::test]
    async fn test_featured_is_newest_first_and_capped() {
        let (_, manager) = setup();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut d = draft(&format!("Featured {i}"));
            d.is_featured = Some(true);
            d.posted_date = Some(Utc::now() + chrono::Duration::minutes(i));
            ids.push(manager.create(&employer(), d).await.unwrap().id);
        }
        manager.create(&employer(), draft("Plain")).await.unwrap();

        let featured = manager.featured(2).await.unwrap();
        assert_eq!(featured.len(), 2);
        assert_eq!(featured[0].id, ids[2]);
        assert_eq!(featured[1].id, ids[1]);
    }

    #[tokio::test]
    async fn test_concurrent_view_increments_are_not_lost() {
        let (_, manager) = setup();
        let listing = manager.create(&employer(), draft("Backend")).await.unwrap();

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let manager = manager.clone();
            set.spawn(async move { manager.increment_view_count(listing.id).await });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap().unwrap();
        }

        assert_eq!(manager.get(listing.id).await.unwrap().views_count, 50);
    }

    #[tokio::test]
    async fn test_increment_on_missing_listing_is_not_found() {
        let (_, manager) = setup();
        let err = manager.increment_view_count(404).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
        let err = manager.increment_application_count(404).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_application_count_refuses_inactive_listing() {
        let (_, manager) = setup();
        let listing = manager.create(&employer(), draft("Backend")).await.unwrap();
        manager.increment_application_count(listing.id).await.unwrap();

        let patch = JobListingPatch {
            status: Some(STATUS_INACTIVE.into()),
            ..Default::default()
        };
        manager.update(&employer(), listing.id, patch).await.unwrap();

        let err = manager
            .increment_application_count(listing.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
        assert_eq!(manager.get(listing.id).await.unwrap().applications_count, 1);
    }
}
