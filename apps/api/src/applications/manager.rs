use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::applications::status::validate_transition;
use crate::auth::{Actor, Role};
use crate::errors::LifecycleError;
use crate::listings::ListingManager;
use crate::models::application::{
    Application, ApplicationDetailsPatch, ApplicationDraft, ApplicationStatus, NewApplication,
};
use crate::store::{ApplicationScope, ApplicationStore, CvStore, Page, Paged};

const ENTITY: &str = "Application";

/// Per-status application counts for one listing. Every status is present.
pub type ApplicationStatistics = BTreeMap<ApplicationStatus, i64>;

/// Drives the application status machine and the apply flow.
#[derive(Clone)]
pub struct ApplicationManager {
    store: Arc<dyn ApplicationStore>,
    cvs: Arc<dyn CvStore>,
    listings: ListingManager,
}

impl ApplicationManager {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        cvs: Arc<dyn CvStore>,
        listings: ListingManager,
    ) -> Self {
        Self {
            store,
            cvs,
            listings,
        }
    }

    /// Creates a pending application, then counts it on the listing. Without
    /// an explicit CV the store attaches the applicant's default at insert time.
    pub async fn apply(
        &self,
        actor: &Actor,
        job_id: i64,
        draft: ApplicationDraft,
    ) -> Result<Application, LifecycleError> {
        actor.ensure_role(Role::JobSeeker)?;

        let cv_id = match draft.cv_id {
            Some(cv_id) => Some(self.owned_cv(actor.user_id, cv_id).await?),
            None => None,
        };

        let application = self
            .store
            .insert_application(NewApplication {
                job_id,
                job_seeker_id: actor.user_id,
                cv_id,
                cover_letter: draft.cover_letter,
                source: draft.source,
                referral_id: draft.referral_id,
                applied_date: Utc::now(),
            })
            .await?;

        info!(
            "Job seeker {} applied to job {} (application {})",
            application.job_seeker_id, application.job_id, application.id
        );

        // The application stands even if the listing went away meanwhile.
        if let Err(err) = self.listings.increment_application_count(job_id).await {
            warn!(
                "Application {} created but job {} was not counted: {}",
                application.id, job_id, err
            );
        }
        Ok(application)
    }

    /// Visible to the applicant and to the employer owning the listing.
    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Application, LifecycleError> {
        let application = self.load(id).await?;
        if !actor.can_act_for(application.job_seeker_id) {
            let owner = self.listings.owner_of(application.job_id).await?;
            actor.ensure_owner(owner)?;
        }
        Ok(application)
    }

    /// Employer-side status change. Withdrawal belongs to the applicant and
    /// goes through [`ApplicationManager::withdraw`].
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: i64,
        next: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<Application, LifecycleError> {
        if next == ApplicationStatus::Withdrawn && !actor.is_admin() {
            return Err(LifecycleError::Forbidden);
        }
        let current = self.load(id).await?;
        let owner = self.listings.owner_of(current.job_id).await?;
        actor.ensure_owner(owner)?;

        self.transition(current, next, notes.as_deref()).await
    }

    pub async fn withdraw(&self, actor: &Actor, id: i64) -> Result<Application, LifecycleError> {
        let current = self.load(id).await?;
        actor.ensure_owner(current.job_seeker_id)?;

        self.transition(current, ApplicationStatus::Withdrawn, None)
            .await
    }

    /// Applicant edits to cover letter or CV, only while still pending.
    pub async fn update_details(
        &self,
        actor: &Actor,
        id: i64,
        patch: ApplicationDetailsPatch,
    ) -> Result<Application, LifecycleError> {
        let current = self.load(id).await?;
        actor.ensure_owner(current.job_seeker_id)?;
        if current.status != ApplicationStatus::Pending {
            return Err(not_pending(current.status));
        }

        let cv_id = match patch.cv_id {
            Some(cv_id) => Some(self.owned_cv(current.job_seeker_id, cv_id).await?),
            None => None,
        };

        match self
            .store
            .update_application_details(id, patch.cover_letter.as_deref(), cv_id, Utc::now())
            .await?
        {
            Some(updated) => Ok(updated),
            None => match self.store.get_application(id).await? {
                Some(latest) => Err(not_pending(latest.status)),
                None => Err(LifecycleError::not_found(ENTITY, id)),
            },
        }
    }

    /// Counters on the listing are left untouched.
    pub async fn soft_delete(&self, actor: &Actor, id: i64) -> Result<bool, LifecycleError> {
        let current = self.load(id).await?;
        actor.ensure_owner(current.job_seeker_id)?;

        let deleted = self.store.soft_delete_application(id, Utc::now()).await?;
        if deleted {
            info!("Application {id} soft-deleted");
        }
        Ok(deleted)
    }

    pub async fn statistics(
        &self,
        actor: &Actor,
        job_id: i64,
    ) -> Result<ApplicationStatistics, LifecycleError> {
        let owner = self.listings.owner_of(job_id).await?;
        actor.ensure_owner(owner)?;

        let mut stats: ApplicationStatistics =
            ApplicationStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for (status, count) in self.store.count_by_status(job_id).await? {
            stats.insert(status, count);
        }
        Ok(stats)
    }

    pub async fn list_for_job(
        &self,
        actor: &Actor,
        job_id: i64,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> Result<Paged<Application>, LifecycleError> {
        let owner = self.listings.owner_of(job_id).await?;
        actor.ensure_owner(owner)?;
        self.store
            .list_applications(ApplicationScope::Job(job_id), status, page)
            .await
    }

    pub async fn list_for_job_seeker(
        &self,
        actor: &Actor,
        job_seeker_id: i64,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> Result<Paged<Application>, LifecycleError> {
        actor.ensure_owner(job_seeker_id)?;
        self.store
            .list_applications(ApplicationScope::JobSeeker(job_seeker_id), status, page)
            .await
    }

    async fn load(&self, id: i64) -> Result<Application, LifecycleError> {
        self.store
            .get_application(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(ENTITY, id))
    }

    async fn owned_cv(&self, job_seeker_id: i64, cv_id: i64) -> Result<i64, LifecycleError> {
        match self.cvs.get_cv(cv_id).await? {
            Some(cv) if cv.job_seeker_id == job_seeker_id => Ok(cv.id),
            _ => Err(LifecycleError::foreign_cv(cv_id)),
        }
    }

    /// Validates against the status read by the caller, then writes with a
    /// compare-and-set so a concurrent transition makes this one fail.
    async fn transition(
        &self,
        current: Application,
        next: ApplicationStatus,
        notes: Option<&str>,
    ) -> Result<Application, LifecycleError> {
        validate_transition(current.status, next)?;

        let updated = self
            .store
            .transition_application(current.id, current.status, next, notes, Utc::now())
            .await?;
        match updated {
            Some(application) => {
                info!(
                    "Application {} moved from {} to {}",
                    application.id, current.status, application.status
                );
                Ok(application)
            }
            None => match self.store.get_application(current.id).await? {
                Some(latest) => {
                    warn!(
                        "Application {} changed concurrently ({} -> {}), refusing {}",
                        current.id, current.status, latest.status, next
                    );
                    Err(LifecycleError::InvalidState {
                        from: latest.status,
                        to: next,
                    })
                }
                None => Err(LifecycleError::not_found(ENTITY, current.id)),
            },
        }
    }
}

fn not_pending(status: ApplicationStatus) -> LifecycleError {
    LifecycleError::validation(format!(
        "Application details can only change while pending (currently {status})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::CvManager;
    use crate::models::cv::CvDraft;
    use crate::models::job_listing::{JobListingDraft, JobListingPatch};
    use crate::store::MemoryStore;
    use ApplicationStatus::*;

    const EMPLOYER: i64 = 1;
    const SEEKER: i64 = 2;

    struct Harness {
        store: Arc<MemoryStore>,
        listings: ListingManager,
        cvs: CvManager,
        applications: ApplicationManager,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        store.register_employer(EMPLOYER);
        store.register_job_seeker(SEEKER);
        let listings = ListingManager::new(store.clone(), store.clone());
        let cvs = CvManager::new(store.clone(), store.clone());
        let applications = ApplicationManager::new(store.clone(), store.clone(), listings.clone());
        Harness {
            store,
            listings,
            cvs,
            applications,
        }
    }

    fn employer() -> Actor {
        Actor::new(EMPLOYER, Role::Employer)
    }

    fn seeker(id: i64) -> Actor {
        Actor::new(id, Role::JobSeeker)
    }

    async fn post_job(h: &Harness) -> i64 {
        let draft = JobListingDraft {
            title: "Backend engineer".into(),
            description: "Own the API".into(),
            ..Default::default()
        };
        h.listings.create(&employer(), draft).await.unwrap().id
    }

    async fn apply(h: &Harness, job_id: i64) -> Application {
        h.applications
            .apply(&seeker(SEEKER), job_id, ApplicationDraft::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_apply_starts_pending_and_counts() {
        let h = harness();
        let job_id = post_job(&h).await;

        let application = apply(&h, job_id).await;
        assert_eq!(application.status, Pending);
        assert_eq!(application.job_seeker_id, SEEKER);
        assert_eq!(h.listings.get(job_id).await.unwrap().applications_count, 1);
    }

    #[tokio::test]
    async fn test_apply_attaches_default_cv() {
        let h = harness();
        let job_id = post_job(&h).await;
        let cv = h
            .cvs
            .create(
                &seeker(SEEKER),
                CvDraft {
                    title: "main".into(),
                    file_url: "s3://cv/main.pdf".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let application = apply(&h, job_id).await;
        assert_eq!(application.cv_id, Some(cv.id));
    }

    #[tokio::test]
    async fn test_default_cv_is_resolved_when_inserting() {
        let h = harness();
        let job_id = post_job(&h).await;
        let first = h
            .cvs
            .create(
                &seeker(SEEKER),
                CvDraft {
                    title: "first".into(),
                    file_url: "s3://cv/first.pdf".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = h
            .cvs
            .create(
                &seeker(SEEKER),
                CvDraft {
                    title: "second".into(),
                    file_url: "s3://cv/second.pdf".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(first.is_default);

        // The default is read at insert time, after the promotion.
        h.cvs.delete(&seeker(SEEKER), first.id).await.unwrap();
        let application = apply(&h, job_id).await;
        assert_eq!(application.cv_id, Some(second.id));
    }

    #[tokio::test]
    async fn test_store_refuses_cv_deleted_before_insert() {
        let h = harness();
        let job_id = post_job(&h).await;
        let cv = h
            .cvs
            .create(
                &seeker(SEEKER),
                CvDraft {
                    title: "main".into(),
                    file_url: "s3://cv/main.pdf".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        h.cvs.delete(&seeker(SEEKER), cv.id).await.unwrap();

        let err = h
            .store
            .insert_application(NewApplication {
                job_id,
                job_seeker_id: SEEKER,
                cv_id: Some(cv.id),
                cover_letter: None,
                source: None,
                referral_id: None,
                applied_date: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
        assert_eq!(h.listings.get(job_id).await.unwrap().applications_count, 0);
    }

    #[tokio::test]
    async fn test_apply_rejects_foreign_cv() {
        let h = harness();
        h.store.register_job_seeker(3);
        let job_id = post_job(&h).await;
        let foreign = h
            .cvs
            .create(
                &seeker(3),
                CvDraft {
                    title: "theirs".into(),
                    file_url: "s3://cv/theirs.pdf".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let draft = ApplicationDraft {
            cv_id: Some(foreign.id),
            ..Default::default()
        };
        let err = h
            .applications
            .apply(&seeker(SEEKER), job_id, draft)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
        assert_eq!(h.listings.get(job_id).await.unwrap().applications_count, 0);
    }

    #[tokio::test]
    async fn test_apply_to_inactive_job_is_job_not_found() {
        let h = harness();
        let job_id = post_job(&h).await;
        let patch = JobListingPatch {
            status: Some("inactive".into()),
            ..Default::default()
        };
        h.listings.update(&employer(), job_id, patch).await.unwrap();

        let err = h
            .applications
            .apply(&seeker(SEEKER), job_id, ApplicationDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::JobNotFound(id) if id == job_id));
        assert_eq!(h.listings.get(job_id).await.unwrap().applications_count, 0);
    }

    #[tokio::test]
    async fn test_apply_to_deleted_job_is_job_not_found() {
        let h = harness();
        let job_id = post_job(&h).await;
        h.listings.soft_delete(&employer(), job_id).await.unwrap();

        let err = h
            .applications
            .apply(&seeker(SEEKER), job_id, ApplicationDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_application_is_refused() {
        let h = harness();
        let job_id = post_job(&h).await;
        apply(&h, job_id).await;

        let err = h
            .applications
            .apply(&seeker(SEEKER), job_id, ApplicationDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateApplication { .. }));
        assert_eq!(h.listings.get(job_id).await.unwrap().applications_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_applies_count_exactly() {
        let h = harness();
        let job_id = post_job(&h).await;
        let seekers: Vec<i64> = (100..140).collect();

        let mut set = tokio::task::JoinSet::new();
        for id in seekers.iter().copied() {
            let applications = h.applications.clone();
            set.spawn(async move {
                applications
                    .apply(&seeker(id), job_id, ApplicationDraft::default())
                    .await
            });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap().unwrap();
        }

        let listing = h.listings.get(job_id).await.unwrap();
        assert_eq!(listing.applications_count, seekers.len() as i64);
    }

    #[tokio::test]
    async fn test_full_hiring_path() {
        let h = harness();
        let job_id = post_job(&h).await;
        let app = apply(&h, job_id).await;

        for next in [Reviewed, Interviewing, Offered, Hired] {
            let updated = h
                .applications
                .update_status(&employer(), app.id, next, Some(format!("to {next}")))
                .await
                .unwrap();
            assert_eq!(updated.status, next);
        }

        let err = h
            .applications
            .update_status(&employer(), app.id, Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidState {
                from: Hired,
                to: Pending
            }
        ));
    }

    #[tokio::test]
    async fn test_skipping_stages_is_invalid() {
        let h = harness();
        let job_id = post_job(&h).await;
        let app = apply(&h, job_id).await;

        let err = h
            .applications
            .update_status(&employer(), app.id, Hired, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_notes_only_edit_keeps_status() {
        let h = harness();
        let job_id = post_job(&h).await;
        let app = apply(&h, job_id).await;

        let updated = h
            .applications
            .update_status(&employer(), app.id, Pending, Some("strong profile".into()))
            .await
            .unwrap();
        assert_eq!(updated.status, Pending);
        assert_eq!(updated.review_notes.as_deref(), Some("strong profile"));
    }

    #[tokio::test]
    async fn test_status_update_requires_listing_owner() {
        let h = harness();
        h.store.register_employer(9);
        let job_id = post_job(&h).await;
        let app = apply(&h, job_id).await;

        let other = Actor::new(9, Role::Employer);
        let err = h
            .applications
            .update_status(&other, app.id, Reviewed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden));

        let err = h
            .applications
            .update_status(&employer(), app.id, Withdrawn, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden));
    }

    #[tokio::test]
    async fn test_withdraw_then_frozen() {
        let h = harness();
        let job_id = post_job(&h).await;
        let app = apply(&h, job_id).await;

        let withdrawn = h
            .applications
            .withdraw(&seeker(SEEKER), app.id)
            .await
            .unwrap();
        assert_eq!(withdrawn.status, Withdrawn);

        let err = h
            .applications
            .withdraw(&seeker(SEEKER), app.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState { .. }));

        let err = h
            .applications
            .withdraw(&seeker(77), app.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden));
    }

    #[tokio::test]
    async fn test_racing_transitions_only_one_wins() {
        let h = harness();
        let job_id = post_job(&h).await;
        let id = apply(&h, job_id).await.id;

        let reject = {
            let applications = h.applications.clone();
            tokio::spawn(async move {
                applications
                    .update_status(&employer(), id, Rejected, None)
                    .await
            })
        };
        let withdraw = {
            let applications = h.applications.clone();
            tokio::spawn(async move { applications.withdraw(&seeker(SEEKER), id).await })
        };
        let results = [reject.await.unwrap(), withdraw.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let final_status = h.applications.get(&employer(), id).await.unwrap().status;
        assert!(matches!(final_status, Rejected | Withdrawn));
    }

    #[tokio::test]
    async fn test_statistics_include_every_status() {
        let h = harness();
        let job_id = post_job(&h).await;

        let empty = h.applications.statistics(&employer(), job_id).await.unwrap();
        assert_eq!(empty.len(), ApplicationStatus::ALL.len());
        assert!(empty.values().all(|count| *count == 0));

        let app = apply(&h, job_id).await;
        h.applications
            .update_status(&employer(), app.id, Reviewed, None)
            .await
            .unwrap();
        let stats = h.applications.statistics(&employer(), job_id).await.unwrap();
        assert_eq!(stats[&Reviewed], 1);
        assert_eq!(stats[&Pending], 0);
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_counter_and_hides_from_lists() {
        let h = harness();
        let job_id = post_job(&h).await;
        let app = apply(&h, job_id).await;

        assert!(h
            .applications
            .soft_delete(&seeker(SEEKER), app.id)
            .await
            .unwrap());

        let mine = h
            .applications
            .list_for_job_seeker(&seeker(SEEKER), SEEKER, None, Page::new(0, 10))
            .await
            .unwrap();
        assert_eq!(mine.total, 0);
        assert_eq!(h.listings.get(job_id).await.unwrap().applications_count, 1);
        let stats = h.applications.statistics(&employer(), job_id).await.unwrap();
        assert_eq!(stats[&Pending], 0);
    }

    #[tokio::test]
    async fn test_list_for_job_filters_by_status() {
        let h = harness();
        h.store.register_job_seeker(3);
        let job_id = post_job(&h).await;
        let first = apply(&h, job_id).await;
        h.applications
            .apply(&seeker(3), job_id, ApplicationDraft::default())
            .await
            .unwrap();
        h.applications
            .update_status(&employer(), first.id, Rejected, None)
            .await
            .unwrap();

        let rejected = h
            .applications
            .list_for_job(&employer(), job_id, Some(Rejected), Page::new(0, 10))
            .await
            .unwrap();
        assert_eq!(rejected.total, 1);
        assert_eq!(rejected.rows[0].id, first.id);

        let all = h
            .applications
            .list_for_job(&employer(), job_id, None, Page::new(0, 1))
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_update_details_only_while_pending() {
        let h = harness();
        let job_id = post_job(&h).await;
        let app = apply(&h, job_id).await;

        let patch = ApplicationDetailsPatch {
            cover_letter: Some("Updated letter".into()),
            cv_id: None,
        };
        let updated = h
            .applications
            .update_details(&seeker(SEEKER), app.id, patch.clone())
            .await
            .unwrap();
        assert_eq!(updated.cover_letter.as_deref(), Some("Updated letter"));

        h.applications
            .update_status(&employer(), app.id, Reviewed, None)
            .await
            .unwrap();
        let err = h
            .applications
            .update_details(&seeker(SEEKER), app.id, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }
}
