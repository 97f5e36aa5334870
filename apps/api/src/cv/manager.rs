use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::auth::{Actor, Role};
use crate::errors::LifecycleError;
use crate::models::cv::{Cv, CvDeletion, CvDraft, CvPatch};
use crate::store::{CvStore, ProfileDirectory, ProfileKind};

const ENTITY: &str = "CV";

/// Keeps each job seeker's CV set at one default at most, with versions that
/// only move when the file changes.
#[derive(Clone)]
pub struct CvManager {
    store: Arc<dyn CvStore>,
    profiles: Arc<dyn ProfileDirectory>,
}

impl CvManager {
    pub fn new(store: Arc<dyn CvStore>, profiles: Arc<dyn ProfileDirectory>) -> Self {
        Self { store, profiles }
    }

    pub async fn create(&self, actor: &Actor, draft: CvDraft) -> Result<Cv, LifecycleError> {
        actor.ensure_role(Role::JobSeeker)?;
        self.ensure_profile(actor.user_id).await?;
        validate_draft(&draft)?;

        let cv = self
            .store
            .insert_cv(actor.user_id, &draft, Utc::now())
            .await?;
        info!(
            "CV {} created for job seeker {} (default: {})",
            cv.id, cv.job_seeker_id, cv.is_default
        );
        Ok(cv)
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Cv, LifecycleError> {
        let cv = self
            .store
            .get_cv(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(ENTITY, id))?;
        actor.ensure_owner(cv.job_seeker_id)?;
        Ok(cv)
    }

    pub async fn list(&self, actor: &Actor, job_seeker_id: i64) -> Result<Vec<Cv>, LifecycleError> {
        actor.ensure_owner(job_seeker_id)?;
        self.ensure_profile(job_seeker_id).await?;
        self.store.list_cvs(job_seeker_id).await
    }

    pub async fn update(&self, actor: &Actor, id: i64, patch: CvPatch) -> Result<Cv, LifecycleError> {
        let current = self.get(actor, id).await?;
        validate_patch(&patch)?;

        let cv = self
            .store
            .update_cv(id, &patch, Utc::now())
            .await?
            .ok_or_else(|| LifecycleError::not_found(ENTITY, id))?;
        if cv.version != current.version {
            info!("CV {id} moved to version {}", cv.version);
        }
        if cv.is_default && !current.is_default {
            info!("CV {id} is now the default for job seeker {}", cv.job_seeker_id);
        }
        Ok(cv)
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<CvDeletion, LifecycleError> {
        self.get(actor, id).await?;

        let deletion = self
            .store
            .soft_delete_cv(id, Utc::now())
            .await?
            .ok_or_else(|| LifecycleError::not_found(ENTITY, id))?;
        info!("CV {id} soft-deleted");
        if let Some(promoted) = deletion.promoted_id {
            info!("CV {promoted} promoted to default after deleting CV {id}");
        }
        Ok(deletion)
    }

    /// Idempotent when the CV is already the default.
    pub async fn set_default(&self, actor: &Actor, id: i64) -> Result<Cv, LifecycleError> {
        self.get(actor, id).await?;

        let cv = self
            .store
            .set_default_cv(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(ENTITY, id))?;
        info!("CV {id} set as default for job seeker {}", cv.job_seeker_id);
        Ok(cv)
    }

    /// Unauthenticated view: only public, live CVs are returned.
    pub async fn get_public(&self, id: i64) -> Result<Option<Cv>, LifecycleError> {
        self.store.get_public_cv(id).await
    }

    async fn ensure_profile(&self, job_seeker_id: i64) -> Result<(), LifecycleError> {
        if self
            .profiles
            .profile_exists(job_seeker_id, ProfileKind::JobSeeker)
            .await?
        {
            Ok(())
        } else {
            Err(LifecycleError::ProfileNotFound(ProfileKind::JobSeeker.label()))
        }
    }
}

fn validate_draft(draft: &CvDraft) -> Result<(), LifecycleError> {
    if draft.title.trim().is_empty() {
        return Err(LifecycleError::validation("CV title is required"));
    }
    if draft.file_url.trim().is_empty() {
        return Err(LifecycleError::validation("CV file URL is required"));
    }
    if draft.file_size.is_some_and(|size| size < 0) {
        return Err(LifecycleError::validation("CV file size cannot be negative"));
    }
    Ok(())
}

fn validate_patch(patch: &CvPatch) -> Result<(), LifecycleError> {
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(LifecycleError::validation("CV title cannot be empty"));
    }
    if patch.file_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
        return Err(LifecycleError::validation("CV file URL cannot be empty"));
    }
    if patch.file_size.flatten().is_some_and(|size| size < 0) {
        return Err(LifecycleError::validation("CV file size cannot be negative"));
    }
    Ok(())
}
