//! Pure CV invariants shared by every store backend.
//!
//! Backends call these inside their atomic section so the single-default and
//! version rules read the same whether rows live in Postgres or in memory.

use chrono::{DateTime, Utc};

use crate::models::cv::{Cv, CvDraft, CvPatch, DEFAULT_LANGUAGE};

/// The first live CV a job seeker owns is always default; later ones follow the request.
pub fn resolve_initial_default(live_cv_count: usize, requested: Option<bool>) -> bool {
    live_cv_count == 0 || requested.unwrap_or(false)
}

/// Version bumps by one only when the file reference actually changes.
pub fn next_version(current: &Cv, new_file_url: Option<&str>) -> i32 {
    match new_file_url {
        Some(url) if url != current.file_url => current.version + 1,
        _ => current.version,
    }
}

/// Picks the sibling that inherits the default flag: most recently updated,
/// highest id on ties.
pub fn pick_successor<'a, I>(siblings: I) -> Option<&'a Cv>
where
    I: IntoIterator<Item = &'a Cv>,
{
    siblings
        .into_iter()
        .filter(|cv| cv.deleted_at.is_none())
        .max_by(|a, b| {
            a.last_updated
                .cmp(&b.last_updated)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Builds a fresh version-1 CV row.
pub fn new_cv(
    id: i64,
    job_seeker_id: i64,
    draft: &CvDraft,
    is_default: bool,
    now: DateTime<Utc>,
) -> Cv {
    Cv {
        id,
        job_seeker_id,
        template_id: draft.template_id,
        title: draft.title.clone(),
        file_url: draft.file_url.clone(),
        is_default,
        file_size: draft.file_size,
        file_type: draft.file_type.clone(),
        version: 1,
        language: draft
            .language
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        is_public: draft.is_public.unwrap_or(false),
        created_at: now,
        last_updated: now,
        deleted_at: None,
    }
}

/// Applies a patch, bumping the version before the file URL is overwritten.
pub fn apply_patch(cv: &mut Cv, patch: &CvPatch, now: DateTime<Utc>) {
    cv.version = next_version(cv, patch.file_url.as_deref());

    if let Some(title) = &patch.title {
        cv.title = title.clone();
    }
    if let Some(url) = &patch.file_url {
        cv.file_url = url.clone();
    }
    if let Some(is_default) = patch.is_default {
        cv.is_default = is_default;
    }
    if let Some(size) = patch.file_size {
        cv.file_size = size;
    }
    if let Some(file_type) = &patch.file_type {
        cv.file_type = file_type.clone();
    }
    if let Some(template_id) = patch.template_id {
        cv.template_id = template_id;
    }
    if let Some(language) = &patch.language {
        cv.language = language.clone();
    }
    if let Some(is_public) = patch.is_public {
        cv.is_public = is_public;
    }
    cv.last_updated = now;
}
