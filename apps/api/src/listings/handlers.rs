use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::listings::search::ListingSearch;
use crate::models::job_listing::{JobListing, JobListingDraft, JobListingPatch, RemoteType};
use crate::routes::pagination::{PagedResponse, Pagination};
use crate::state::AppState;

const DEFAULT_FEATURED_LIMIT: i64 = 6;

/// Search filters plus paging. Kept flat: query-string numbers do not survive
/// `#[serde(flatten)]`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub employer_id: Option<i64>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl SearchQuery {
    fn into_parts(self) -> (ListingSearch, Option<i64>, Option<i64>) {
        let filter = ListingSearch {
            keyword: self.keyword,
            location: self.location,
            remote_type: self.remote_type,
            employer_id: self.employer_id,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            job_type: self.job_type,
            experience_level: self.experience_level,
        };
        (filter, self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/jobs/search
pub async fn handle_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PagedResponse<JobListing>>, AppError> {
    let (filter, page, limit) = query.into_parts();
    let pagination = Pagination::resolve(page, limit, &state.config);
    let found = state.listings.search(filter, pagination.window()).await?;
    Ok(Json(pagination.respond(found)))
}

/// GET /api/v1/jobs/featured
pub async fn handle_featured(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<Vec<JobListing>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_FEATURED_LIMIT);
    Ok(Json(state.listings.featured(limit).await?))
}

/// POST /api/v1/jobs
pub async fn handle_create(
    State(state): State<AppState>,
    actor: Actor,
    Json(draft): Json<JobListingDraft>,
) -> Result<(StatusCode, Json<JobListing>), AppError> {
    let listing = state.listings.create(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<JobListing>, AppError> {
    Ok(Json(state.listings.get(id).await?))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(patch): Json<JobListingPatch>,
) -> Result<Json<JobListing>, AppError> {
    Ok(Json(state.listings.update(&actor, id, patch).await?))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.listings.soft_delete(&actor, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Job listing {id} not found")))
    }
}

/// POST /api/v1/jobs/:id/view
pub async fn handle_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.listings.increment_view_count(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
