use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::applications::manager::ApplicationStatistics;
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::application::{
    Application, ApplicationDetailsPatch, ApplicationDraft, ApplicationStatus,
};
use crate::routes::pagination::{PagedResponse, Pagination};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<ApplicationStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

/// POST /api/v1/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    actor: Actor,
    Path(job_id): Path<i64>,
    Json(draft): Json<ApplicationDraft>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let application = state.applications.apply(&actor, job_id, draft).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/jobs/:id/applications
pub async fn handle_list_for_job(
    State(state): State<AppState>,
    actor: Actor,
    Path(job_id): Path<i64>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<PagedResponse<Application>>, AppError> {
    let pagination = Pagination::resolve(query.page, query.limit, &state.config);
    let found = state
        .applications
        .list_for_job(&actor, job_id, query.status, pagination.window())
        .await?;
    Ok(Json(pagination.respond(found)))
}

/// GET /api/v1/jobs/:id/applications/statistics
pub async fn handle_statistics(
    State(state): State<AppState>,
    actor: Actor,
    Path(job_id): Path<i64>,
) -> Result<Json<ApplicationStatistics>, AppError> {
    Ok(Json(state.applications.statistics(&actor, job_id).await?))
}

/// GET /api/v1/applications/mine
pub async fn handle_mine(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<PagedResponse<Application>>, AppError> {
    let pagination = Pagination::resolve(query.page, query.limit, &state.config);
    let found = state
        .applications
        .list_for_job_seeker(&actor, actor.user_id, query.status, pagination.window())
        .await?;
    Ok(Json(pagination.respond(found)))
}

/// GET /api/v1/applications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(state.applications.get(&actor, id).await?))
}

/// PATCH /api/v1/applications/:id
pub async fn handle_update_details(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(patch): Json<ApplicationDetailsPatch>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(
        state.applications.update_details(&actor, id, patch).await?,
    ))
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<Application>, AppError> {
    let application = state
        .applications
        .update_status(&actor, id, req.status, req.notes)
        .await?;
    Ok(Json(application))
}

/// POST /api/v1/applications/:id/withdraw
pub async fn handle_withdraw(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(state.applications.withdraw(&actor, id).await?))
}

/// DELETE /api/v1/applications/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.applications.soft_delete(&actor, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Application {id} not found")))
    }
}
