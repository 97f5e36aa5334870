use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::cv::{Cv, CvDeletion, CvDraft, CvPatch};
use crate::state::AppState;

/// GET /api/v1/cvs
pub async fn handle_list(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Cv>>, AppError> {
    Ok(Json(state.cvs.list(&actor, actor.user_id).await?))
}

/// POST /api/v1/cvs
pub async fn handle_create(
    State(state): State<AppState>,
    actor: Actor,
    Json(draft): Json<CvDraft>,
) -> Result<(StatusCode, Json<Cv>), AppError> {
    let cv = state.cvs.create(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(cv)))
}

/// GET /api/v1/cvs/:id
pub async fn handle_get(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Cv>, AppError> {
    Ok(Json(state.cvs.get(&actor, id).await?))
}

/// PUT /api/v1/cvs/:id
pub async fn handle_update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(patch): Json<CvPatch>,
) -> Result<Json<Cv>, AppError> {
    Ok(Json(state.cvs.update(&actor, id, patch).await?))
}

/// DELETE /api/v1/cvs/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<CvDeletion>, AppError> {
    Ok(Json(state.cvs.delete(&actor, id).await?))
}

/// PATCH /api/v1/cvs/:id/default
pub async fn handle_set_default(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Cv>, AppError> {
    Ok(Json(state.cvs.set_default(&actor, id).await?))
}

/// GET /api/v1/cvs/public/:id
pub async fn handle_get_public(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Cv>, AppError> {
    state
        .cvs
        .get_public(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("CV {id} not found")))
}
