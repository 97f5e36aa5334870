use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::application::ApplicationStatus;

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle errors (returned by stores and lifecycle managers)
// ────────────────────────────────────────────────────────────────────────────

/// Coarse classification used by callers to pick a user-visible response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    InvalidRequest,
    Forbidden,
    Internal,
}

/// Errors surfaced by the entity store and the lifecycle managers.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Job listing {0} not found or inactive")]
    JobNotFound(i64),

    #[error("{0} profile not found")]
    ProfileNotFound(&'static str),

    #[error("Cannot move application from {from} to {to}")]
    InvalidState {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Actor is not allowed to perform this operation")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Job seeker {job_seeker_id} already applied to job {job_id}")]
    DuplicateApplication { job_id: i64, job_seeker_id: i64 },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        LifecycleError::NotFound { entity, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LifecycleError::Validation(msg.into())
    }

    /// The CV is gone or belongs to someone else.
    pub fn foreign_cv(cv_id: i64) -> Self {
        LifecycleError::Validation(format!("CV {cv_id} is not an active CV of the applicant"))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            LifecycleError::NotFound { .. }
            | LifecycleError::JobNotFound(_)
            | LifecycleError::ProfileNotFound(_) => ErrorClass::NotFound,
            LifecycleError::InvalidState { .. }
            | LifecycleError::Validation(_)
            | LifecycleError::DuplicateApplication { .. }
            | LifecycleError::ConstraintViolation(_) => ErrorClass::InvalidRequest,
            LifecycleError::Forbidden => ErrorClass::Forbidden,
            LifecycleError::Database(_) => ErrorClass::Internal,
        }
    }
}

pub(crate) const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";

impl From<sqlx::Error> for LifecycleError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let code = db.code();
            if matches!(
                code.as_deref(),
                Some(UNIQUE_VIOLATION)
                    | Some(FOREIGN_KEY_VIOLATION)
                    | Some(CHECK_VIOLATION)
                    | Some(NOT_NULL_VIOLATION)
            ) {
                return LifecycleError::ConstraintViolation(db.message().to_string());
            }
        }
        LifecycleError::Database(err)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP error envelope
// ────────────────────────────────────────────────────────────────────────────

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Database(e) => AppError::Database(e),
            LifecycleError::Forbidden => AppError::Forbidden,
            LifecycleError::InvalidState { .. } | LifecycleError::DuplicateApplication { .. } => {
                AppError::Conflict(err.to_string())
            }
            other => match other.class() {
                ErrorClass::NotFound => AppError::NotFound(other.to_string()),
                ErrorClass::InvalidRequest => AppError::Validation(other.to_string()),
                ErrorClass::Forbidden => AppError::Forbidden,
                ErrorClass::Internal => AppError::Internal(anyhow::anyhow!(other.to_string())),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
