//! Authorization Gate adapter.
//!
//! Token validation happens upstream in the gateway, which forwards the
//! authenticated identity as `x-user-id` / `x-user-role` headers. This module
//! only turns those headers into an [`Actor`]; role and ownership checks are
//! made by the lifecycle managers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::errors::{AppError, LifecycleError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    JobSeeker,
    Employer,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "job_seeker" | "jobseeker" => Some(Role::JobSeeker),
            "employer" => Some(Role::Employer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on anyone's records.
    pub fn can_act_for(&self, owner_id: i64) -> bool {
        self.is_admin() || self.user_id == owner_id
    }

    pub fn ensure_owner(&self, owner_id: i64) -> Result<(), LifecycleError> {
        if self.can_act_for(owner_id) {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden)
        }
    }

    pub fn ensure_role(&self, role: Role) -> Result<(), LifecycleError> {
        if self.role == role || self.is_admin() {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden)
        }
    }

    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = headers
            .get(USER_ID_HEADER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<i64>()
            .ok()?;
        let role = Role::parse(headers.get(USER_ROLE_HEADER)?.to_str().ok()?)?;
        Some(Actor::new(user_id, role))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_headers(&parts.headers).ok_or_else(|| {
            tracing::debug!(path = %parts.uri.path(), "missing or malformed actor headers");
            AppError::Unauthorized
        })
    }
}
