//! Postgres backend. Compound operations run inside one transaction; counters
//! use in-place `SET x = x + 1` updates so concurrent requests never lose writes.

mod applications;
mod cvs;
mod listings;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ProfileDirectory, ProfileKind, StoreResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileDirectory for PgStore {
    async fn profile_exists(&self, user_id: i64, kind: ProfileKind) -> StoreResult<bool> {
        let sql = match kind {
            ProfileKind::JobSeeker => {
                "SELECT EXISTS(SELECT 1 FROM job_seeker_profiles WHERE user_id = $1)"
            }
            ProfileKind::Employer => {
                "SELECT EXISTS(SELECT 1 FROM employer_profiles WHERE user_id = $1)"
            }
        };
        let exists: bool = sqlx::query_scalar(sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
