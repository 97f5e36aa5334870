use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use super::{cvs, listings, PgStore};
use crate::errors::{LifecycleError, UNIQUE_VIOLATION};
use crate::models::application::{Application, ApplicationStatus, NewApplication};
use crate::store::{ApplicationScope, ApplicationStore, Page, Paged, StoreResult};

fn push_scope(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: ApplicationScope,
    status: Option<ApplicationStatus>,
) {
    qb.push(" WHERE deleted_at IS NULL");
    match scope {
        ApplicationScope::Job(job_id) => {
            qb.push(" AND job_id = ").push_bind(job_id);
        }
        ApplicationScope::JobSeeker(seeker) => {
            qb.push(" AND job_seeker_id = ").push_bind(seeker);
        }
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
}

fn insert_error(err: sqlx::Error, new: &NewApplication) -> LifecycleError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return LifecycleError::DuplicateApplication {
                job_id: new.job_id,
                job_seeker_id: new.job_seeker_id,
            };
        }
    }
    err.into()
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn insert_application(&self, new: NewApplication) -> StoreResult<Application> {
        let mut tx = self.pool.begin().await?;

        if !listings::lock_live_listing(&mut *tx, new.job_id).await? {
            return Err(LifecycleError::JobNotFound(new.job_id));
        }

        // Holding the CV set lock keeps the chosen CV from being deleted or
        // losing its default flag before the insert commits.
        cvs::lock_cv_set(&mut *tx, new.job_seeker_id).await?;
        let cv_id = match new.cv_id {
            Some(cv_id) => {
                let owned = sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM cvs WHERE id = $1 AND job_seeker_id = $2 AND deleted_at IS NULL",
                )
                .bind(cv_id)
                .bind(new.job_seeker_id)
                .fetch_optional(&mut *tx)
                .await?;
                Some(owned.ok_or_else(|| LifecycleError::foreign_cv(cv_id))?)
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM cvs WHERE job_seeker_id = $1 AND is_default AND deleted_at IS NULL",
                )
                .bind(new.job_seeker_id)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let application = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications
                (job_id, job_seeker_id, cv_id, cover_letter, status,
                 applied_date, last_updated, source, referral_id)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.job_id)
        .bind(new.job_seeker_id)
        .bind(cv_id)
        .bind(&new.cover_letter)
        .bind(ApplicationStatus::Pending)
        .bind(new.applied_date)
        .bind(&new.source)
        .bind(new.referral_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(e, &new))?;

        tx.commit().await?;
        Ok(application)
    }

    async fn get_application(&self, id: i64) -> StoreResult<Option<Application>> {
        Ok(sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_applications(
        &self,
        scope: ApplicationScope,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> StoreResult<Paged<Application>> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM applications");
        push_scope(&mut count_qb, scope, status);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut rows_qb = QueryBuilder::<Postgres>::new("SELECT * FROM applications");
        push_scope(&mut rows_qb, scope, status);
        rows_qb
            .push(" ORDER BY applied_date DESC, id DESC LIMIT ")
            .push_bind(page.take)
            .push(" OFFSET ")
            .push_bind(page.skip);
        let rows = rows_qb
            .build_query_as::<Application>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paged { rows, total })
    }

    async fn transition_application(
        &self,
        id: i64,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Application>> {
        Ok(sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $3,
                review_notes = COALESCE($4, review_notes),
                last_updated = $5
            WHERE id = $1 AND status = $2 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(notes)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_application_details(
        &self,
        id: i64,
        cover_letter: Option<&str>,
        cv_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Application>> {
        Ok(sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET cover_letter = COALESCE($2, cover_letter),
                cv_id = COALESCE($3, cv_id),
                last_updated = $4
            WHERE id = $1 AND status = $5 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cover_letter)
        .bind(cv_id)
        .bind(now)
        .bind(ApplicationStatus::Pending)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn soft_delete_application(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE applications SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self, job_id: i64) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        Ok(sqlx::query_as::<_, (ApplicationStatus, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM applications
            WHERE job_id = $1 AND deleted_at IS NULL
            GROUP BY status
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
