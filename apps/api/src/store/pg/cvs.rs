use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::PgStore;
use crate::cv::rules;
use crate::models::cv::{Cv, CvDeletion, CvDraft, CvPatch};
use crate::store::{CvStore, StoreResult};

/// Serialises every CV mutation for one job seeker until the transaction ends.
/// Row locks alone cannot cover the "no CVs yet" case, so an advisory lock
/// keyed on the owner stands in for a lock on the whole CV set.
pub(super) async fn lock_cv_set(
    conn: &mut PgConnection,
    job_seeker_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(job_seeker_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn owner_of(conn: &mut PgConnection, id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT job_seeker_id FROM cvs WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Re-reads the row under the set lock; it may have been deleted meanwhile.
async fn live_for_update(conn: &mut PgConnection, id: i64) -> Result<Option<Cv>, sqlx::Error> {
    sqlx::query_as::<_, Cv>("SELECT * FROM cvs WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
}

async fn clear_defaults(
    conn: &mut PgConnection,
    job_seeker_id: i64,
    except: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE cvs SET is_default = FALSE
        WHERE job_seeker_id = $1
          AND is_default
          AND deleted_at IS NULL
          AND ($2::BIGINT IS NULL OR id <> $2)
        "#,
    )
    .bind(job_seeker_id)
    .bind(except)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CvStore for PgStore {
    async fn get_cv(&self, id: i64) -> StoreResult<Option<Cv>> {
        Ok(
            sqlx::query_as::<_, Cv>("SELECT * FROM cvs WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_public_cv(&self, id: i64) -> StoreResult<Option<Cv>> {
        Ok(sqlx::query_as::<_, Cv>(
            "SELECT * FROM cvs WHERE id = $1 AND is_public AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_cvs(&self, job_seeker_id: i64) -> StoreResult<Vec<Cv>> {
        Ok(sqlx::query_as::<_, Cv>(
            r#"
            SELECT * FROM cvs
            WHERE job_seeker_id = $1 AND deleted_at IS NULL
            ORDER BY last_updated DESC, id DESC
            "#,
        )
        .bind(job_seeker_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_cv(
        &self,
        job_seeker_id: i64,
        draft: &CvDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Cv> {
        let mut tx = self.pool.begin().await?;
        lock_cv_set(&mut tx, job_seeker_id).await?;

        let live_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cvs WHERE job_seeker_id = $1 AND deleted_at IS NULL",
        )
        .bind(job_seeker_id)
        .fetch_one(&mut *tx)
        .await?;

        let is_default = rules::resolve_initial_default(live_count as usize, draft.is_default);
        if is_default {
            clear_defaults(&mut tx, job_seeker_id, None).await?;
        }

        // The id argument is ignored; the database assigns it.
        let row = rules::new_cv(0, job_seeker_id, draft, is_default, now);
        let cv = sqlx::query_as::<_, Cv>(
            r#"
            INSERT INTO cvs
                (job_seeker_id, template_id, title, file_url, is_default, file_size,
                 file_type, version, language, is_public, created_at, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(row.job_seeker_id)
        .bind(row.template_id)
        .bind(&row.title)
        .bind(&row.file_url)
        .bind(row.is_default)
        .bind(row.file_size)
        .bind(&row.file_type)
        .bind(row.version)
        .bind(&row.language)
        .bind(row.is_public)
        .bind(row.created_at)
        .bind(row.last_updated)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(cv)
    }

    async fn update_cv(
        &self,
        id: i64,
        patch: &CvPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Cv>> {
        let mut tx = self.pool.begin().await?;
        let Some(job_seeker_id) = owner_of(&mut tx, id).await? else {
            return Ok(None);
        };
        lock_cv_set(&mut tx, job_seeker_id).await?;
        let Some(mut cv) = live_for_update(&mut tx, id).await? else {
            return Ok(None);
        };

        if patch.is_default == Some(true) {
            clear_defaults(&mut tx, job_seeker_id, Some(id)).await?;
        }
        rules::apply_patch(&mut cv, patch, now);

        let updated = sqlx::query_as::<_, Cv>(
            r#"
            UPDATE cvs SET
                template_id = $2, title = $3, file_url = $4, is_default = $5,
                file_size = $6, file_type = $7, version = $8, language = $9,
                is_public = $10, last_updated = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cv.template_id)
        .bind(&cv.title)
        .bind(&cv.file_url)
        .bind(cv.is_default)
        .bind(cv.file_size)
        .bind(&cv.file_type)
        .bind(cv.version)
        .bind(&cv.language)
        .bind(cv.is_public)
        .bind(cv.last_updated)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn soft_delete_cv(&self, id: i64, now: DateTime<Utc>) -> StoreResult<Option<CvDeletion>> {
        let mut tx = self.pool.begin().await?;
        let Some(job_seeker_id) = owner_of(&mut tx, id).await? else {
            return Ok(None);
        };
        lock_cv_set(&mut tx, job_seeker_id).await?;
        let Some(cv) = live_for_update(&mut tx, id).await? else {
            return Ok(None);
        };

        sqlx::query("UPDATE cvs SET deleted_at = $2, is_default = FALSE WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let mut promoted_id = None;
        if cv.is_default {
            promoted_id = sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE cvs SET is_default = TRUE
                WHERE id = (
                    SELECT id FROM cvs
                    WHERE job_seeker_id = $1 AND id <> $2 AND deleted_at IS NULL
                    ORDER BY last_updated DESC, id DESC
                    LIMIT 1
                )
                RETURNING id
                "#,
            )
            .bind(job_seeker_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(CvDeletion {
            deleted_id: id,
            promoted_id,
        }))
    }

    async fn set_default_cv(&self, id: i64) -> StoreResult<Option<Cv>> {
        let mut tx = self.pool.begin().await?;
        let Some(job_seeker_id) = owner_of(&mut tx, id).await? else {
            return Ok(None);
        };
        lock_cv_set(&mut tx, job_seeker_id).await?;
        if live_for_update(&mut tx, id).await?.is_none() {
            return Ok(None);
        }

        clear_defaults(&mut tx, job_seeker_id, Some(id)).await?;
        let cv = sqlx::query_as::<_, Cv>("UPDATE cvs SET is_default = TRUE WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(cv))
    }
}
