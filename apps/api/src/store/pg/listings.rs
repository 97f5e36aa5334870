use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};

use super::PgStore;
use crate::listings::search::{like_pattern, ListingSearch};
use crate::models::job_listing::{
    JobListing, JobListingPatch, NewJobListing, STATUS_ACTIVE, STATUS_INACTIVE,
};
use crate::store::{ListingStore, Page, Paged, StoreResult};

/// Shares a lock on a live listing until the caller's transaction ends, so it
/// cannot be deleted or deactivated underneath an insert that depends on it.
pub(super) async fn lock_live_listing(
    conn: &mut PgConnection,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM job_listings
        WHERE id = $1 AND deleted_at IS NULL AND status = $2
        FOR SHARE
        "#,
    )
    .bind(id)
    .bind(STATUS_ACTIVE)
    .fetch_optional(conn)
    .await?;
    Ok(found.is_some())
}

fn push_live_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a ListingSearch) {
    qb.push(" WHERE deleted_at IS NULL AND status = ")
        .push_bind(STATUS_ACTIVE);

    if let Some(keyword) = &filter.keyword {
        let pattern = like_pattern(keyword);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(location) = &filter.location {
        qb.push(" AND location ILIKE ")
            .push_bind(like_pattern(location));
    }
    if let Some(remote_type) = filter.remote_type {
        qb.push(" AND remote_type = ").push_bind(remote_type);
    }
    if let Some(employer_id) = filter.employer_id {
        qb.push(" AND employer_id = ").push_bind(employer_id);
    }
    if let Some(min) = filter.salary_min {
        qb.push(" AND salary_min >= ").push_bind(min);
    }
    if let Some(max) = filter.salary_max {
        qb.push(" AND salary_max <= ").push_bind(max);
    }
    if let Some(job_type) = &filter.job_type {
        qb.push(" AND job_type = ").push_bind(job_type.as_str());
    }
    if let Some(level) = &filter.experience_level {
        qb.push(" AND experience_level = ").push_bind(level.as_str());
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn insert_listing(&self, new: NewJobListing) -> StoreResult<JobListing> {
        let listing = sqlx::query_as::<_, JobListing>(
            r#"
            INSERT INTO job_listings
                (employer_id, category_id, title, description, requirements,
                 responsibilities, benefits, location, job_type, experience_level,
                 education_level, salary_min, salary_max, salary_currency, salary_period,
                 remote_type, posted_date, deadline_date, status, is_featured,
                 department, employment_type, work_schedule, hiring_manager_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            RETURNING *
            "#,
        )
        .bind(new.employer_id)
        .bind(new.category_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.requirements)
        .bind(&new.responsibilities)
        .bind(&new.benefits)
        .bind(&new.location)
        .bind(&new.job_type)
        .bind(&new.experience_level)
        .bind(&new.education_level)
        .bind(new.salary_min)
        .bind(new.salary_max)
        .bind(&new.salary_currency)
        .bind(&new.salary_period)
        .bind(new.remote_type)
        .bind(new.posted_date)
        .bind(new.deadline_date)
        .bind(&new.status)
        .bind(new.is_featured)
        .bind(&new.department)
        .bind(&new.employment_type)
        .bind(&new.work_schedule)
        .bind(new.hiring_manager_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(listing)
    }

    async fn get_listing(&self, id: i64) -> StoreResult<Option<JobListing>> {
        Ok(sqlx::query_as::<_, JobListing>(
            "SELECT * FROM job_listings WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn listing_owner(&self, id: i64) -> StoreResult<Option<i64>> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT employer_id FROM job_listings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_listing(
        &self,
        id: i64,
        patch: &JobListingPatch,
    ) -> StoreResult<Option<JobListing>> {
        let mut tx = self.pool.begin().await?;

        let current: Option<JobListing> = sqlx::query_as(
            "SELECT * FROM job_listings WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(mut listing) = current else {
            return Ok(None);
        };
        patch.apply_to(&mut listing);

        let updated = sqlx::query_as::<_, JobListing>(
            r#"
            UPDATE job_listings SET
                category_id = $2, title = $3, description = $4, requirements = $5,
                responsibilities = $6, benefits = $7, location = $8, job_type = $9,
                experience_level = $10, education_level = $11, salary_min = $12,
                salary_max = $13, salary_currency = $14, salary_period = $15,
                remote_type = $16, deadline_date = $17, status = $18, is_featured = $19,
                department = $20, employment_type = $21, work_schedule = $22,
                hiring_manager_id = $23
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(listing.category_id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.requirements)
        .bind(&listing.responsibilities)
        .bind(&listing.benefits)
        .bind(&listing.location)
        .bind(&listing.job_type)
        .bind(&listing.experience_level)
        .bind(&listing.education_level)
        .bind(listing.salary_min)
        .bind(listing.salary_max)
        .bind(&listing.salary_currency)
        .bind(&listing.salary_period)
        .bind(listing.remote_type)
        .bind(listing.deadline_date)
        .bind(&listing.status)
        .bind(listing.is_featured)
        .bind(&listing.department)
        .bind(&listing.employment_type)
        .bind(&listing.work_schedule)
        .bind(listing.hiring_manager_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn soft_delete_listing(&self, id: i64, now: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE job_listings
            SET deleted_at = $2, status = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(STATUS_INACTIVE)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_views(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE job_listings SET views_count = views_count + 1 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_applications(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE job_listings
            SET applications_count = applications_count + 1
            WHERE id = $1 AND deleted_at IS NULL AND status = $2
            "#,
        )
        .bind(id)
        .bind(STATUS_ACTIVE)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_listings(
        &self,
        filter: &ListingSearch,
        page: Page,
    ) -> StoreResult<Paged<JobListing>> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM job_listings");
        push_live_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut rows_qb = QueryBuilder::<Postgres>::new("SELECT * FROM job_listings");
        push_live_filters(&mut rows_qb, filter);
        rows_qb
            .push(" ORDER BY posted_date DESC, id DESC LIMIT ")
            .push_bind(page.take)
            .push(" OFFSET ")
            .push_bind(page.skip);
        let rows = rows_qb
            .build_query_as::<JobListing>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paged { rows, total })
    }

    async fn featured_listings(&self, limit: i64) -> StoreResult<Vec<JobListing>> {
        Ok(sqlx::query_as::<_, JobListing>(
            r#"
            SELECT * FROM job_listings
            WHERE is_featured AND status = $1 AND deleted_at IS NULL
            ORDER BY posted_date DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(STATUS_ACTIVE)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
