//! Submission repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::SubmissionEntity;
use crate::metrics::QueryTimer;
use domain::models::{NewSubmission, SearchTerm, SubmissionFilter};

/// Repository for submission-related database operations.
#[derive(Clone)]
pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a submission. A duplicate `(form_id, email)` fails with a
    /// unique violation (23505).
    pub async fn create(&self, submission: &NewSubmission) -> Result<SubmissionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_submission");
        let result = sqlx::query_as::<_, SubmissionEntity>(
            r#"
            INSERT INTO submissions (id, form_id, data, email)
            VALUES ($1, $2, $3, $4)
            RETURNING id, form_id, data, email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(submission.form_id)
        .bind(&submission.data)
        .bind(&submission.email)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SubmissionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_submission_by_id");
        let result = sqlx::query_as::<_, SubmissionEntity>(
            r#"
            SELECT id, form_id, data, email, created_at
            FROM submissions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Submissions across all of a tenant's forms since `since`.
    pub async fn count_by_tenant_since(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_submissions_by_tenant_since");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM submissions s
            JOIN forms f ON f.id = s.form_id
            WHERE f.tenant_id = $1 AND s.created_at >= $2
            "#,
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Filtered submissions of a tenant, newest first with ties by id.
    /// A NULL limit returns every row after the offset.
    pub async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<SubmissionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_submissions");
        let (id_pattern, email_pattern) = search_patterns(filter);

        let result = sqlx::query_as::<_, SubmissionEntity>(
            r#"
            SELECT s.id, s.form_id, s.data, s.email, s.created_at
            FROM submissions s
            JOIN forms f ON f.id = s.form_id
            WHERE f.tenant_id = $1
              AND ($2::uuid IS NULL OR s.form_id = $2)
              AND ($3::timestamptz IS NULL OR s.created_at >= $3)
              AND ($4::timestamptz IS NULL OR s.created_at < $4)
              AND ($5::text IS NULL OR s.id::text ILIKE $5)
              AND ($6::text IS NULL OR s.email ILIKE $6 OR s.data->>'email' ILIKE $6)
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.form_id)
        .bind(filter.created_from)
        .bind(filter.created_before)
        .bind(id_pattern)
        .bind(email_pattern)
        .bind(filter.limit.map(i64::from))
        .bind(i64::try_from(filter.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Number of rows [`Self::list`] would return without a page window.
    pub async fn count_matching(&self, filter: &SubmissionFilter) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_submissions");
        let (id_pattern, email_pattern) = search_patterns(filter);

        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM submissions s
            JOIN forms f ON f.id = s.form_id
            WHERE f.tenant_id = $1
              AND ($2::uuid IS NULL OR s.form_id = $2)
              AND ($3::timestamptz IS NULL OR s.created_at >= $3)
              AND ($4::timestamptz IS NULL OR s.created_at < $4)
              AND ($5::text IS NULL OR s.id::text ILIKE $5)
              AND ($6::text IS NULL OR s.email ILIKE $6 OR s.data->>'email' ILIKE $6)
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.form_id)
        .bind(filter.created_from)
        .bind(filter.created_before)
        .bind(id_pattern)
        .bind(email_pattern)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Deletes the submission's logs and then the submission in one
    /// transaction. Returns `(logs, submissions)` removed.
    pub async fn delete_cascade(&self, id: Uuid) -> Result<(u64, u64), sqlx::Error> {
        let timer = QueryTimer::new("delete_submission_cascade");
        let mut tx = self.pool.begin().await?;

        let logs = sqlx::query("DELETE FROM notification_logs WHERE submission_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let submissions = sqlx::query("DELETE FROM submissions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if submissions == 0 {
            tx.rollback().await?;
            timer.record();
            return Err(sqlx::Error::RowNotFound);
        }

        tx.commit().await?;
        timer.record();
        Ok((logs, submissions))
    }
}

/// `(id_pattern, email_pattern)` ILIKE parameters for the search term.
fn search_patterns(filter: &SubmissionFilter) -> (Option<String>, Option<String>) {
    match &filter.search {
        Some(term @ SearchTerm::IdFragment(_)) => (Some(term.like_pattern()), None),
        Some(term @ SearchTerm::Email(_)) => (None, Some(term.like_pattern())),
        None => (None, None),
    }
}
