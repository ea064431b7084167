//! Notification log repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::NotificationLogEntity;
use crate::metrics::QueryTimer;
use domain::models::{NewNotificationLog, NotificationType};

const LOG_COLUMNS: &str =
    "id, submission_id, form_id, type, status, recipient, error, metadata, created_at";

/// Repository for the append-only notification log.
#[derive(Clone)]
pub struct NotificationLogRepository {
    pool: PgPool,
}

impl NotificationLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, log: &NewNotificationLog) -> Result<NotificationLogEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_notification_log");
        let result = sqlx::query_as::<_, NotificationLogEntity>(&format!(
            r#"
            INSERT INTO notification_logs (id, submission_id, form_id, type, status, recipient, error, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(log.submission_id)
        .bind(log.form_id)
        .bind(log.notification_type.as_str())
        .bind(log.status.as_str())
        .bind(&log.recipient)
        .bind(&log.error)
        .bind(&log.metadata)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Logs of one submission, newest first.
    pub async fn find_by_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Vec<NotificationLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_notification_logs_by_submission");
        let result = sqlx::query_as::<_, NotificationLogEntity>(&format!(
            r#"
            SELECT {LOG_COLUMNS}
            FROM notification_logs
            WHERE submission_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_submissions(
        &self,
        submission_ids: &[Uuid],
    ) -> Result<Vec<NotificationLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_notification_logs_by_submissions");
        let result = sqlx::query_as::<_, NotificationLogEntity>(&format!(
            r#"
            SELECT {LOG_COLUMNS}
            FROM notification_logs
            WHERE submission_id = ANY($1)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(submission_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Sent and failed logs of a type for a form since `since`.
    pub async fn count_attempts_since(
        &self,
        form_id: Uuid,
        notification_type: NotificationType,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_notification_attempts_since");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM notification_logs
            WHERE form_id = $1
              AND type = $2
              AND status IN ('SENT', 'FAILED')
              AND created_at >= $3
            "#,
        )
        .bind(form_id)
        .bind(notification_type.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
