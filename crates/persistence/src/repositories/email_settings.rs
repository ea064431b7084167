//! Email settings repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::EmailSettingsEntity;
use crate::metrics::QueryTimer;
use domain::models::EmailSettings;

const SETTINGS_COLUMNS: &str = "id, form_id, enabled, from_email, subject, template, \
    developer_notifications_enabled, developer_email, max_notifications_per_hour, \
    notification_conditions, last_notification_sent_at, created_at, updated_at";

/// Repository for per-form email settings.
#[derive(Clone)]
pub struct EmailSettingsRepository {
    pool: PgPool,
}

impl EmailSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_form(&self, form_id: Uuid) -> Result<Option<EmailSettingsEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_email_settings_by_form");
        let result = sqlx::query_as::<_, EmailSettingsEntity>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM email_settings WHERE form_id = $1"
        ))
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Inserts default settings unless a row exists, then returns the row.
    pub async fn get_or_create(&self, form_id: Uuid) -> Result<EmailSettingsEntity, sqlx::Error> {
        let timer = QueryTimer::new("get_or_create_email_settings");
        sqlx::query(
            r#"
            INSERT INTO email_settings (id, form_id)
            VALUES ($1, $2)
            ON CONFLICT (form_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .execute(&self.pool)
        .await?;

        let result = sqlx::query_as::<_, EmailSettingsEntity>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM email_settings WHERE form_id = $1"
        ))
        .bind(form_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn upsert(&self, settings: &EmailSettings) -> Result<EmailSettingsEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_email_settings");
        let result = sqlx::query_as::<_, EmailSettingsEntity>(&format!(
            r#"
            INSERT INTO email_settings (
                id, form_id, enabled, from_email, subject, template,
                developer_notifications_enabled, developer_email, max_notifications_per_hour,
                notification_conditions, last_notification_sent_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (form_id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                from_email = EXCLUDED.from_email,
                subject = EXCLUDED.subject,
                template = EXCLUDED.template,
                developer_notifications_enabled = EXCLUDED.developer_notifications_enabled,
                developer_email = EXCLUDED.developer_email,
                max_notifications_per_hour = EXCLUDED.max_notifications_per_hour,
                notification_conditions = EXCLUDED.notification_conditions,
                updated_at = EXCLUDED.updated_at
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(settings.id)
        .bind(settings.form_id)
        .bind(settings.enabled)
        .bind(&settings.from_email)
        .bind(&settings.subject)
        .bind(&settings.template)
        .bind(settings.developer_notifications_enabled)
        .bind(&settings.developer_email)
        .bind(settings.max_notifications_per_hour)
        .bind(Json(&settings.notification_conditions))
        .bind(settings.last_notification_sent_at)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Stamps the last developer notice time. No-op without a settings row.
    pub async fn mark_notification_sent(
        &self,
        form_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_notification_sent");
        let result = sqlx::query(
            r#"
            UPDATE email_settings
            SET last_notification_sent_at = $2
            WHERE form_id = $1
            "#,
        )
        .bind(form_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}
