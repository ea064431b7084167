//! PostgreSQL implementation of [`FormStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::metrics::record_cascade_rows;
use crate::repositories::{
    EmailSettingsRepository, FormRepository, GlobalSettingsRepository, NotificationLogRepository,
    SubmissionRepository, TenantRepository,
};
use domain::models::{
    EmailSettings, Form, GlobalSettings, NewForm, NewNotificationLog, NewSubmission,
    NotificationLog, NotificationType, Submission, SubmissionFilter, Tenant,
};
use domain::store::{CascadeSummary, FormStore, StoreError, StoreResult};

/// PostgreSQL error code for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Maps a sqlx error onto the store taxonomy.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(
                db_err
                    .constraint()
                    .map(|c| format!("unique constraint {} violated", c))
                    .unwrap_or_else(|| "unique constraint violated".to_string()),
            )
        }
        _ => {
            tracing::error!(error = %err, "Database error");
            StoreError::Database(err.to_string())
        }
    }
}

fn not_found_or(what: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |err| match err {
        sqlx::Error::RowNotFound => StoreError::NotFound(what),
        other => map_sqlx_error(other),
    }
}

/// Store backed by the repositories over one connection pool.
#[derive(Clone)]
pub struct PgFormStore {
    pool: PgPool,
    tenants: TenantRepository,
    forms: FormRepository,
    submissions: SubmissionRepository,
    logs: NotificationLogRepository,
    email_settings: EmailSettingsRepository,
    global_settings: GlobalSettingsRepository,
}

impl PgFormStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tenants: TenantRepository::new(pool.clone()),
            forms: FormRepository::new(pool.clone()),
            submissions: SubmissionRepository::new(pool.clone()),
            logs: NotificationLogRepository::new(pool.clone()),
            email_settings: EmailSettingsRepository::new(pool.clone()),
            global_settings: GlobalSettingsRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FormStore for PgFormStore {
    async fn find_tenant(&self, tenant_id: Uuid) -> StoreResult<Option<Tenant>> {
        self.tenants
            .find_by_id(tenant_id)
            .await
            .map_err(map_sqlx_error)?
            .map(Tenant::try_from)
            .transpose()
    }

    async fn find_or_create_tenant(&self, external_id: &str, email: &str) -> StoreResult<Tenant> {
        let entity = self
            .tenants
            .upsert_by_external_id(external_id, email)
            .await
            .map_err(map_sqlx_error)?;
        Tenant::try_from(entity)
    }

    async fn find_form(&self, form_id: Uuid) -> StoreResult<Option<Form>> {
        Ok(self
            .forms
            .find_by_id(form_id)
            .await
            .map_err(map_sqlx_error)?
            .map(Form::from))
    }

    async fn list_forms(&self, tenant_id: Uuid) -> StoreResult<Vec<Form>> {
        Ok(self
            .forms
            .list_by_tenant(tenant_id)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Form::from)
            .collect())
    }

    async fn count_forms(&self, tenant_id: Uuid) -> StoreResult<i64> {
        self.forms
            .count_by_tenant(tenant_id)
            .await
            .map_err(map_sqlx_error)
    }

    async fn create_form(&self, form: NewForm) -> StoreResult<Form> {
        Ok(self
            .forms
            .create(&form)
            .await
            .map_err(map_sqlx_error)?
            .into())
    }

    async fn count_submissions_since(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.submissions
            .count_by_tenant_since(tenant_id, since)
            .await
            .map_err(map_sqlx_error)
    }

    async fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        Ok(self
            .submissions
            .create(&submission)
            .await
            .map_err(map_sqlx_error)?
            .into())
    }

    async fn find_submission(&self, submission_id: Uuid) -> StoreResult<Option<Submission>> {
        Ok(self
            .submissions
            .find_by_id(submission_id)
            .await
            .map_err(map_sqlx_error)?
            .map(Submission::from))
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> StoreResult<Vec<Submission>> {
        Ok(self
            .submissions
            .list(filter)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Submission::from)
            .collect())
    }

    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<i64> {
        self.submissions
            .count_matching(filter)
            .await
            .map_err(map_sqlx_error)
    }

    async fn create_notification_log(
        &self,
        log: NewNotificationLog,
    ) -> StoreResult<NotificationLog> {
        let entity = self.logs.create(&log).await.map_err(map_sqlx_error)?;
        NotificationLog::try_from(entity)
    }

    async fn find_notification_logs(
        &self,
        submission_id: Uuid,
    ) -> StoreResult<Vec<NotificationLog>> {
        self.logs
            .find_by_submission(submission_id)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(NotificationLog::try_from)
            .collect()
    }

    async fn find_notification_logs_for(
        &self,
        submission_ids: &[Uuid],
    ) -> StoreResult<Vec<NotificationLog>> {
        self.logs
            .find_by_submissions(submission_ids)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(NotificationLog::try_from)
            .collect()
    }

    async fn count_notification_attempts_since(
        &self,
        form_id: Uuid,
        notification_type: NotificationType,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.logs
            .count_attempts_since(form_id, notification_type, since)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_email_settings(&self, form_id: Uuid) -> StoreResult<Option<EmailSettings>> {
        Ok(self
            .email_settings
            .find_by_form(form_id)
            .await
            .map_err(map_sqlx_error)?
            .map(EmailSettings::from))
    }

    async fn get_or_create_email_settings(&self, form_id: Uuid) -> StoreResult<EmailSettings> {
        Ok(self
            .email_settings
            .get_or_create(form_id)
            .await
            .map_err(map_sqlx_error)?
            .into())
    }

    async fn upsert_email_settings(&self, settings: &EmailSettings) -> StoreResult<EmailSettings> {
        Ok(self
            .email_settings
            .upsert(settings)
            .await
            .map_err(map_sqlx_error)?
            .into())
    }

    async fn mark_notification_sent(&self, form_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.email_settings
            .mark_notification_sent(form_id, at)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_global_settings(&self, tenant_id: Uuid) -> StoreResult<Option<GlobalSettings>> {
        Ok(self
            .global_settings
            .find_by_tenant(tenant_id)
            .await
            .map_err(map_sqlx_error)?
            .map(GlobalSettings::from))
    }

    async fn upsert_global_settings(
        &self,
        settings: &GlobalSettings,
    ) -> StoreResult<GlobalSettings> {
        Ok(self
            .global_settings
            .upsert(settings)
            .await
            .map_err(map_sqlx_error)?
            .into())
    }

    async fn delete_form_cascade(&self, form_id: Uuid) -> StoreResult<CascadeSummary> {
        let counts = self
            .forms
            .delete_cascade(form_id)
            .await
            .map_err(not_found_or("Form"))?;
        record_cascade_rows("notification_logs", counts.notification_logs);
        record_cascade_rows("submissions", counts.submissions);
        record_cascade_rows("email_settings", counts.email_settings);
        record_cascade_rows("forms", counts.forms);
        Ok(CascadeSummary {
            notification_logs: counts.notification_logs,
            submissions: counts.submissions,
            email_settings: counts.email_settings,
            forms: counts.forms,
        })
    }

    async fn delete_submission_cascade(&self, submission_id: Uuid) -> StoreResult<CascadeSummary> {
        let (notification_logs, submissions) = self
            .submissions
            .delete_cascade(submission_id)
            .await
            .map_err(not_found_or("Submission"))?;
        record_cascade_rows("notification_logs", notification_logs);
        record_cascade_rows("submissions", submissions);
        Ok(CascadeSummary {
            notification_logs,
            submissions,
            ..Default::default()
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
