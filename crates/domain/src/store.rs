//! Store abstraction the service is built against.
//!
//! Implemented by `persistence::PgFormStore` (PostgreSQL) and
//! `persistence::InMemoryFormStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    EmailSettings, Form, GlobalSettings, NewForm, NewNotificationLog, NewSubmission,
    NotificationLog, NotificationType, Submission, SubmissionFilter, Tenant,
};

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeSummary {
    pub notification_logs: u64,
    pub submissions: u64,
    pub email_settings: u64,
    pub forms: u64,
}

#[async_trait]
pub trait FormStore: Send + Sync {
    async fn find_tenant(&self, tenant_id: Uuid) -> StoreResult<Option<Tenant>>;

    /// Provisions a FREE tenant on first sight of an external identity.
    async fn find_or_create_tenant(&self, external_id: &str, email: &str) -> StoreResult<Tenant>;

    async fn find_form(&self, form_id: Uuid) -> StoreResult<Option<Form>>;

    /// Newest first.
    async fn list_forms(&self, tenant_id: Uuid) -> StoreResult<Vec<Form>>;

    async fn count_forms(&self, tenant_id: Uuid) -> StoreResult<i64>;

    async fn create_form(&self, form: NewForm) -> StoreResult<Form>;

    /// Submissions across all of the tenant's forms created at or after `since`.
    async fn count_submissions_since(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Fails with [`StoreError::Conflict`] on a duplicate `(form_id, email)`.
    async fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission>;

    async fn find_submission(&self, submission_id: Uuid) -> StoreResult<Option<Submission>>;

    /// Matching submissions, newest first with ties broken by id, limited to
    /// the filter's page window when one is set.
    async fn list_submissions(&self, filter: &SubmissionFilter) -> StoreResult<Vec<Submission>>;

    /// Number of matching submissions, ignoring the page window.
    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<i64>;

    async fn create_notification_log(
        &self,
        log: NewNotificationLog,
    ) -> StoreResult<NotificationLog>;

    async fn find_notification_logs(
        &self,
        submission_id: Uuid,
    ) -> StoreResult<Vec<NotificationLog>>;

    /// Logs for many submissions at once.
    async fn find_notification_logs_for(
        &self,
        submission_ids: &[Uuid],
    ) -> StoreResult<Vec<NotificationLog>>;

    /// Sent and failed logs of one type for a form since `since`.
    async fn count_notification_attempts_since(
        &self,
        form_id: Uuid,
        notification_type: NotificationType,
        since: DateTime<Utc>,
    ) -> StoreResult<i64>;

    async fn find_email_settings(&self, form_id: Uuid) -> StoreResult<Option<EmailSettings>>;

    async fn get_or_create_email_settings(&self, form_id: Uuid) -> StoreResult<EmailSettings>;

    async fn upsert_email_settings(&self, settings: &EmailSettings) -> StoreResult<EmailSettings>;

    async fn mark_notification_sent(&self, form_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn find_global_settings(&self, tenant_id: Uuid) -> StoreResult<Option<GlobalSettings>>;

    async fn upsert_global_settings(
        &self,
        settings: &GlobalSettings,
    ) -> StoreResult<GlobalSettings>;

    /// Removes logs, submissions, email settings and the form atomically.
    async fn delete_form_cascade(&self, form_id: Uuid) -> StoreResult<CascadeSummary>;

    /// Removes the submission's logs and then the submission atomically.
    async fn delete_submission_cascade(&self, submission_id: Uuid) -> StoreResult<CascadeSummary>;

    async fn ping(&self) -> StoreResult<()>;
}
