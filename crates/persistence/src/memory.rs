//! In-memory implementation of [`FormStore`].
//!
//! Used by tests and the `memory` store backend. All tables live behind one
//! lock; cascading deletes work on a copy of the state and commit it only
//! when every step succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use domain::models::{
    submission::newest_first, EmailSettings, Form, GlobalSettings, NewForm, NewNotificationLog,
    NewSubmission, NotificationLog, NotificationType, PlanTier, Submission, SubmissionFilter,
    Tenant, INITIAL_SCHEMA_VERSION,
};
use domain::store::{CascadeSummary, FormStore, StoreError, StoreResult};

const NEVER: usize = usize::MAX;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tenants: HashMap<Uuid, Tenant>,
    forms: HashMap<Uuid, Form>,
    submissions: HashMap<Uuid, Submission>,
    logs: HashMap<Uuid, NotificationLog>,
    email_settings: HashMap<Uuid, EmailSettings>,
    global_settings: HashMap<Uuid, GlobalSettings>,
}

impl MemoryState {
    fn tenant_of_form(&self, form_id: Uuid) -> Option<Uuid> {
        self.forms.get(&form_id).map(|f| f.tenant_id)
    }
}

/// Row counts per table, for assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub tenants: usize,
    pub forms: usize,
    pub submissions: usize,
    pub notification_logs: usize,
    pub email_settings: usize,
    pub global_settings: usize,
}

pub struct InMemoryFormStore {
    state: RwLock<MemoryState>,
    /// Cascade step after which deletes fail; `NEVER` when disabled.
    fail_cascade_after: AtomicUsize,
    fail_log_writes: AtomicUsize,
}

impl Default for InMemoryFormStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFormStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            fail_cascade_after: AtomicUsize::new(NEVER),
            fail_log_writes: AtomicUsize::new(0),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    /// Makes cascading deletes fail after `steps` completed steps.
    pub fn fail_cascades_after(&self, steps: usize) {
        self.fail_cascade_after.store(steps, Ordering::SeqCst);
    }

    /// Makes notification log writes fail (or succeed again).
    pub fn fail_log_writes(&self, fail: bool) {
        self.fail_log_writes.store(usize::from(fail), Ordering::SeqCst);
    }

    /// Changes a tenant's plan, as the billing flow would.
    pub fn set_plan(&self, tenant_id: Uuid, plan: PlanTier) -> StoreResult<()> {
        let mut state = self.write()?;
        let tenant = state
            .tenants
            .get_mut(&tenant_id)
            .ok_or(StoreError::NotFound("Tenant"))?;
        tenant.plan = plan;
        tenant.updated_at = Utc::now();
        Ok(())
    }

    /// Overrides a submission's creation time.
    pub fn set_submission_created_at(
        &self,
        submission_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let submission = state
            .submissions
            .get_mut(&submission_id)
            .ok_or(StoreError::NotFound("Submission"))?;
        submission.created_at = created_at;
        Ok(())
    }

    pub fn row_counts(&self) -> StoreResult<RowCounts> {
        let state = self.read()?;
        Ok(RowCounts {
            tenants: state.tenants.len(),
            forms: state.forms.len(),
            submissions: state.submissions.len(),
            notification_logs: state.logs.len(),
            email_settings: state.email_settings.len(),
            global_settings: state.global_settings.len(),
        })
    }

    fn check_cascade_step(&self, completed: usize) -> StoreResult<()> {
        if completed >= self.fail_cascade_after.load(Ordering::SeqCst) {
            return Err(StoreError::Database(format!(
                "simulated failure after cascade step {}",
                completed
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FormStore for InMemoryFormStore {
    async fn find_tenant(&self, tenant_id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(self.read()?.tenants.get(&tenant_id).cloned())
    }

    async fn find_or_create_tenant(&self, external_id: &str, email: &str) -> StoreResult<Tenant> {
        let mut state = self.write()?;
        if let Some(tenant) = state
            .tenants
            .values_mut()
            .find(|t| t.external_id == external_id)
        {
            if tenant.email != email {
                tenant.email = email.to_string();
                tenant.updated_at = Utc::now();
            }
            return Ok(tenant.clone());
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            email: email.to_string(),
            plan: PlanTier::Free,
            created_at: now,
            updated_at: now,
        };
        state.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn find_form(&self, form_id: Uuid) -> StoreResult<Option<Form>> {
        Ok(self.read()?.forms.get(&form_id).cloned())
    }

    async fn list_forms(&self, tenant_id: Uuid) -> StoreResult<Vec<Form>> {
        let mut forms: Vec<Form> = self
            .read()?
            .forms
            .values()
            .filter(|f| f.tenant_id == tenant_id)
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(forms)
    }

    async fn count_forms(&self, tenant_id: Uuid) -> StoreResult<i64> {
        let count = self
            .read()?
            .forms
            .values()
            .filter(|f| f.tenant_id == tenant_id)
            .count();
        Ok(count as i64)
    }

    async fn create_form(&self, form: NewForm) -> StoreResult<Form> {
        let now = Utc::now();
        let form = Form {
            id: Uuid::new_v4(),
            tenant_id: form.tenant_id,
            name: form.name,
            description: form.description,
            schema: form.schema,
            schema_version: INITIAL_SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
        };
        self.write()?.forms.insert(form.id, form.clone());
        Ok(form)
    }

    async fn count_submissions_since(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let state = self.read()?;
        let count = state
            .submissions
            .values()
            .filter(|s| s.created_at >= since)
            .filter(|s| state.tenant_of_form(s.form_id) == Some(tenant_id))
            .count();
        Ok(count as i64)
    }

    async fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        let mut state = self.write()?;
        if !state.forms.contains_key(&submission.form_id) {
            return Err(StoreError::NotFound("Form"));
        }
        if let Some(email) = submission.email.as_deref() {
            let duplicate = state
                .submissions
                .values()
                .any(|s| s.form_id == submission.form_id && s.email.as_deref() == Some(email));
            if duplicate {
                return Err(StoreError::Conflict(
                    "unique constraint uq_submissions_form_email violated".into(),
                ));
            }
        }

        let submission = Submission {
            id: Uuid::new_v4(),
            form_id: submission.form_id,
            data: submission.data,
            email: submission.email,
            created_at: Utc::now(),
        };
        state.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn find_submission(&self, submission_id: Uuid) -> StoreResult<Option<Submission>> {
        Ok(self.read()?.submissions.get(&submission_id).cloned())
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> StoreResult<Vec<Submission>> {
        let state = self.read()?;
        let mut items: Vec<Submission> = state
            .submissions
            .values()
            .filter(|s| state.tenant_of_form(s.form_id) == Some(filter.tenant_id))
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        items.sort_by(newest_first);

        let take = filter.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(items
            .into_iter()
            .skip(filter.offset as usize)
            .take(take)
            .collect())
    }

    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<i64> {
        let state = self.read()?;
        let count = state
            .submissions
            .values()
            .filter(|s| state.tenant_of_form(s.form_id) == Some(filter.tenant_id))
            .filter(|s| filter.matches(s))
            .count();
        Ok(count as i64)
    }

    async fn create_notification_log(
        &self,
        log: NewNotificationLog,
    ) -> StoreResult<NotificationLog> {
        if self.fail_log_writes.load(Ordering::SeqCst) != 0 {
            return Err(StoreError::Database("simulated log write failure".into()));
        }

        let mut state = self.write()?;
        if !state.submissions.contains_key(&log.submission_id) {
            return Err(StoreError::NotFound("Submission"));
        }

        let log = NotificationLog {
            id: Uuid::new_v4(),
            submission_id: log.submission_id,
            form_id: log.form_id,
            notification_type: log.notification_type,
            status: log.status,
            recipient: log.recipient,
            error: log.error,
            metadata: log.metadata,
            created_at: Utc::now(),
        };
        state.logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn find_notification_logs(
        &self,
        submission_id: Uuid,
    ) -> StoreResult<Vec<NotificationLog>> {
        self.find_notification_logs_for(&[submission_id]).await
    }

    async fn find_notification_logs_for(
        &self,
        submission_ids: &[Uuid],
    ) -> StoreResult<Vec<NotificationLog>> {
        let mut logs: Vec<NotificationLog> = self
            .read()?
            .logs
            .values()
            .filter(|l| submission_ids.contains(&l.submission_id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(logs)
    }

    async fn count_notification_attempts_since(
        &self,
        form_id: Uuid,
        notification_type: NotificationType,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let count = self
            .read()?
            .logs
            .values()
            .filter(|l| {
                l.form_id == form_id
                    && l.notification_type == notification_type
                    && l.status.is_attempt()
                    && l.created_at >= since
            })
            .count();
        Ok(count as i64)
    }

    async fn find_email_settings(&self, form_id: Uuid) -> StoreResult<Option<EmailSettings>> {
        Ok(self.read()?.email_settings.get(&form_id).cloned())
    }

    async fn get_or_create_email_settings(&self, form_id: Uuid) -> StoreResult<EmailSettings> {
        let mut state = self.write()?;
        if !state.forms.contains_key(&form_id) {
            return Err(StoreError::NotFound("Form"));
        }
        let settings = state
            .email_settings
            .entry(form_id)
            .or_insert_with(|| EmailSettings::new_default(form_id, Utc::now()));
        Ok(settings.clone())
    }

    async fn upsert_email_settings(&self, settings: &EmailSettings) -> StoreResult<EmailSettings> {
        let mut state = self.write()?;
        if !state.forms.contains_key(&settings.form_id) {
            return Err(StoreError::NotFound("Form"));
        }
        let stored = match state.email_settings.get(&settings.form_id) {
            Some(existing) => EmailSettings {
                id: existing.id,
                created_at: existing.created_at,
                last_notification_sent_at: existing.last_notification_sent_at,
                ..settings.clone()
            },
            None => settings.clone(),
        };
        state.email_settings.insert(settings.form_id, stored.clone());
        Ok(stored)
    }

    async fn mark_notification_sent(&self, form_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(settings) = self.write()?.email_settings.get_mut(&form_id) {
            settings.last_notification_sent_at = Some(at);
        }
        Ok(())
    }

    async fn find_global_settings(&self, tenant_id: Uuid) -> StoreResult<Option<GlobalSettings>> {
        Ok(self.read()?.global_settings.get(&tenant_id).cloned())
    }

    async fn upsert_global_settings(
        &self,
        settings: &GlobalSettings,
    ) -> StoreResult<GlobalSettings> {
        let mut state = self.write()?;
        let stored = match state.global_settings.get(&settings.tenant_id) {
            Some(existing) => GlobalSettings {
                created_at: existing.created_at,
                ..settings.clone()
            },
            None => settings.clone(),
        };
        state.global_settings.insert(settings.tenant_id, stored.clone());
        Ok(stored)
    }

    async fn delete_form_cascade(&self, form_id: Uuid) -> StoreResult<CascadeSummary> {
        let mut state = self.write()?;
        if !state.forms.contains_key(&form_id) {
            return Err(StoreError::NotFound("Form"));
        }

        let mut next = state.clone();
        let mut summary = CascadeSummary::default();

        let before = next.logs.len();
        next.logs.retain(|_, l| l.form_id != form_id);
        summary.notification_logs = (before - next.logs.len()) as u64;
        self.check_cascade_step(1)?;

        let before = next.submissions.len();
        next.submissions.retain(|_, s| s.form_id != form_id);
        summary.submissions = (before - next.submissions.len()) as u64;
        self.check_cascade_step(2)?;

        summary.email_settings = u64::from(next.email_settings.remove(&form_id).is_some());
        self.check_cascade_step(3)?;

        summary.forms = u64::from(next.forms.remove(&form_id).is_some());
        self.check_cascade_step(4)?;

        *state = next;
        Ok(summary)
    }

    async fn delete_submission_cascade(&self, submission_id: Uuid) -> StoreResult<CascadeSummary> {
        let mut state = self.write()?;
        if !state.submissions.contains_key(&submission_id) {
            return Err(StoreError::NotFound("Submission"));
        }

        let mut next = state.clone();
        let mut summary = CascadeSummary::default();

        let before = next.logs.len();
        next.logs.retain(|_, l| l.submission_id != submission_id);
        summary.notification_logs = (before - next.logs.len()) as u64;
        self.check_cascade_step(1)?;

        summary.submissions = u64::from(next.submissions.remove(&submission_id).is_some());
        self.check_cascade_step(2)?;

        *state = next;
        Ok(summary)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}
