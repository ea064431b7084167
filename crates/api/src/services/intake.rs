//! Submission intake pipeline.
//!
//! Order of operations for a public submission:
//! 1. resolve the form and its tenant
//! 2. check the monthly submission quota
//! 3. enrich the data with `_meta` and persist it
//! 4. decide and deliver notifications
//!
//! The quota check and the insert are separate store calls, so concurrent
//! submissions at the limit can both pass.

use chrono::{Duration as ChronoDuration, Utc};
use domain::models::{
    NewSubmission, NotificationLog, NotificationType, RequestContext, Submission, META_KEY,
};
use domain::services::{
    decide, enrich, NotificationContext, NotificationPlan, QuotaDecision, QuotaKind, QuotaLedger,
    RequestMetadata,
};
use domain::store::{FormStore, StoreError};
use domain::DomainError;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::delivery::DeliveryExecutor;
use crate::middleware::metrics::{record_quota_denial, record_submission_received};

/// Result of a successful intake.
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub submission: Submission,
    /// `None` when notification settings could not be loaded.
    pub plan: Option<NotificationPlan>,
    pub logs: Vec<NotificationLog>,
}

#[derive(Clone)]
pub struct IntakeService {
    store: Arc<dyn FormStore>,
    quota: QuotaLedger,
    delivery: DeliveryExecutor,
}

/// Rejects anything but a JSON object without a top-level `_meta` key.
pub fn validate_payload(data: JsonValue) -> Result<Map<String, JsonValue>, DomainError> {
    let JsonValue::Object(data) = data else {
        return Err(DomainError::Validation(
            "Submission data must be a JSON object".into(),
        ));
    };
    if data.contains_key(META_KEY) {
        return Err(DomainError::Validation(format!(
            "The '{}' field is reserved",
            META_KEY
        )));
    }
    Ok(data)
}

/// Checks a quota and counts the denial before failing with
/// [`DomainError::QuotaExceeded`].
pub async fn enforce_quota(
    quota: &QuotaLedger,
    ctx: &RequestContext,
    kind: QuotaKind,
) -> Result<(), DomainError> {
    let decision = quota.check_and_reserve(ctx, kind).await?;
    if let QuotaDecision::Denied { .. } = decision {
        record_quota_denial(kind);
    }
    decision.into_result(kind)
}

impl IntakeService {
    pub fn new(store: Arc<dyn FormStore>, delivery: DeliveryExecutor) -> Self {
        Self {
            quota: QuotaLedger::new(store.clone()),
            store,
            delivery,
        }
    }

    pub async fn submit(
        &self,
        form_id: Uuid,
        data: JsonValue,
        request: &RequestMetadata,
    ) -> Result<IntakeOutcome, DomainError> {
        let data = validate_payload(data)?;

        let form = self
            .store
            .find_form(form_id)
            .await?
            .ok_or(DomainError::NotFound("Form"))?;
        let tenant = self
            .store
            .find_tenant(form.tenant_id)
            .await?
            .ok_or(DomainError::NotFound("Form"))?;
        let ctx = tenant.context();

        enforce_quota(&self.quota, &ctx, QuotaKind::MonthlySubmissions).await?;

        let enriched = JsonValue::Object(enrich(&data, request));
        let new_submission = NewSubmission::new(form.id, enriched);
        let submission = self
            .store
            .create_submission(new_submission)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => DomainError::DuplicateSubmission,
                other => other.into(),
            })?;

        record_submission_received(ctx.plan.as_str());
        info!(
            submission_id = %submission.id,
            form_id = %form.id,
            tenant_id = %tenant.id,
            "Submission stored"
        );

        let (notification_ctx, recent_attempts) =
            match self.notification_context(&ctx, form.id).await {
                Ok(loaded) => loaded,
                Err(err) => {
                    error!(
                        submission_id = %submission.id,
                        error = %err,
                        "Failed to load notification settings; skipping delivery"
                    );
                    return Ok(IntakeOutcome {
                        submission,
                        plan: None,
                        logs: Vec::new(),
                    });
                }
            };

        let plan = decide(&submission, &notification_ctx, recent_attempts);
        info!(
            submission_id = %submission.id,
            confirmation = plan.confirmation.is_send(),
            developer = plan.developer.is_send(),
            "Notification plan decided"
        );

        let logs = self
            .delivery
            .deliver(
                &plan,
                &submission,
                &form,
                notification_ctx.email_settings.as_ref(),
            )
            .await;

        Ok(IntakeOutcome {
            submission,
            plan: Some(plan),
            logs,
        })
    }

    /// Settings for the decision plus developer attempts in the last hour.
    async fn notification_context(
        &self,
        ctx: &RequestContext,
        form_id: Uuid,
    ) -> Result<(NotificationContext, i64), StoreError> {
        let email_settings = self.store.find_email_settings(form_id).await?;
        let global_settings = self.store.find_global_settings(ctx.tenant_id).await?;
        let recent_attempts = self
            .store
            .count_notification_attempts_since(
                form_id,
                NotificationType::DeveloperNotification,
                Utc::now() - ChronoDuration::hours(1),
            )
            .await?;

        Ok((
            NotificationContext {
                email_settings,
                global_settings,
                entitlements: ctx.entitlements(),
                tenant_email: ctx.email.clone(),
            },
            recent_attempts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{NewForm, NotificationStatus, PlanTier, UpdateEmailSettingsRequest};
    use domain::services::{MailTransport, MockMailTransport};
    use persistence::InMemoryFormStore;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        store: Arc<InMemoryFormStore>,
        mailer: Arc<MockMailTransport>,
        intake: IntakeService,
    }

    fn harness_with(mailer: MockMailTransport) -> Harness {
        let store = Arc::new(InMemoryFormStore::new());
        let mailer = Arc::new(mailer);
        let transport: Arc<dyn MailTransport> = mailer.clone();
        let delivery = DeliveryExecutor::new(
            store.clone(),
            transport,
            "noreply@forms.test",
            Duration::from_secs(1),
        );
        Harness {
            intake: IntakeService::new(store.clone(), delivery),
            store,
            mailer,
        }
    }

    fn harness() -> Harness {
        harness_with(MockMailTransport::new())
    }

    async fn seed_form(store: &InMemoryFormStore, plan: PlanTier) -> Uuid {
        let tenant = store
            .find_or_create_tenant("user_1", "owner@acme.io")
            .await
            .unwrap();
        store.set_plan(tenant.id, plan).unwrap();
        store
            .create_form(NewForm {
                tenant_id: tenant.id,
                name: "Contact".into(),
                description: None,
                schema: json!({ "fields": [] }),
            })
            .await
            .unwrap()
            .id
    }

    async fn enable_all(store: &InMemoryFormStore, form_id: Uuid) {
        let mut settings = store.get_or_create_email_settings(form_id).await.unwrap();
        UpdateEmailSettingsRequest {
            enabled: Some(true),
            developer_notifications_enabled: Some(true),
            ..Default::default()
        }
        .apply_to(&mut settings, Utc::now());
        store.upsert_email_settings(&settings).await.unwrap();
    }

    fn log_of(logs: &[NotificationLog], t: NotificationType) -> &NotificationLog {
        logs.iter().find(|l| l.notification_type == t).unwrap()
    }

    #[test]
    fn test_validate_payload() {
        assert!(validate_payload(json!({ "a": 1 })).is_ok());
        assert!(matches!(
            validate_payload(json!([1, 2])),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            validate_payload(json!({ "_meta": {} })),
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_pro_submission_sends_both() {
        let h = harness();
        let form_id = seed_form(&h.store, PlanTier::Pro).await;
        enable_all(&h.store, form_id).await;

        let outcome = h
            .intake
            .submit(
                form_id,
                json!({ "email": "a@b.com", "name": "A" }),
                &RequestMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.logs.len(), 2);
        let confirmation = log_of(&outcome.logs, NotificationType::SubmissionConfirmation);
        assert_eq!(confirmation.status, NotificationStatus::Sent);
        assert_eq!(confirmation.recipient.as_deref(), Some("a@b.com"));
        let developer = log_of(&outcome.logs, NotificationType::DeveloperNotification);
        assert_eq!(developer.status, NotificationStatus::Sent);
        assert_eq!(developer.recipient.as_deref(), Some("owner@acme.io"));
        assert_eq!(h.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_stored_data_keeps_keys_and_adds_meta() {
        let h = harness();
        let form_id = seed_form(&h.store, PlanTier::Free).await;

        let outcome = h
            .intake
            .submit(
                form_id,
                json!({ "email": " A@B.com ", "name": "A", "n": 3 }),
                &RequestMetadata {
                    user_agent: Some("Mozilla/5.0 (Windows NT 10.0) Chrome/120.0".into()),
                    country: Some("DE".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let data = &outcome.submission.data;
        assert_eq!(data["email"], " A@B.com ");
        assert_eq!(data["name"], "A");
        assert_eq!(data["n"], 3);
        assert_eq!(data["_meta"]["country"], "DE");
        assert_eq!(outcome.submission.email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_free_plan_skips_confirmation() {
        let h = harness();
        let form_id = seed_form(&h.store, PlanTier::Free).await;
        enable_all(&h.store, form_id).await;

        let outcome = h
            .intake
            .submit(form_id, json!({ "email": "a@b.com" }), &RequestMetadata::default())
            .await
            .unwrap();

        let confirmation = log_of(&outcome.logs, NotificationType::SubmissionConfirmation);
        assert_eq!(confirmation.status, NotificationStatus::Skipped);
        assert!(confirmation.error.is_some());
    }

    #[tokio::test]
    async fn test_failed_send_is_logged_not_raised() {
        let h = harness_with(MockMailTransport::failing());
        let form_id = seed_form(&h.store, PlanTier::Standard).await;
        enable_all(&h.store, form_id).await;

        let outcome = h
            .intake
            .submit(form_id, json!({ "email": "a@b.com" }), &RequestMetadata::default())
            .await
            .unwrap();

        let confirmation = log_of(&outcome.logs, NotificationType::SubmissionConfirmation);
        assert_eq!(confirmation.status, NotificationStatus::Failed);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let h = harness();
        let form_id = seed_form(&h.store, PlanTier::Free).await;
        let meta = RequestMetadata::default();

        h.intake
            .submit(form_id, json!({ "email": "a@b.com" }), &meta)
            .await
            .unwrap();
        let err = h
            .intake
            .submit(form_id, json!({ "email": "A@b.com" }), &meta)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::DuplicateSubmission));
        assert_eq!(h.store.row_counts().unwrap().submissions, 1);
    }

    #[tokio::test]
    async fn test_monthly_quota_blocks_without_writing() {
        let h = harness();
        let form_id = seed_form(&h.store, PlanTier::Free).await;
        let meta = RequestMetadata::default();

        for i in 0..100 {
            h.intake
                .submit(form_id, json!({ "i": i }), &meta)
                .await
                .unwrap();
        }
        let err = h
            .intake
            .submit(form_id, json!({ "i": 100 }), &meta)
            .await
            .unwrap_err();

        match err {
            DomainError::QuotaExceeded { current, limit, .. } => {
                assert_eq!(current, 100);
                assert_eq!(limit, 100);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.store.row_counts().unwrap().submissions, 100);
    }

    #[tokio::test]
    async fn test_unknown_form_not_found() {
        let h = harness();
        let err = h
            .intake
            .submit(Uuid::new_v4(), json!({}), &RequestMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("Form")));
    }

    #[tokio::test]
    async fn test_developer_rate_limit_skips() {
        let h = harness();
        let form_id = seed_form(&h.store, PlanTier::Pro).await;
        let mut settings = h.store.get_or_create_email_settings(form_id).await.unwrap();
        settings.developer_notifications_enabled = true;
        settings.max_notifications_per_hour = 1;
        h.store.upsert_email_settings(&settings).await.unwrap();
        let meta = RequestMetadata::default();

        let first = h.intake.submit(form_id, json!({ "i": 1 }), &meta).await.unwrap();
        let second = h.intake.submit(form_id, json!({ "i": 2 }), &meta).await.unwrap();

        assert_eq!(
            log_of(&first.logs, NotificationType::DeveloperNotification).status,
            NotificationStatus::Sent
        );
        let throttled = log_of(&second.logs, NotificationType::DeveloperNotification);
        assert_eq!(throttled.status, NotificationStatus::Skipped);
        assert!(throttled.error.as_deref().unwrap().contains("1/1"));
    }
}
