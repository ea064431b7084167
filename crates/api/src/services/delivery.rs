//! Notification delivery.
//!
//! Executes a [`NotificationPlan`]: both channels run concurrently, each
//! with its own send deadline, and every outcome is written as a
//! notification log. Delivery never fails the submission.

use chrono::Utc;
use domain::models::{
    EmailSettings, Form, NewNotificationLog, NotificationLog, NotificationStatus,
    NotificationType, Submission,
};
use domain::services::{
    render_confirmation, render_developer_notice, ChannelDecision, MailError, MailMessage,
    MailTransport, NotificationPlan,
};
use domain::store::FormStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::middleware::metrics::record_notification;

#[derive(Clone)]
pub struct DeliveryExecutor {
    store: Arc<dyn FormStore>,
    mailer: Arc<dyn MailTransport>,
    default_from: String,
    send_timeout: Duration,
}

impl DeliveryExecutor {
    pub fn new(
        store: Arc<dyn FormStore>,
        mailer: Arc<dyn MailTransport>,
        default_from: impl Into<String>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            mailer,
            default_from: default_from.into(),
            send_timeout,
        }
    }

    /// Runs both channels and returns the logs that were persisted.
    pub async fn deliver(
        &self,
        plan: &NotificationPlan,
        submission: &Submission,
        form: &Form,
        settings: Option<&EmailSettings>,
    ) -> Vec<NotificationLog> {
        let confirmation = self.run_channel(
            submission,
            NotificationType::SubmissionConfirmation,
            &plan.confirmation,
            |recipient| {
                render_confirmation(settings, form, submission, recipient, &self.default_from)
            },
        );
        let developer = self.run_channel(
            submission,
            NotificationType::DeveloperNotification,
            &plan.developer,
            |recipient| render_developer_notice(form, submission, recipient, &self.default_from),
        );

        let (confirmation, developer) = tokio::join!(confirmation, developer);

        if settings.is_some()
            && developer
                .as_ref()
                .is_some_and(|log| log.status == NotificationStatus::Sent)
        {
            if let Err(err) = self.store.mark_notification_sent(form.id, Utc::now()).await {
                warn!(form_id = %form.id, error = %err, "Failed to update last notification time");
            }
        }

        confirmation.into_iter().chain(developer).collect()
    }

    async fn run_channel<F>(
        &self,
        submission: &Submission,
        notification_type: NotificationType,
        decision: &ChannelDecision,
        render: F,
    ) -> Option<NotificationLog>
    where
        F: FnOnce(&str) -> MailMessage,
    {
        let new_log = match decision {
            ChannelDecision::Skip { reason } => NewNotificationLog::skipped(
                submission.id,
                submission.form_id,
                notification_type,
                reason.clone(),
            ),
            ChannelDecision::Send { recipient } => {
                let message = render(recipient);
                self.attempt(submission, notification_type, recipient, &message)
                    .await
                    .with_metadata(json!({
                        "transport": self.mailer.name(),
                        "subject": message.subject,
                    }))
            }
        };

        record_notification(notification_type, new_log.status);
        self.persist(new_log).await
    }

    async fn attempt(
        &self,
        submission: &Submission,
        notification_type: NotificationType,
        recipient: &str,
        message: &MailMessage,
    ) -> NewNotificationLog {
        let outcome = match tokio::time::timeout(self.send_timeout, self.mailer.send(message)).await
        {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(self.send_timeout.as_secs())),
        };

        match outcome {
            Ok(()) => {
                info!(
                    submission_id = %submission.id,
                    notification_type = notification_type.as_str(),
                    "Notification sent"
                );
                NewNotificationLog::sent(
                    submission.id,
                    submission.form_id,
                    notification_type,
                    recipient,
                )
            }
            Err(err) => {
                warn!(
                    submission_id = %submission.id,
                    notification_type = notification_type.as_str(),
                    error = %err,
                    "Notification failed"
                );
                NewNotificationLog::failed(
                    submission.id,
                    submission.form_id,
                    notification_type,
                    recipient,
                    err.to_string(),
                )
            }
        }
    }

    /// A failed write is reported and dropped.
    async fn persist(&self, log: NewNotificationLog) -> Option<NotificationLog> {
        let submission_id = log.submission_id;
        let notification_type = log.notification_type;
        match self.store.create_notification_log(log).await {
            Ok(log) => Some(log),
            Err(err) => {
                error!(
                    submission_id = %submission_id,
                    notification_type = notification_type.as_str(),
                    error = %err,
                    "Failed to write notification log"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::models::{NewForm, NewSubmission};
    use domain::services::MockMailTransport;
    use persistence::InMemoryFormStore;

    struct SlowTransport;

    #[async_trait]
    impl MailTransport for SlowTransport {
        async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    async fn fixture(store: &Arc<InMemoryFormStore>) -> (Form, Submission) {
        let tenant = store
            .find_or_create_tenant("user_1", "owner@acme.io")
            .await
            .unwrap();
        let form = store
            .create_form(NewForm {
                tenant_id: tenant.id,
                name: "Contact".into(),
                description: None,
                schema: json!({ "fields": [] }),
            })
            .await
            .unwrap();
        let submission = store
            .create_submission(NewSubmission::new(
                form.id,
                json!({ "email": "a@b.com", "_meta": { "browser": "Chrome" } }),
            ))
            .await
            .unwrap();
        (form, submission)
    }

    fn send_both() -> NotificationPlan {
        NotificationPlan {
            confirmation: ChannelDecision::Send {
                recipient: "a@b.com".into(),
            },
            developer: ChannelDecision::Send {
                recipient: "owner@acme.io".into(),
            },
        }
    }

    fn executor(
        store: Arc<InMemoryFormStore>,
        mailer: Arc<dyn MailTransport>,
        timeout: Duration,
    ) -> DeliveryExecutor {
        DeliveryExecutor::new(store, mailer, "noreply@forms.test", timeout)
    }

    #[tokio::test]
    async fn test_both_channels_sent() {
        let store = Arc::new(InMemoryFormStore::new());
        let (form, submission) = fixture(&store).await;
        let mailer = Arc::new(MockMailTransport::new());
        let delivery = executor(store.clone(), mailer.clone(), Duration::from_secs(1));

        let logs = delivery.deliver(&send_both(), &submission, &form, None).await;

        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.status == NotificationStatus::Sent));
        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(
            store.find_notification_logs(submission.id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_one_channel_failure_is_isolated() {
        let store = Arc::new(InMemoryFormStore::new());
        let (form, submission) = fixture(&store).await;
        let mailer = Arc::new(MockMailTransport::failing_for("owner@acme.io"));
        let delivery = executor(store.clone(), mailer, Duration::from_secs(1));

        let logs = delivery.deliver(&send_both(), &submission, &form, None).await;

        let confirmation = logs
            .iter()
            .find(|l| l.notification_type == NotificationType::SubmissionConfirmation)
            .unwrap();
        let developer = logs
            .iter()
            .find(|l| l.notification_type == NotificationType::DeveloperNotification)
            .unwrap();
        assert_eq!(confirmation.status, NotificationStatus::Sent);
        assert_eq!(developer.status, NotificationStatus::Failed);
        assert!(developer.error.as_deref().unwrap().contains("Simulated failure"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_log() {
        let store = Arc::new(InMemoryFormStore::new());
        let (form, submission) = fixture(&store).await;
        let delivery = executor(store, Arc::new(SlowTransport), Duration::from_millis(20));

        let logs = delivery.deliver(&send_both(), &submission, &form, None).await;

        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.status == NotificationStatus::Failed));
        assert!(logs[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_skip_writes_skipped_log_without_sending() {
        let store = Arc::new(InMemoryFormStore::new());
        let (form, submission) = fixture(&store).await;
        let mailer = Arc::new(MockMailTransport::new());
        let delivery = executor(store, mailer.clone(), Duration::from_secs(1));

        let plan = NotificationPlan {
            confirmation: ChannelDecision::Skip {
                reason: "submitter confirmations are disabled".into(),
            },
            developer: ChannelDecision::Skip {
                reason: "developer notifications are disabled".into(),
            },
        };
        let logs = delivery.deliver(&plan, &submission, &form, None).await;

        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.status == NotificationStatus::Skipped));
        assert!(logs.iter().all(|l| l.recipient.is_none()));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_log_write_failure_does_not_panic() {
        let store = Arc::new(InMemoryFormStore::new());
        let (form, submission) = fixture(&store).await;
        store.fail_log_writes(true);
        let mailer = Arc::new(MockMailTransport::new());
        let delivery = executor(store, mailer.clone(), Duration::from_secs(1));

        let logs = delivery.deliver(&send_both(), &submission, &form, None).await;

        assert!(logs.is_empty());
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_sent_developer_notice_marks_settings() {
        let store = Arc::new(InMemoryFormStore::new());
        let (form, submission) = fixture(&store).await;
        let settings = store.get_or_create_email_settings(form.id).await.unwrap();
        assert!(settings.last_notification_sent_at.is_none());

        let delivery = executor(
            store.clone(),
            Arc::new(MockMailTransport::new()),
            Duration::from_secs(1),
        );
        delivery
            .deliver(&send_both(), &submission, &form, Some(&settings))
            .await;

        let settings = store.find_email_settings(form.id).await.unwrap().unwrap();
        assert!(settings.last_notification_sent_at.is_some());
    }
}
