//! Read-time reconciliation of notification logs.
//!
//! Guarantees one effective entry per addressable channel for every
//! submission. Nothing synthesized here is ever persisted.

use serde_json::json;
use std::cmp::Ordering;

use super::notification::{evaluate_confirmation, evaluate_developer, ChannelDecision, NotificationContext};
use crate::models::{
    DisplayLog, NotificationLog, NotificationStatus, NotificationType, Submission,
    ADDRESSABLE_TYPES,
};

/// Error recorded on an eligible channel with no persisted attempt.
pub const MISSING_ATTEMPT_ERROR: &str = "no delivery attempt was recorded";

/// Builds the display logs for one submission.
///
/// `persisted` may contain logs of other submissions; they are ignored.
pub fn reconcile(
    submission: &Submission,
    persisted: &[NotificationLog],
    ctx: &NotificationContext,
) -> Vec<DisplayLog> {
    let own: Vec<&NotificationLog> = persisted
        .iter()
        .filter(|log| log.submission_id == submission.id)
        .collect();

    let mut logs: Vec<DisplayLog> = ADDRESSABLE_TYPES
        .iter()
        .map(|&notification_type| match newest_of(&own, notification_type) {
            Some(log) => DisplayLog::from(log.clone()),
            None => synthesize(submission, ctx, notification_type),
        })
        .collect();

    if let Some(digest) = newest_of(&own, NotificationType::Digest) {
        logs.push(DisplayLog::from(digest.clone()));
    }

    logs.sort_by(display_order);
    logs
}

fn newest_of<'a>(
    logs: &[&'a NotificationLog],
    notification_type: NotificationType,
) -> Option<&'a NotificationLog> {
    logs.iter()
        .copied()
        .filter(|log| log.notification_type == notification_type)
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

fn synthesize(
    submission: &Submission,
    ctx: &NotificationContext,
    notification_type: NotificationType,
) -> DisplayLog {
    let decision = match notification_type {
        NotificationType::SubmissionConfirmation => evaluate_confirmation(submission, ctx),
        _ => evaluate_developer(submission, ctx, None),
    };

    let (status, recipient, error) = match decision {
        ChannelDecision::Skip { reason } => (NotificationStatus::Skipped, None, reason),
        ChannelDecision::Send { recipient } => (
            NotificationStatus::Failed,
            Some(recipient),
            MISSING_ATTEMPT_ERROR.to_string(),
        ),
    };

    DisplayLog {
        id: None,
        submission_id: submission.id,
        form_id: submission.form_id,
        notification_type,
        status,
        recipient,
        error: Some(error),
        metadata: json!({}),
        created_at: submission.created_at,
        synthesized: true,
    }
}

/// Type name ascending, newest first within a type, then id.
pub fn display_order(a: &DisplayLog, b: &DisplayLog) -> Ordering {
    a.notification_type
        .as_str()
        .cmp(b.notification_type.as_str())
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailSettings, PlanTier};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn submission(email: Option<&str>) -> Submission {
        let data = match email {
            Some(email) => json!({ "email": email }),
            None => json!({}),
        };
        Submission {
            id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            data,
            email: email.map(String::from),
            created_at: Utc::now(),
        }
    }

    fn ctx(plan: PlanTier, settings: Option<EmailSettings>) -> NotificationContext {
        NotificationContext {
            email_settings: settings,
            global_settings: None,
            entitlements: plan.entitlements(),
            tenant_email: "owner@acme.io".into(),
        }
    }

    fn log(
        submission: &Submission,
        notification_type: NotificationType,
        status: NotificationStatus,
        age_minutes: i64,
    ) -> NotificationLog {
        NotificationLog {
            id: Uuid::new_v4(),
            submission_id: submission.id,
            form_id: submission.form_id,
            notification_type,
            status,
            recipient: None,
            error: None,
            metadata: json!({}),
            created_at: submission.created_at + Duration::seconds(5) - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn test_synthesizes_skipped_when_settings_absent() {
        let s = submission(Some("a@b.com"));
        let logs = reconcile(&s, &[], &ctx(PlanTier::Pro, None));

        assert_eq!(logs.len(), 2);
        let confirmation = logs
            .iter()
            .find(|l| l.notification_type == NotificationType::SubmissionConfirmation)
            .unwrap();
        assert_eq!(confirmation.status, NotificationStatus::Skipped);
        assert!(confirmation.synthesized);
        assert!(confirmation.error.as_deref().is_some_and(|r| !r.is_empty()));
    }

    #[test]
    fn test_synthesizes_failed_when_eligible_but_unrecorded() {
        let s = submission(Some("a@b.com"));
        let mut settings = EmailSettings::new_default(s.form_id, Utc::now());
        settings.enabled = true;

        let logs = reconcile(&s, &[], &ctx(PlanTier::Pro, Some(settings)));
        let confirmation = logs
            .iter()
            .find(|l| l.notification_type == NotificationType::SubmissionConfirmation)
            .unwrap();
        assert_eq!(confirmation.status, NotificationStatus::Failed);
        assert_eq!(confirmation.error.as_deref(), Some(MISSING_ATTEMPT_ERROR));
        assert_eq!(confirmation.recipient.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_uses_newest_persisted_log() {
        let s = submission(Some("a@b.com"));
        let old = log(&s, NotificationType::SubmissionConfirmation, NotificationStatus::Failed, 10);
        let new = log(&s, NotificationType::SubmissionConfirmation, NotificationStatus::Sent, 0);

        let logs = reconcile(&s, &[old, new.clone()], &ctx(PlanTier::Pro, None));
        let confirmations: Vec<_> = logs
            .iter()
            .filter(|l| l.notification_type == NotificationType::SubmissionConfirmation)
            .collect();
        assert_eq!(confirmations.len(), 1);
        assert_eq!(confirmations[0].id, Some(new.id));
        assert!(!confirmations[0].synthesized);
    }

    #[test]
    fn test_digest_passed_through_not_synthesized() {
        let s = submission(None);
        let without = reconcile(&s, &[], &ctx(PlanTier::Free, None));
        assert!(without
            .iter()
            .all(|l| l.notification_type != NotificationType::Digest));

        let digest = log(&s, NotificationType::Digest, NotificationStatus::Sent, 0);
        let with = reconcile(&s, &[digest.clone()], &ctx(PlanTier::Free, None));
        assert_eq!(with.len(), 3);
        assert!(with.iter().any(|l| l.id == Some(digest.id)));
    }

    #[test]
    fn test_ignores_other_submissions() {
        let s = submission(None);
        let other = submission(None);
        let foreign = log(&other, NotificationType::DeveloperNotification, NotificationStatus::Sent, 0);

        let logs = reconcile(&s, &[foreign], &ctx(PlanTier::Free, None));
        assert!(logs.iter().all(|l| l.synthesized));
    }

    #[test]
    fn test_display_order_by_type_name() {
        let s = submission(None);
        let digest = log(&s, NotificationType::Digest, NotificationStatus::Sent, 0);
        let logs = reconcile(&s, &[digest], &ctx(PlanTier::Free, None));

        let order: Vec<_> = logs.iter().map(|l| l.notification_type.as_str()).collect();
        assert_eq!(
            order,
            vec!["DEVELOPER_NOTIFICATION", "DIGEST", "SUBMISSION_CONFIRMATION"]
        );
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let s = submission(Some("a@b.com"));
        let logs = vec![
            log(&s, NotificationType::DeveloperNotification, NotificationStatus::Sent, 1),
            log(&s, NotificationType::DeveloperNotification, NotificationStatus::Failed, 2),
        ];
        let c = ctx(PlanTier::Standard, None);
        assert_eq!(reconcile(&s, &logs, &c), reconcile(&s, &logs, &c));
    }
}
