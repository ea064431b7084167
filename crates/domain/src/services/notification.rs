//! Notification decision engine.
//!
//! Decides per submission whether the submitter confirmation and the
//! developer notice should be sent. The result is a plan; delivery happens
//! elsewhere.

use serde::Serialize;

use crate::models::{
    EmailSettings, Entitlements, GlobalSettings, Submission, DEFAULT_MAX_NOTIFICATIONS_PER_HOUR,
};

pub const REASON_PLAN_EXCLUDES_CONFIRMATIONS: &str =
    "plan does not include submitter confirmations";
pub const REASON_SETTINGS_NOT_CONFIGURED: &str = "email settings are not configured";
pub const REASON_CONFIRMATIONS_DISABLED: &str = "submitter confirmations are disabled";
pub const REASON_NO_SUBMITTER_EMAIL: &str = "submission has no valid email address";
pub const REASON_DEVELOPER_DISABLED: &str = "developer notifications are disabled";
pub const REASON_CONDITIONS_NOT_MET: &str = "notification conditions were not met";
pub const REASON_NO_DEVELOPER_RECIPIENT: &str = "no developer recipient is configured";

/// What to do with one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChannelDecision {
    Send { recipient: String },
    Skip { reason: String },
}

impl ChannelDecision {
    fn skip(reason: impl Into<String>) -> Self {
        ChannelDecision::Skip {
            reason: reason.into(),
        }
    }

    pub fn is_send(&self) -> bool {
        matches!(self, ChannelDecision::Send { .. })
    }
}

/// Decisions for both channels of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPlan {
    pub confirmation: ChannelDecision,
    pub developer: ChannelDecision,
}

/// Configuration the engine decides against.
#[derive(Debug, Clone)]
pub struct NotificationContext {
    pub email_settings: Option<EmailSettings>,
    pub global_settings: Option<GlobalSettings>,
    pub entitlements: Entitlements,
    /// Last-resort developer recipient.
    pub tenant_email: String,
}

impl NotificationContext {
    /// Hourly developer-notice ceiling in effect for the form.
    pub fn max_notifications_per_hour(&self) -> i64 {
        let max = self
            .email_settings
            .as_ref()
            .map(|s| s.max_notifications_per_hour)
            .unwrap_or(DEFAULT_MAX_NOTIFICATIONS_PER_HOUR);
        i64::from(max)
    }
}

/// Decides both channels.
///
/// `recent_developer_attempts` counts sent and failed developer notices for
/// the form in the trailing hour.
pub fn decide(
    submission: &Submission,
    ctx: &NotificationContext,
    recent_developer_attempts: i64,
) -> NotificationPlan {
    NotificationPlan {
        confirmation: evaluate_confirmation(submission, ctx),
        developer: evaluate_developer(submission, ctx, Some(recent_developer_attempts)),
    }
}

/// Confirmation has no tenant-level fallback: no settings, no confirmation.
pub fn evaluate_confirmation(submission: &Submission, ctx: &NotificationContext) -> ChannelDecision {
    if !ctx.entitlements.can_send_confirmations {
        return ChannelDecision::skip(REASON_PLAN_EXCLUDES_CONFIRMATIONS);
    }
    let Some(settings) = ctx.email_settings.as_ref() else {
        return ChannelDecision::skip(REASON_SETTINGS_NOT_CONFIGURED);
    };
    if !settings.enabled {
        return ChannelDecision::skip(REASON_CONFIRMATIONS_DISABLED);
    }
    match submission.submitter_email() {
        Some(recipient) => ChannelDecision::Send { recipient },
        None => ChannelDecision::skip(REASON_NO_SUBMITTER_EMAIL),
    }
}

/// Developer notice, evaluated independently of the confirmation.
///
/// `recent_attempts` is `None` when the hourly window is unknown (read-time
/// reconciliation); the rate check is then skipped.
pub fn evaluate_developer(
    submission: &Submission,
    ctx: &NotificationContext,
    recent_attempts: Option<i64>,
) -> ChannelDecision {
    let global = ctx.global_settings.as_ref();

    let enabled = match ctx.email_settings.as_ref() {
        Some(settings) => settings.developer_notifications_enabled,
        None => global.is_some_and(|g| g.developer_notifications_enabled),
    };
    if !enabled {
        return ChannelDecision::skip(REASON_DEVELOPER_DISABLED);
    }

    if let Some(settings) = ctx.email_settings.as_ref() {
        if !settings.conditions_match(&submission.data) {
            return ChannelDecision::skip(REASON_CONDITIONS_NOT_MET);
        }
    }

    let max = ctx.max_notifications_per_hour();
    if let Some(attempts) = recent_attempts {
        if attempts >= max {
            return ChannelDecision::skip(format!(
                "hourly developer notification limit reached ({}/{})",
                attempts, max
            ));
        }
    }

    let recipient = ctx
        .email_settings
        .as_ref()
        .and_then(|s| s.developer_email.clone())
        .or_else(|| global.and_then(|g| g.developer_email.clone()))
        .unwrap_or_else(|| ctx.tenant_email.clone());

    if shared::validation::is_plausible_email(&recipient) {
        ChannelDecision::Send {
            recipient: recipient.trim().to_string(),
        }
    } else {
        ChannelDecision::skip(REASON_NO_DEVELOPER_RECIPIENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionOperator, NotificationCondition, PlanTier};
    use chrono::Utc;
    use serde_json::{json, Value as JsonValue};
    use uuid::Uuid;

    fn submission(data: JsonValue) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            data,
            email: None,
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

    fn settings(enabled: bool, developer: bool) -> EmailSettings {
        let mut s = EmailSettings::new_default(Uuid::new_v4(), Utc::now());
        s.enabled = enabled;
        s.developer_notifications_enabled = developer;
        s
    }

    fn global(enabled: bool, email: Option<&str>) -> GlobalSettings {
        let mut g = GlobalSettings::new_default(Uuid::new_v4(), Utc::now());
        g.developer_notifications_enabled = enabled;
        g.developer_email = email.map(String::from);
        g
    }

    #[test]
    fn test_confirmation_sent_on_paid_plan_with_email() {
        let s = submission(json!({ "email": "a@b.com", "name": "A" }));
        for plan in [PlanTier::Standard, PlanTier::Pro] {
            let plan = decide(&s, &ctx(plan, Some(settings(true, false))), 0);
            assert_eq!(
                plan.confirmation,
                ChannelDecision::Send {
                    recipient: "a@b.com".into()
                }
            );
        }
    }

    #[test]
    fn test_confirmation_skipped_on_free_plan() {
        let s = submission(json!({ "email": "a@b.com" }));
        let plan = decide(&s, &ctx(PlanTier::Free, Some(settings(true, false))), 0);
        assert_eq!(
            plan.confirmation,
            ChannelDecision::skip(REASON_PLAN_EXCLUDES_CONFIRMATIONS)
        );
    }

    #[test]
    fn test_confirmation_skip_reasons() {
        let s = submission(json!({ "email": "a@b.com" }));
        assert_eq!(
            evaluate_confirmation(&s, &ctx(PlanTier::Pro, None)),
            ChannelDecision::skip(REASON_SETTINGS_NOT_CONFIGURED)
        );
        assert_eq!(
            evaluate_confirmation(&s, &ctx(PlanTier::Pro, Some(settings(false, false)))),
            ChannelDecision::skip(REASON_CONFIRMATIONS_DISABLED)
        );

        let no_email = submission(json!({ "email": "not-an-email" }));
        assert_eq!(
            evaluate_confirmation(&no_email, &ctx(PlanTier::Pro, Some(settings(true, false)))),
            ChannelDecision::skip(REASON_NO_SUBMITTER_EMAIL)
        );
    }

    #[test]
    fn test_developer_independent_of_confirmation() {
        let s = submission(json!({ "name": "A" }));
        let plan = decide(&s, &ctx(PlanTier::Free, Some(settings(false, true))), 0);
        assert!(!plan.confirmation.is_send());
        assert_eq!(
            plan.developer,
            ChannelDecision::Send {
                recipient: "owner@acme.io".into()
            }
        );
    }

    #[test]
    fn test_developer_falls_back_to_global_settings() {
        let s = submission(json!({}));
        let mut c = ctx(PlanTier::Pro, None);
        assert_eq!(
            evaluate_developer(&s, &c, Some(0)),
            ChannelDecision::skip(REASON_DEVELOPER_DISABLED)
        );

        c.global_settings = Some(global(true, Some("ops@acme.io")));
        assert_eq!(
            evaluate_developer(&s, &c, Some(0)),
            ChannelDecision::Send {
                recipient: "ops@acme.io".into()
            }
        );
    }

    #[test]
    fn test_form_settings_override_global_toggle() {
        let s = submission(json!({}));
        let mut c = ctx(PlanTier::Pro, Some(settings(true, false)));
        c.global_settings = Some(global(true, None));
        assert_eq!(
            evaluate_developer(&s, &c, Some(0)),
            ChannelDecision::skip(REASON_DEVELOPER_DISABLED)
        );
    }

    #[test]
    fn test_developer_recipient_precedence() {
        let s = submission(json!({}));
        let mut form_settings = settings(false, true);
        form_settings.developer_email = Some("dev@acme.io".into());
        let mut c = ctx(PlanTier::Pro, Some(form_settings));
        c.global_settings = Some(global(false, Some("ops@acme.io")));
        assert_eq!(
            evaluate_developer(&s, &c, Some(0)),
            ChannelDecision::Send {
                recipient: "dev@acme.io".into()
            }
        );

        c.email_settings.as_mut().unwrap().developer_email = None;
        assert_eq!(
            evaluate_developer(&s, &c, Some(0)),
            ChannelDecision::Send {
                recipient: "ops@acme.io".into()
            }
        );
    }

    #[test]
    fn test_developer_rate_limit() {
        let s = submission(json!({}));
        let c = ctx(PlanTier::Pro, Some(settings(false, true)));
        assert!(evaluate_developer(&s, &c, Some(9)).is_send());

        match evaluate_developer(&s, &c, Some(10)) {
            ChannelDecision::Skip { reason } => assert!(reason.contains("10/10")),
            other => panic!("expected skip, got {other:?}"),
        }

        assert!(evaluate_developer(&s, &c, None).is_send());
    }

    #[test]
    fn test_confirmation_not_rate_limited() {
        let s = submission(json!({ "email": "a@b.com" }));
        let plan = decide(&s, &ctx(PlanTier::Pro, Some(settings(true, true))), 1_000);
        assert!(plan.confirmation.is_send());
        assert!(!plan.developer.is_send());
    }

    #[test]
    fn test_developer_conditions() {
        let mut form_settings = settings(false, true);
        form_settings.notification_conditions = vec![NotificationCondition {
            field: "priority".into(),
            operator: ConditionOperator::Equals,
            value: Some(json!("high")),
        }];
        let c = ctx(PlanTier::Pro, Some(form_settings));

        assert!(evaluate_developer(&submission(json!({ "priority": "high" })), &c, Some(0)).is_send());
        assert_eq!(
            evaluate_developer(&submission(json!({ "priority": "low" })), &c, Some(0)),
            ChannelDecision::skip(REASON_CONDITIONS_NOT_MET)
        );
    }

    #[test]
    fn test_implausible_developer_recipient_skipped() {
        let mut c = ctx(PlanTier::Pro, Some(settings(false, true)));
        c.tenant_email = "owner".into();
        assert_eq!(
            evaluate_developer(&submission(json!({})), &c, Some(0)),
            ChannelDecision::skip(REASON_NO_DEVELOPER_RECIPIENT)
        );
    }
}
