//! Domain models for the form backend.

pub mod email_settings;
pub mod form;
pub mod global_settings;
pub mod notification_log;
pub mod plan;
pub mod submission;
pub mod tenant;
pub mod usage;

pub use email_settings::{
    ConditionOperator, EmailSettings, NotificationCondition, UpdateEmailSettingsRequest,
    DEFAULT_MAX_NOTIFICATIONS_PER_HOUR,
};
pub use form::{
    find_template, form_templates, CreateFormRequest, CreateFromTemplateRequest, Form,
    FormTemplate, NewForm, INITIAL_SCHEMA_VERSION,
};
pub use global_settings::{GlobalSettings, UpdateGlobalSettingsRequest};
pub use notification_log::{
    DisplayLog, NewNotificationLog, NotificationLog, NotificationStatus, NotificationType,
    ADDRESSABLE_TYPES,
};
pub use plan::{Entitlements, Feature, PlanTier};
pub use submission::{NewSubmission, SearchTerm, Submission, SubmissionFilter, META_KEY};
pub use tenant::{RequestContext, Tenant};
pub use usage::{QuotaUsage, UsageMetric};
