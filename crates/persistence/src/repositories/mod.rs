//! Repository implementations for database operations.

pub mod email_settings;
pub mod form;
pub mod global_settings;
pub mod notification_log;
pub mod submission;
pub mod tenant;

pub use email_settings::EmailSettingsRepository;
pub use form::{FormCascadeCounts, FormRepository};
pub use global_settings::GlobalSettingsRepository;
pub use notification_log::NotificationLogRepository;
pub use submission::SubmissionRepository;
pub use tenant::TenantRepository;
