//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod email_settings;
pub mod form;
pub mod global_settings;
pub mod notification_log;
pub mod submission;
pub mod tenant;

pub use email_settings::EmailSettingsEntity;
pub use form::FormEntity;
pub use global_settings::GlobalSettingsEntity;
pub use notification_log::NotificationLogEntity;
pub use submission::SubmissionEntity;
pub use tenant::TenantEntity;
