//! Tenant-wide notification settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::email_settings::non_empty;

/// Fallback developer-notice configuration for forms without email settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub tenant_id: Uuid,
    pub developer_notifications_enabled: bool,
    pub developer_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GlobalSettings {
    pub fn new_default(tenant_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            developer_notifications_enabled: false,
            developer_email: None,
            created_at: now,
            updated_at: now,
        }
    }
}

fn validate_optional_address(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    shared::validation::validate_plausible_email(value)
}

/// Partial update of the tenant's global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateGlobalSettingsRequest {
    pub developer_notifications_enabled: Option<bool>,
    #[validate(custom(function = "validate_optional_address"))]
    pub developer_email: Option<String>,
}

impl UpdateGlobalSettingsRequest {
    pub fn apply_to(&self, settings: &mut GlobalSettings, now: DateTime<Utc>) {
        if let Some(enabled) = self.developer_notifications_enabled {
            settings.developer_notifications_enabled = enabled;
        }
        if let Some(ref email) = self.developer_email {
            settings.developer_email = non_empty(email);
        }
        settings.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_update() {
        let mut settings = GlobalSettings::new_default(Uuid::new_v4(), Utc::now());
        UpdateGlobalSettingsRequest {
            developer_notifications_enabled: Some(true),
            developer_email: Some("ops@acme.io".into()),
        }
        .apply_to(&mut settings, Utc::now());

        assert!(settings.developer_notifications_enabled);
        assert_eq!(settings.developer_email.as_deref(), Some("ops@acme.io"));
    }

    #[test]
    fn test_validation() {
        let bad = UpdateGlobalSettingsRequest {
            developer_notifications_enabled: None,
            developer_email: Some("ops".into()),
        };
        assert!(bad.validate().is_err());

        let clear = UpdateGlobalSettingsRequest {
            developer_notifications_enabled: None,
            developer_email: Some(String::new()),
        };
        assert!(clear.validate().is_ok());
    }
}
