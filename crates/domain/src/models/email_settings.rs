//! Per-form email settings and developer-notice conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Hourly developer-notice ceiling applied when none is configured.
pub const DEFAULT_MAX_NOTIFICATIONS_PER_HOUR: i32 = 10;

/// Upper bound on stored notification conditions per form.
pub const MAX_NOTIFICATION_CONDITIONS: usize = 20;

/// Email configuration of a single form (at most one row per form).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSettings {
    pub id: Uuid,
    pub form_id: Uuid,
    /// Submitter confirmation on/off.
    pub enabled: bool,
    pub from_email: Option<String>,
    pub subject: Option<String>,
    pub template: Option<String>,
    pub developer_notifications_enabled: bool,
    pub developer_email: Option<String>,
    pub max_notifications_per_hour: i32,
    #[serde(default)]
    pub notification_conditions: Vec<NotificationCondition>,
    pub last_notification_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailSettings {
    /// Settings row created lazily on first owner access.
    pub fn new_default(form_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_id,
            enabled: false,
            from_email: None,
            subject: None,
            template: None,
            developer_notifications_enabled: false,
            developer_email: None,
            max_notifications_per_hour: DEFAULT_MAX_NOTIFICATIONS_PER_HOUR,
            notification_conditions: Vec::new(),
            last_notification_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when every configured condition holds for the submission data.
    pub fn conditions_match(&self, data: &JsonValue) -> bool {
        self.notification_conditions.iter().all(|c| c.matches(data))
    }
}

/// Comparison applied by a [`NotificationCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    Exists,
    NotExists,
}

/// Predicate over a top-level submission field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCondition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
}

impl NotificationCondition {
    pub fn matches(&self, data: &JsonValue) -> bool {
        let actual = data.get(&self.field).filter(|v| !v.is_null());

        match self.operator {
            ConditionOperator::Exists => actual.is_some(),
            ConditionOperator::NotExists => actual.is_none(),
            ConditionOperator::Equals => match (actual, &self.value) {
                (Some(actual), Some(expected)) => values_equal(actual, expected),
                _ => false,
            },
            ConditionOperator::NotEquals => match (actual, &self.value) {
                (Some(actual), Some(expected)) => !values_equal(actual, expected),
                (None, _) => true,
                (Some(_), None) => true,
            },
            ConditionOperator::Contains => match (actual, &self.value) {
                (Some(JsonValue::String(s)), Some(expected)) => {
                    s.to_lowercase().contains(&value_text(expected).to_lowercase())
                }
                (Some(JsonValue::Array(items)), Some(expected)) => {
                    items.iter().any(|item| values_equal(item, expected))
                }
                _ => false,
            },
        }
    }

    fn validate_shape(&self) -> Result<(), ValidationError> {
        if self.field.trim().is_empty() {
            let mut err = ValidationError::new("condition_field");
            err.message = Some("Condition field must not be empty".into());
            return Err(err);
        }
        let needs_value = matches!(
            self.operator,
            ConditionOperator::Equals | ConditionOperator::NotEquals | ConditionOperator::Contains
        );
        if needs_value && self.value.is_none() {
            let mut err = ValidationError::new("condition_value");
            err.message = Some(format!("Condition on '{}' requires a value", self.field).into());
            return Err(err);
        }
        Ok(())
    }
}

/// Form fields arrive as strings from HTML forms, so "5" equals 5.
fn values_equal(actual: &JsonValue, expected: &JsonValue) -> bool {
    actual == expected || value_text(actual) == value_text(expected)
}

fn value_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn validate_conditions(conditions: &Vec<NotificationCondition>) -> Result<(), ValidationError> {
    if conditions.len() > MAX_NOTIFICATION_CONDITIONS {
        let mut err = ValidationError::new("conditions_length");
        err.message = Some(
            format!(
                "At most {} notification conditions are allowed",
                MAX_NOTIFICATION_CONDITIONS
            )
            .into(),
        );
        return Err(err);
    }
    conditions.iter().try_for_each(|c| c.validate_shape())
}

/// Empty string clears the sender; anything else must look like an address.
fn validate_optional_address(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    shared::validation::validate_plausible_email(value)
}

/// Partial update of a form's email settings.
///
/// Empty strings clear optional text fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateEmailSettingsRequest {
    pub enabled: Option<bool>,
    #[validate(custom(function = "validate_optional_address"))]
    pub from_email: Option<String>,
    #[validate(length(max = 255, message = "Subject must be at most 255 characters"))]
    pub subject: Option<String>,
    #[validate(length(max = 50000, message = "Template must be at most 50000 characters"))]
    pub template: Option<String>,
    pub developer_notifications_enabled: Option<bool>,
    #[validate(custom(function = "validate_optional_address"))]
    pub developer_email: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "Must be between 1 and 1000"))]
    pub max_notifications_per_hour: Option<i32>,
    #[validate(custom(function = "validate_conditions"))]
    pub notification_conditions: Option<Vec<NotificationCondition>>,
}

impl UpdateEmailSettingsRequest {
    pub fn has_updates(&self) -> bool {
        self.enabled.is_some()
            || self.from_email.is_some()
            || self.subject.is_some()
            || self.template.is_some()
            || self.developer_notifications_enabled.is_some()
            || self.developer_email.is_some()
            || self.max_notifications_per_hour.is_some()
            || self.notification_conditions.is_some()
    }

    pub fn toggle(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    /// Applies the update onto existing settings.
    pub fn apply_to(&self, settings: &mut EmailSettings, now: DateTime<Utc>) {
        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
        }
        if let Some(ref from_email) = self.from_email {
            settings.from_email = non_empty(from_email);
        }
        if let Some(ref subject) = self.subject {
            settings.subject = non_empty(subject);
        }
        if let Some(ref template) = self.template {
            settings.template = non_empty(template);
        }
        if let Some(enabled) = self.developer_notifications_enabled {
            settings.developer_notifications_enabled = enabled;
        }
        if let Some(ref developer_email) = self.developer_email {
            settings.developer_email = non_empty(developer_email);
        }
        if let Some(max) = self.max_notifications_per_hour {
            settings.max_notifications_per_hour = max;
        }
        if let Some(ref conditions) = self.notification_conditions {
            settings.notification_conditions = conditions.clone();
        }
        settings.updated_at = now;
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
