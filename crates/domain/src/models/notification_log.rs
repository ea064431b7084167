//! Notification log models.
//!
//! Persisted logs are append-only: one row per delivery attempt or skip.
//! [`DisplayLog`] is the reconciled, read-time view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of notification a log row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    SubmissionConfirmation,
    DeveloperNotification,
    Digest,
}

/// Channels the reconciler guarantees an entry for.
pub const ADDRESSABLE_TYPES: [NotificationType; 2] = [
    NotificationType::SubmissionConfirmation,
    NotificationType::DeveloperNotification,
];

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::SubmissionConfirmation => "SUBMISSION_CONFIRMATION",
            NotificationType::DeveloperNotification => "DEVELOPER_NOTIFICATION",
            NotificationType::Digest => "DIGEST",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SUBMISSION_CONFIRMATION" => Ok(NotificationType::SubmissionConfirmation),
            "DEVELOPER_NOTIFICATION" => Ok(NotificationType::DeveloperNotification),
            "DIGEST" => Ok(NotificationType::Digest),
            _ => Err(format!("Unknown notification type: {}", s)),
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Sent,
    Failed,
    Skipped,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Sent => "SENT",
            NotificationStatus::Failed => "FAILED",
            NotificationStatus::Skipped => "SKIPPED",
        }
    }

    /// Sent and failed rows count as delivery attempts.
    pub fn is_attempt(&self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Failed)
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SENT" => Ok(NotificationStatus::Sent),
            "FAILED" => Ok(NotificationStatus::Failed),
            "SKIPPED" => Ok(NotificationStatus::Skipped),
            _ => Err(format!("Unknown notification status: {}", s)),
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted notification log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub form_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub recipient: Option<String>,
    /// Failure message, or the skip reason for skipped rows.
    pub error: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a log row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotificationLog {
    pub submission_id: Uuid,
    pub form_id: Uuid,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub recipient: Option<String>,
    pub error: Option<String>,
    pub metadata: JsonValue,
}

impl NewNotificationLog {
    pub fn sent(
        submission_id: Uuid,
        form_id: Uuid,
        notification_type: NotificationType,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            submission_id,
            form_id,
            notification_type,
            status: NotificationStatus::Sent,
            recipient: Some(recipient.into()),
            error: None,
            metadata: json!({}),
        }
    }

    pub fn failed(
        submission_id: Uuid,
        form_id: Uuid,
        notification_type: NotificationType,
        recipient: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            submission_id,
            form_id,
            notification_type,
            status: NotificationStatus::Failed,
            recipient: Some(recipient.into()),
            error: Some(error.into()),
            metadata: json!({}),
        }
    }

    pub fn skipped(
        submission_id: Uuid,
        form_id: Uuid,
        notification_type: NotificationType,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            submission_id,
            form_id,
            notification_type,
            status: NotificationStatus::Skipped,
            recipient: None,
            error: Some(reason.into()),
            metadata: json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Reconciled log entry shown to owners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayLog {
    /// `None` for synthesized entries.
    pub id: Option<Uuid>,
    pub submission_id: Uuid,
    pub form_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub recipient: Option<String>,
    pub error: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    /// True when no row was persisted and the entry was derived at read time.
    pub synthesized: bool,
}

impl From<NotificationLog> for DisplayLog {
    fn from(log: NotificationLog) -> Self {
        Self {
            id: Some(log.id),
            submission_id: log.submission_id,
            form_id: log.form_id,
            notification_type: log.notification_type,
            status: log.status,
            recipient: log.recipient,
            error: log.error,
            metadata: log.metadata,
            created_at: log.created_at,
            synthesized: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_serialization() {
        assert_eq!(
            serde_json::to_string(&NotificationType::SubmissionConfirmation).unwrap(),
            "\"SUBMISSION_CONFIRMATION\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationStatus::Skipped).unwrap(),
            "\"SKIPPED\""
        );
    }

    #[test]
    fn test_type_from_str() {
        assert_eq!(
            "developer_notification".parse::<NotificationType>().unwrap(),
            NotificationType::DeveloperNotification
        );
        assert!("sms".parse::<NotificationType>().is_err());
        assert_eq!("sent".parse::<NotificationStatus>().unwrap(), NotificationStatus::Sent);
    }

    #[test]
    fn test_attempt_statuses() {
        assert!(NotificationStatus::Sent.is_attempt());
        assert!(NotificationStatus::Failed.is_attempt());
        assert!(!NotificationStatus::Skipped.is_attempt());
    }

    #[test]
    fn test_skipped_constructor_records_reason() {
        let log = NewNotificationLog::skipped(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NotificationType::SubmissionConfirmation,
            "email settings are not configured",
        );
        assert_eq!(log.status, NotificationStatus::Skipped);
        assert_eq!(log.recipient, None);
        assert_eq!(log.error.as_deref(), Some("email settings are not configured"));
    }

    #[test]
    fn test_display_log_from_persisted() {
        let log = NotificationLog {
            id: Uuid::new_v4(),
            submission_id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            notification_type: NotificationType::Digest,
            status: NotificationStatus::Sent,
            recipient: Some("a@b.com".into()),
            error: None,
            metadata: json!({}),
            created_at: Utc::now(),
        };
        let display = DisplayLog::from(log.clone());
        assert_eq!(display.id, Some(log.id));
        assert!(!display.synthesized);

        let json = serde_json::to_value(&display).unwrap();
        assert_eq!(json["type"], "DIGEST");
    }
}
