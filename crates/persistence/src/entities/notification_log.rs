//! Notification log entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::NotificationLog;
use domain::store::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the notification_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationLogEntity {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub form_id: Uuid,
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub status: String,
    pub recipient: Option<String>,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationLogEntity> for NotificationLog {
    type Error = StoreError;

    fn try_from(entity: NotificationLogEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            submission_id: entity.submission_id,
            form_id: entity.form_id,
            notification_type: entity
                .notification_type
                .parse()
                .map_err(StoreError::Database)?,
            status: entity.status.parse().map_err(StoreError::Database)?,
            recipient: entity.recipient,
            error: entity.error,
            metadata: entity.metadata,
            created_at: entity.created_at,
        })
    }
}
