//! Email settings entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{EmailSettings, NotificationCondition};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the email_settings table.
#[derive(Debug, Clone, FromRow)]
pub struct EmailSettingsEntity {
    pub id: Uuid,
    pub form_id: Uuid,
    pub enabled: bool,
    pub from_email: Option<String>,
    pub subject: Option<String>,
    pub template: Option<String>,
    pub developer_notifications_enabled: bool,
    pub developer_email: Option<String>,
    pub max_notifications_per_hour: i32,
    pub notification_conditions: Json<Vec<NotificationCondition>>,
    pub last_notification_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmailSettingsEntity> for EmailSettings {
    fn from(entity: EmailSettingsEntity) -> Self {
        Self {
            id: entity.id,
            form_id: entity.form_id,
            enabled: entity.enabled,
            from_email: entity.from_email,
            subject: entity.subject,
            template: entity.template,
            developer_notifications_enabled: entity.developer_notifications_enabled,
            developer_email: entity.developer_email,
            max_notifications_per_hour: entity.max_notifications_per_hour,
            notification_conditions: entity.notification_conditions.0,
            last_notification_sent_at: entity.last_notification_sent_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
