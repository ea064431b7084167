//! Global settings entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::GlobalSettings;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the global_settings table.
#[derive(Debug, Clone, FromRow)]
pub struct GlobalSettingsEntity {
    pub tenant_id: Uuid,
    pub developer_notifications_enabled: bool,
    pub developer_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GlobalSettingsEntity> for GlobalSettings {
    fn from(entity: GlobalSettingsEntity) -> Self {
        Self {
            tenant_id: entity.tenant_id,
            developer_notifications_enabled: entity.developer_notifications_enabled,
            developer_email: entity.developer_email,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
