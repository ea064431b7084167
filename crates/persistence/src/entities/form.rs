//! Form entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Form;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the forms table.
#[derive(Debug, Clone, FromRow)]
pub struct FormEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub schema: serde_json::Value,
    pub schema_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FormEntity> for Form {
    fn from(entity: FormEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            description: entity.description,
            schema: entity.schema,
            schema_version: entity.schema_version,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
