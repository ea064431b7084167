//! Submission entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Submission;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the submissions table.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionEntity {
    pub id: Uuid,
    pub form_id: Uuid,
    pub data: serde_json::Value,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SubmissionEntity> for Submission {
    fn from(entity: SubmissionEntity) -> Self {
        Self {
            id: entity.id,
            form_id: entity.form_id,
            data: entity.data,
            email: entity.email,
            created_at: entity.created_at,
        }
    }
}
