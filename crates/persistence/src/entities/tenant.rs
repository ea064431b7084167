//! Tenant entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{PlanTier, Tenant};
use domain::store::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the tenants table.
#[derive(Debug, Clone, FromRow)]
pub struct TenantEntity {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TenantEntity> for Tenant {
    type Error = StoreError;

    fn try_from(entity: TenantEntity) -> Result<Self, Self::Error> {
        let plan: PlanTier = entity.plan.parse().map_err(StoreError::Database)?;
        Ok(Self {
            id: entity.id,
            external_id: entity.external_id,
            email: entity.email,
            plan,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
