//! Tenant repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::TenantEntity;
use crate::metrics::QueryTimer;

/// Repository for tenant-related database operations.
#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<TenantEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_tenant_by_id");
        let result = sqlx::query_as::<_, TenantEntity>(
            r#"
            SELECT id, external_id, email, plan, created_at, updated_at
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Inserts a FREE tenant for the external id, or refreshes the email of
    /// the existing one.
    pub async fn upsert_by_external_id(
        &self,
        external_id: &str,
        email: &str,
    ) -> Result<TenantEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_tenant_by_external_id");
        let result = sqlx::query_as::<_, TenantEntity>(
            r#"
            INSERT INTO tenants (id, external_id, email, plan)
            VALUES ($1, $2, $3, 'FREE')
            ON CONFLICT (external_id) DO UPDATE SET
                email = EXCLUDED.email,
                updated_at = CASE
                    WHEN tenants.email = EXCLUDED.email THEN tenants.updated_at
                    ELSE NOW()
                END
            RETURNING id, external_id, email, plan, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(external_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
