//! Global settings repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::GlobalSettingsEntity;
use crate::metrics::QueryTimer;
use domain::models::GlobalSettings;

/// Repository for tenant-wide notification settings.
#[derive(Clone)]
pub struct GlobalSettingsRepository {
    pool: PgPool,
}

impl GlobalSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<GlobalSettingsEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_global_settings_by_tenant");
        let result = sqlx::query_as::<_, GlobalSettingsEntity>(
            r#"
            SELECT tenant_id, developer_notifications_enabled, developer_email, created_at, updated_at
            FROM global_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn upsert(&self, settings: &GlobalSettings) -> Result<GlobalSettingsEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_global_settings");
        let result = sqlx::query_as::<_, GlobalSettingsEntity>(
            r#"
            INSERT INTO global_settings (tenant_id, developer_notifications_enabled, developer_email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id) DO UPDATE SET
                developer_notifications_enabled = EXCLUDED.developer_notifications_enabled,
                developer_email = EXCLUDED.developer_email,
                updated_at = EXCLUDED.updated_at
            RETURNING tenant_id, developer_notifications_enabled, developer_email, created_at, updated_at
            "#,
        )
        .bind(settings.tenant_id)
        .bind(settings.developer_notifications_enabled)
        .bind(&settings.developer_email)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
