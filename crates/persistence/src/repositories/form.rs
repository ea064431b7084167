//! Form repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::FormEntity;
use crate::metrics::QueryTimer;
use domain::models::{NewForm, INITIAL_SCHEMA_VERSION};

/// Rows removed by a form cascade.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormCascadeCounts {
    pub notification_logs: u64,
    pub submissions: u64,
    pub email_settings: u64,
    pub forms: u64,
}

/// Repository for form-related database operations.
#[derive(Clone)]
pub struct FormRepository {
    pool: PgPool,
}

impl FormRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FormEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_form_by_id");
        let result = sqlx::query_as::<_, FormEntity>(
            r#"
            SELECT id, tenant_id, name, description, schema, schema_version, created_at, updated_at
            FROM forms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Forms of a tenant, newest first.
    pub async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<FormEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_forms_by_tenant");
        let result = sqlx::query_as::<_, FormEntity>(
            r#"
            SELECT id, tenant_id, name, description, schema, schema_version, created_at, updated_at
            FROM forms
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_forms_by_tenant");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM forms WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create(&self, form: &NewForm) -> Result<FormEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_form");
        let result = sqlx::query_as::<_, FormEntity>(
            r#"
            INSERT INTO forms (id, tenant_id, name, description, schema, schema_version)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, name, description, schema, schema_version, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(form.tenant_id)
        .bind(&form.name)
        .bind(&form.description)
        .bind(&form.schema)
        .bind(INITIAL_SCHEMA_VERSION)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Deletes logs, submissions, email settings and the form in one
    /// transaction. Any failure rolls the whole cascade back.
    pub async fn delete_cascade(&self, id: Uuid) -> Result<FormCascadeCounts, sqlx::Error> {
        let timer = QueryTimer::new("delete_form_cascade");
        let mut tx = self.pool.begin().await?;

        let notification_logs = sqlx::query("DELETE FROM notification_logs WHERE form_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let submissions = sqlx::query("DELETE FROM submissions WHERE form_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let email_settings = sqlx::query("DELETE FROM email_settings WHERE form_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let forms = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if forms == 0 {
            tx.rollback().await?;
            timer.record();
            return Err(sqlx::Error::RowNotFound);
        }

        tx.commit().await?;
        timer.record();

        Ok(FormCascadeCounts {
            notification_logs,
            submissions,
            email_settings,
            forms,
        })
    }
}
