//! HTTP route handlers.

pub mod email_settings;
pub mod forms;
pub mod health;
pub mod notification_logs;
pub mod settings;
pub mod submissions;
pub mod usage;

use domain::models::{Form, RequestContext};
use domain::store::FormStore;
use domain::DomainError;
use serde::Deserialize;
use shared::pagination::{Pagination, PaginationError};
use uuid::Uuid;

use crate::error::ApiError;

/// `page` and `limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn pagination(self) -> Result<Pagination, PaginationError> {
        Pagination::new(self.page, self.limit)
    }
}

/// Loads a form owned by the caller. Forms of other tenants are reported
/// as missing.
pub(crate) async fn owned_form(
    store: &dyn FormStore,
    ctx: &RequestContext,
    form_id: Uuid,
) -> Result<Form, ApiError> {
    store
        .find_form(form_id)
        .await?
        .filter(|form| form.tenant_id == ctx.tenant_id)
        .ok_or_else(|| DomainError::NotFound("Form").into())
}
