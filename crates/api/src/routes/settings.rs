//! Tenant-wide notification settings.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use domain::models::{Feature, GlobalSettings, UpdateGlobalSettingsRequest};
use domain::DomainError;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantAuth;

/// Stored settings, or unsaved defaults when none exist.
///
/// GET /api/v1/settings/global
pub async fn get_global_settings(
    State(state): State<AppState>,
    auth: TenantAuth,
) -> Result<Json<GlobalSettings>, ApiError> {
    let tenant_id = auth.tenant.id;
    let settings = state
        .store
        .find_global_settings(tenant_id)
        .await?
        .unwrap_or_else(|| GlobalSettings::new_default(tenant_id, Utc::now()));
    Ok(Json(settings))
}

/// PRO only.
///
/// PUT /api/v1/settings/global
pub async fn update_global_settings(
    State(state): State<AppState>,
    auth: TenantAuth,
    payload: Result<Json<UpdateGlobalSettingsRequest>, JsonRejection>,
) -> Result<Json<GlobalSettings>, ApiError> {
    let ctx = auth.context();
    if !ctx.entitlements().can_configure_global_notifications {
        return Err(DomainError::plan_restricted(Feature::GlobalNotificationSettings).into());
    }

    let Json(request) = payload?;
    request.validate()?;

    let now = Utc::now();
    let mut settings = state
        .store
        .find_global_settings(ctx.tenant_id)
        .await?
        .unwrap_or_else(|| GlobalSettings::new_default(ctx.tenant_id, now));
    request.apply_to(&mut settings, now);
    let settings = state.store.upsert_global_settings(&settings).await?;

    info!(tenant_id = %ctx.tenant_id, "Global settings updated");
    Ok(Json(settings))
}
