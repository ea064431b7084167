//! Per-form email settings.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use chrono::Utc;
use domain::models::{EmailSettings, UpdateEmailSettingsRequest};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::owned_form;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantAuth;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// Returns the form's settings, creating defaults on first read.
///
/// GET /api/v1/forms/:form_id/email-settings
pub async fn get_email_settings(
    State(state): State<AppState>,
    auth: TenantAuth,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EmailSettings>, ApiError> {
    let Path(form_id) = path?;
    let form = owned_form(state.store.as_ref(), &auth.context(), form_id).await?;

    let settings = state.store.get_or_create_email_settings(form.id).await?;
    Ok(Json(settings))
}

/// PUT /api/v1/forms/:form_id/email-settings
pub async fn update_email_settings(
    State(state): State<AppState>,
    auth: TenantAuth,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateEmailSettingsRequest>, JsonRejection>,
) -> Result<Json<EmailSettings>, ApiError> {
    let Path(form_id) = path?;
    let Json(request) = payload?;
    request.validate()?;
    if !request.has_updates() {
        return Err(ApiError::Validation("No fields to update".to_string()));
    }

    let settings = apply_update(&state, &auth, form_id, &request).await?;
    Ok(Json(settings))
}

/// Turns submitter confirmations on or off.
///
/// POST /api/v1/forms/:form_id/email-settings/toggle
pub async fn toggle_email_settings(
    State(state): State<AppState>,
    auth: TenantAuth,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<EmailSettings>, ApiError> {
    let Path(form_id) = path?;
    let Json(ToggleRequest { enabled }) = payload?;

    let request = UpdateEmailSettingsRequest::toggle(enabled);
    let settings = apply_update(&state, &auth, form_id, &request).await?;
    Ok(Json(settings))
}

async fn apply_update(
    state: &AppState,
    auth: &TenantAuth,
    form_id: Uuid,
    request: &UpdateEmailSettingsRequest,
) -> Result<EmailSettings, ApiError> {
    let form = owned_form(state.store.as_ref(), &auth.context(), form_id).await?;

    let mut settings = state.store.get_or_create_email_settings(form.id).await?;
    request.apply_to(&mut settings, Utc::now());
    let settings = state.store.upsert_email_settings(&settings).await?;

    info!(
        form_id = %form.id,
        enabled = settings.enabled,
        developer_notifications = settings.developer_notifications_enabled,
        "Email settings updated"
    );
    Ok(settings)
}
