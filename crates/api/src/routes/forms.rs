//! Form endpoint handlers, including the public submission endpoint.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        ConnectInfo, Path, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::{
    find_template, form_templates, CreateFormRequest, CreateFromTemplateRequest, Form,
    FormTemplate, NotificationStatus, NotificationType,
};
use domain::services::{QuotaKind, RequestMetadata};
use domain::store::CascadeSummary;
use domain::DomainError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::net::SocketAddr;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::owned_form;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantAuth;
use crate::services::enforce_quota;

/// Response for form listing.
#[derive(Debug, Serialize)]
pub struct ListFormsResponse {
    pub forms: Vec<Form>,
}

/// Response for template listing.
#[derive(Debug, Serialize)]
pub struct ListTemplatesResponse {
    pub templates: &'static [FormTemplate],
}

/// Per-channel outcome returned to the submitter.
#[derive(Debug, Serialize)]
pub struct NotificationSummary {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
}

/// Public submission receipt. Never includes recipients or form content.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub form_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub notifications: Vec<NotificationSummary>,
}

/// List the caller's forms, newest first.
///
/// GET /api/v1/forms
pub async fn list_forms(
    State(state): State<AppState>,
    auth: TenantAuth,
) -> Result<Json<ListFormsResponse>, ApiError> {
    let forms = state.store.list_forms(auth.tenant.id).await?;
    Ok(Json(ListFormsResponse { forms }))
}

/// Create a form.
///
/// POST /api/v1/forms
pub async fn create_form(
    State(state): State<AppState>,
    auth: TenantAuth,
    payload: Result<Json<CreateFormRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Form>), ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let ctx = auth.context();
    enforce_quota(&state.quota, &ctx, QuotaKind::Forms).await?;

    let form = state
        .store
        .create_form(request.into_new_form(ctx.tenant_id))
        .await?;
    info!(form_id = %form.id, tenant_id = %ctx.tenant_id, "Form created");

    Ok((StatusCode::CREATED, Json(form)))
}

/// Built-in form templates.
///
/// GET /api/v1/forms/templates
pub async fn list_templates() -> Json<ListTemplatesResponse> {
    Json(ListTemplatesResponse {
        templates: form_templates(),
    })
}

/// Create a form from a built-in template.
///
/// POST /api/v1/forms/from-template
pub async fn create_form_from_template(
    State(state): State<AppState>,
    auth: TenantAuth,
    payload: Result<Json<CreateFromTemplateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Form>), ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let template =
        find_template(&request.template_id).ok_or(DomainError::NotFound("Template"))?;

    let ctx = auth.context();
    enforce_quota(&state.quota, &ctx, QuotaKind::Forms).await?;

    let form = state
        .store
        .create_form(template.new_form(ctx.tenant_id, request.name))
        .await?;
    info!(
        form_id = %form.id,
        tenant_id = %ctx.tenant_id,
        template = template.id,
        "Form created from template"
    );

    Ok((StatusCode::CREATED, Json(form)))
}

/// Delete a form with its submissions, logs and email settings.
///
/// DELETE /api/v1/forms/:form_id
pub async fn delete_form(
    State(state): State<AppState>,
    auth: TenantAuth,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CascadeSummary>, ApiError> {
    let Path(form_id) = path?;
    let ctx = auth.context();
    let form = owned_form(state.store.as_ref(), &ctx, form_id).await?;

    let summary = state.store.delete_form_cascade(form.id).await?;
    info!(
        form_id = %form.id,
        submissions = summary.submissions,
        notification_logs = summary.notification_logs,
        "Form deleted"
    );

    Ok(Json(summary))
}

/// Accept a public submission.
///
/// POST /api/v1/forms/:form_id/submissions
pub async fn submit_form(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Path(form_id) = path?;
    let Json(data) = payload?;

    let mut request = RequestMetadata::from_headers(
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
    );
    if request.ip.is_none() {
        request.ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    }

    let outcome = state.intake.submit(form_id, data, &request).await?;

    let notifications = outcome
        .logs
        .iter()
        .map(|log| NotificationSummary {
            notification_type: log.notification_type,
            status: log.status,
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            id: outcome.submission.id,
            form_id: outcome.submission.form_id,
            created_at: outcome.submission.created_at,
            notifications,
        }),
    ))
}
