//! Submission listing, search, export and deletion.

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::DisplayLog;
use domain::services::{SubmissionQuery, SubmissionWithLogs};
use domain::store::CascadeSummary;
use domain::DomainError;
use serde::{Deserialize, Serialize};
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;

use super::{owned_form, PageParams};
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantAuth;

/// Query parameters for search.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Unpaginated export of matching submissions.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub exported_at: DateTime<Utc>,
    pub count: usize,
    pub submissions: Vec<SubmissionWithLogs>,
}

/// Reconciled logs of one submission.
#[derive(Debug, Serialize)]
pub struct SubmissionLogsResponse {
    pub submission_id: Uuid,
    pub logs: Vec<DisplayLog>,
}

/// List submissions with reconciled logs.
///
/// GET /api/v1/submissions?search=&status=&type=&form_id=&start_date=&end_date=&page=&limit=
pub async fn list_submissions(
    State(state): State<AppState>,
    auth: TenantAuth,
    query: Result<Query<SubmissionQuery>, QueryRejection>,
    page: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<SubmissionWithLogs>>, ApiError> {
    let Query(query) = query?;
    let Query(page) = page?;

    let result = state
        .queries
        .query(&auth.context(), &query, page.pagination()?)
        .await?;
    Ok(Json(result))
}

/// First page of submissions matching a search term.
///
/// GET /api/v1/submissions/search?q=
pub async fn search_submissions(
    State(state): State<AppState>,
    auth: TenantAuth,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Page<SubmissionWithLogs>>, ApiError> {
    let Query(params) = params?;
    let term = params.q.trim();
    if term.is_empty() {
        return Err(ApiError::Validation("Search term is required".to_string()));
    }

    let result = state.queries.search(&auth.context(), term).await?;
    Ok(Json(result))
}

/// Every matching submission, unpaginated.
///
/// GET /api/v1/submissions/export
pub async fn export_submissions(
    State(state): State<AppState>,
    auth: TenantAuth,
    query: Result<Query<SubmissionQuery>, QueryRejection>,
) -> Result<Json<ExportResponse>, ApiError> {
    let Query(query) = query?;
    let ctx = auth.context();

    let submissions = state.queries.export(&ctx, &query).await?;
    info!(tenant_id = %ctx.tenant_id, count = submissions.len(), "Submissions exported");

    Ok(Json(ExportResponse {
        exported_at: Utc::now(),
        count: submissions.len(),
        submissions,
    }))
}

/// GET /api/v1/submissions/:submission_id/logs
pub async fn get_submission_logs(
    State(state): State<AppState>,
    auth: TenantAuth,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SubmissionLogsResponse>, ApiError> {
    let Path(submission_id) = path?;

    let logs = state
        .queries
        .logs_for_submission(&auth.context(), submission_id)
        .await?;
    Ok(Json(SubmissionLogsResponse {
        submission_id,
        logs,
    }))
}

/// Delete a submission and its notification logs.
///
/// DELETE /api/v1/submissions/:submission_id
pub async fn delete_submission(
    State(state): State<AppState>,
    auth: TenantAuth,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CascadeSummary>, ApiError> {
    let Path(submission_id) = path?;
    let ctx = auth.context();

    let submission = state
        .store
        .find_submission(submission_id)
        .await?
        .ok_or(DomainError::NotFound("Submission"))?;
    owned_form(state.store.as_ref(), &ctx, submission.form_id)
        .await
        .map_err(|_| DomainError::NotFound("Submission"))?;

    let summary = state.store.delete_submission_cascade(submission.id).await?;
    info!(
        submission_id = %submission.id,
        notification_logs = summary.notification_logs,
        "Submission deleted"
    );

    Ok(Json(summary))
}
