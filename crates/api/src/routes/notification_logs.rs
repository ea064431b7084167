//! Flattened notification log feed.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use domain::models::DisplayLog;
use domain::services::SubmissionQuery;
use shared::pagination::Page;

use super::PageParams;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantAuth;

/// Reconciled logs across the caller's submissions, newest first.
///
/// Accepts the same filters as submission listing.
///
/// GET /api/v1/notification-logs
pub async fn list_notification_logs(
    State(state): State<AppState>,
    auth: TenantAuth,
    query: Result<Query<SubmissionQuery>, QueryRejection>,
    page: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<DisplayLog>>, ApiError> {
    let Query(query) = query?;
    let Query(page) = page?;

    let logs = state
        .queries
        .query_logs(&auth.context(), &query, page.pagination()?)
        .await?;
    Ok(Json(logs))
}
