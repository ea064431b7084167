use axum::{extract::State, Json};
use domain::models::QuotaUsage;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantAuth;

/// Current plan usage against its limits.
///
/// GET /api/v1/usage
pub async fn get_usage(
    State(state): State<AppState>,
    auth: TenantAuth,
) -> Result<Json<QuotaUsage>, ApiError> {
    let usage = state.quota.usage(&auth.context()).await?;
    Ok(Json(usage))
}
