use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::store::StoreError;
use domain::DomainError;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use shared::identity::IdentityError;
use shared::pagination::PaginationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {message}")]
    InvalidFields {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Rate limited")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    /// Status, machine-readable code, message and optional details.
    fn parts(&self) -> (StatusCode, &'static str, String, Option<JsonValue>) {
        match self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone(), None)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone(), None)
            }
            ApiError::InvalidFields { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.clone(),
                Some(json!(details)),
            ),
            ApiError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
                Some(json!({ "retry_after": retry_after_secs })),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal()
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
            ApiError::Domain(err) => domain_parts(err),
        }
    }
}

fn internal() -> (StatusCode, &'static str, String, Option<JsonValue>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "An internal error occurred".into(),
        None,
    )
}

fn domain_parts(err: &DomainError) -> (StatusCode, &'static str, String, Option<JsonValue>) {
    let message = err.to_string();
    match err {
        DomainError::QuotaExceeded {
            resource,
            current,
            limit,
        } => (
            StatusCode::FORBIDDEN,
            "quota_exceeded",
            message,
            Some(json!({
                "resource": resource.as_str(),
                "current": current,
                "limit": limit,
            })),
        ),
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", message, None),
        DomainError::PlanRestricted { feature, required } => (
            StatusCode::FORBIDDEN,
            "plan_restricted",
            message,
            Some(json!({
                "feature": feature,
                "required_plan": required,
            })),
        ),
        DomainError::DuplicateSubmission => {
            (StatusCode::CONFLICT, "duplicate_submission", message, None)
        }
        DomainError::Validation(msg) => {
            (StatusCode::BAD_REQUEST, "validation_error", msg.clone(), None)
        }
        DomainError::Store(StoreError::Conflict(detail)) => {
            tracing::warn!(detail = %detail, "Store conflict");
            (
                StatusCode::CONFLICT,
                "conflict",
                "Resource already exists".into(),
                None,
            )
        }
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "Store error");
            internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();
        let body = ErrorBody {
            code,
            message,
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::InvalidFields { message, details }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::NotFound(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::PlanTier;
    use domain::services::QuotaKind;

    async fn body_json(response: Response) -> JsonValue {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_quota_exceeded_body() {
        let response = ApiError::from(DomainError::QuotaExceeded {
            resource: QuotaKind::Forms,
            current: 3,
            limit: 3,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["code"], "quota_exceeded");
        assert_eq!(body["details"]["current"], 3);
        assert_eq!(body["details"]["limit"], 3);
        assert_eq!(body["details"]["resource"], "forms");
    }

    #[tokio::test]
    async fn test_plan_restricted_names_plan() {
        let response = ApiError::from(DomainError::PlanRestricted {
            feature: "date range filters",
            required: PlanTier::Pro,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["code"], "plan_restricted");
        assert_eq!(body["details"]["required_plan"], "PRO");
    }

    #[tokio::test]
    async fn test_duplicate_submission_conflict() {
        let response = ApiError::from(DomainError::DuplicateSubmission).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "duplicate_submission");
    }

    #[tokio::test]
    async fn test_store_error_hides_details() {
        let response =
            ApiError::from(StoreError::Database("connection reset".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], "internal_error");
        assert!(!body["message"].as_str().unwrap().contains("connection reset"));
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_store_not_found_maps_to_404() {
        let response = ApiError::from(StoreError::NotFound("Form")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited {
            retry_after_secs: 7,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "7");
    }

    #[test]
    fn test_unauthorized_status() {
        let response = ApiError::from(IdentityError::TokenExpired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::Validation("bad".into()).to_string(),
            "Validation error: bad"
        );
        assert_eq!(
            ApiError::Domain(DomainError::NotFound("Form")).to_string(),
            "Form not found"
        );
    }
}
