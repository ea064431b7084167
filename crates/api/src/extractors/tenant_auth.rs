//! Tenant authentication extractor.
//!
//! Verifies the identity provider's bearer token and resolves the tenant,
//! provisioning a `FREE` tenant the first time an identity is seen.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use domain::models::{RequestContext, Tenant};

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated tenant for owner-facing routes.
#[derive(Debug, Clone)]
pub struct TenantAuth {
    pub tenant: Tenant,
}

impl TenantAuth {
    pub fn context(&self) -> RequestContext {
        self.tenant.context()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TenantAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<TenantAuth>() {
            return Ok(auth.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        ApiError::Unauthorized("Missing Authorization header".to_string())
                    } else {
                        ApiError::Unauthorized("Invalid Authorization header format".to_string())
                    }
                })?;

        let identity = state.verifier.verify(bearer.token()).map_err(|err| {
            tracing::debug!(error = %err, "Rejected identity token");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let tenant = state
            .store
            .find_or_create_tenant(&identity.user_id, &identity.email)
            .await?;

        tracing::Span::current().record("tenant_id", tracing::field::display(tenant.id));

        let auth = TenantAuth { tenant };
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}
