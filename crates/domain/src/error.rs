//! Domain error types.

use thiserror::Error;

use crate::models::PlanTier;
use crate::services::quota::QuotaKind;
use crate::store::StoreError;

/// Errors surfaced by domain operations.
///
/// Delivery failures are not represented here: they are recorded as
/// notification logs and never abort the submission.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Quota exceeded: {resource} limit reached ({current}/{limit})")]
    QuotaExceeded {
        resource: QuotaKind,
        current: i64,
        limit: i64,
    },

    /// Also used for resources owned by another tenant.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{feature} requires the {required} plan")]
    PlanRestricted {
        feature: &'static str,
        required: PlanTier,
    },

    #[error("A submission with this email already exists for this form")]
    DuplicateSubmission,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub fn plan_restricted(feature: crate::models::Feature) -> Self {
        DomainError::PlanRestricted {
            feature: feature.description(),
            required: feature.required_plan(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => DomainError::NotFound(what),
            other => DomainError::Store(other),
        }
    }
}
