//! Tenant domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan::{Entitlements, PlanTier};

/// An account that owns forms and is billed under a plan tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// User ID at the identity provider.
    pub external_id: String,
    pub email: String,
    pub plan: PlanTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn entitlements(&self) -> Entitlements {
        self.plan.entitlements()
    }

    pub fn context(&self) -> RequestContext {
        RequestContext {
            tenant_id: self.id,
            plan: self.plan,
            email: self.email.clone(),
        }
    }
}

/// Tenant identity threaded explicitly through every owner-facing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    pub plan: PlanTier,
    /// Account email, used as the last-resort developer notice recipient.
    pub email: String,
}

impl RequestContext {
    pub fn entitlements(&self) -> Entitlements {
        self.plan.entitlements()
    }
}
