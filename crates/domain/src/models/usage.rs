//! Quota usage reporting.

use serde::Serialize;

use super::plan::PlanTier;

/// A usage counter with its plan limit (`None` = unbounded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageMetric {
    pub current: i64,
    pub limit: Option<i64>,
}

impl UsageMetric {
    pub fn remaining(&self) -> Option<i64> {
        self.limit.map(|limit| (limit - self.current).max(0))
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.current >= limit)
    }
}

/// Tenant usage against both quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub plan: PlanTier,
    pub forms: UsageMetric,
    pub monthly_submissions: UsageMetric,
}
