//! Quota ledger: usage counts compared against plan limits.
//!
//! The check reads counts and compares before the caller writes. Two
//! concurrent requests can both pass at `limit - 1`, so a tenant may briefly
//! end up one or two rows over quota.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::DomainError;
use crate::models::{Entitlements, QuotaUsage, RequestContext, UsageMetric};
use crate::store::{FormStore, StoreResult};

/// Quota being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Forms,
    MonthlySubmissions,
}

impl QuotaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::Forms => "forms",
            QuotaKind::MonthlySubmissions => "monthly_submissions",
        }
    }

    pub fn limit(&self, entitlements: &Entitlements) -> Option<i64> {
        match self {
            QuotaKind::Forms => entitlements.max_forms,
            QuotaKind::MonthlySubmissions => entitlements.max_submissions_per_month,
        }
    }
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaKind::Forms => f.write_str("forms"),
            QuotaKind::MonthlySubmissions => f.write_str("monthly submissions"),
        }
    }
}

/// Result of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied {
        reason: String,
        current: i64,
        limit: i64,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed)
    }

    pub fn into_result(self, kind: QuotaKind) -> Result<(), DomainError> {
        match self {
            QuotaDecision::Allowed => Ok(()),
            QuotaDecision::Denied { current, limit, .. } => Err(DomainError::QuotaExceeded {
                resource: kind,
                current,
                limit,
            }),
        }
    }
}

/// Compares a usage count with the plan limit for `kind`.
pub fn check_quota(current: i64, entitlements: &Entitlements, kind: QuotaKind) -> QuotaDecision {
    match kind.limit(entitlements) {
        None => QuotaDecision::Allowed,
        Some(limit) if current < limit => QuotaDecision::Allowed,
        Some(limit) => QuotaDecision::Denied {
            reason: format!(
                "The {} plan allows {} {}; {} already used",
                entitlements.plan, limit, kind, current
            ),
            current,
            limit,
        },
    }
}

/// 00:00 UTC on the first day of `now`'s calendar month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Reads usage from the store and gates form creation and intake.
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn FormStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    async fn current(&self, ctx: &RequestContext, kind: QuotaKind) -> StoreResult<i64> {
        match kind {
            QuotaKind::Forms => self.store.count_forms(ctx.tenant_id).await,
            QuotaKind::MonthlySubmissions => {
                self.store
                    .count_submissions_since(ctx.tenant_id, month_start(Utc::now()))
                    .await
            }
        }
    }

    /// Checks the quota before the caller writes.
    ///
    /// Unbounded tiers skip the count entirely.
    pub async fn check_and_reserve(
        &self,
        ctx: &RequestContext,
        kind: QuotaKind,
    ) -> Result<QuotaDecision, DomainError> {
        let entitlements = ctx.entitlements();
        if kind.limit(&entitlements).is_none() {
            return Ok(QuotaDecision::Allowed);
        }

        let current = self.current(ctx, kind).await?;
        let decision = check_quota(current, &entitlements, kind);

        match &decision {
            QuotaDecision::Allowed => debug!(
                tenant_id = %ctx.tenant_id,
                quota = kind.as_str(),
                current,
                "Quota check passed"
            ),
            QuotaDecision::Denied { limit, .. } => info!(
                tenant_id = %ctx.tenant_id,
                plan = %ctx.plan,
                quota = kind.as_str(),
                current,
                limit,
                "Quota exceeded"
            ),
        }

        Ok(decision)
    }

    /// Like [`check_and_reserve`](Self::check_and_reserve) but fails with
    /// [`DomainError::QuotaExceeded`] on denial.
    pub async fn ensure(&self, ctx: &RequestContext, kind: QuotaKind) -> Result<(), DomainError> {
        self.check_and_reserve(ctx, kind).await?.into_result(kind)
    }

    pub async fn usage(&self, ctx: &RequestContext) -> Result<QuotaUsage, DomainError> {
        let entitlements = ctx.entitlements();
        let forms = self.current(ctx, QuotaKind::Forms).await?;
        let submissions = self.current(ctx, QuotaKind::MonthlySubmissions).await?;

        Ok(QuotaUsage {
            plan: ctx.plan,
            forms: UsageMetric {
                current: forms,
                limit: entitlements.max_forms,
            },
            monthly_submissions: UsageMetric {
                current: submissions,
                limit: entitlements.max_submissions_per_month,
            },
        })
    }
}
