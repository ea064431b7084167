//! Submission query and filter service.
//!
//! Submissions are joined with their reconciled logs before status and type
//! filters apply, so a synthesized `SKIPPED` entry is filterable like a
//! persisted one.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::pagination::{Page, Pagination};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::notification::NotificationContext;
use super::reconcile::reconcile;
use crate::error::DomainError;
use crate::models::{
    DisplayLog, EmailSettings, Feature, NotificationStatus, NotificationType, RequestContext,
    SearchTerm, Submission, SubmissionFilter,
};
use crate::store::FormStore;

/// Owner-supplied filters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmissionQuery {
    pub search: Option<String>,
    pub status: Option<NotificationStatus>,
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub form_id: Option<Uuid>,
    /// Inclusive start date (UTC).
    pub start_date: Option<NaiveDate>,
    /// Inclusive end date (UTC).
    pub end_date: Option<NaiveDate>,
}

impl SubmissionQuery {
    pub fn search_only(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            ..Default::default()
        }
    }

    fn has_date_range(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    fn log_matches(&self, log: &DisplayLog) -> bool {
        self.status.map_or(true, |status| log.status == status)
            && self
                .notification_type
                .map_or(true, |t| log.notification_type == t)
    }

    fn filters_logs(&self) -> bool {
        self.status.is_some() || self.notification_type.is_some()
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Converts owner filters into a store filter.
///
/// Date ranges need the date-filter entitlement; the end date is extended
/// by one day and the range is half-open.
pub fn resolve_filter(
    ctx: &RequestContext,
    query: &SubmissionQuery,
) -> Result<SubmissionFilter, DomainError> {
    if query.has_date_range() && !ctx.entitlements().allows(Feature::DateRangeFilters) {
        return Err(DomainError::plan_restricted(Feature::DateRangeFilters));
    }
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(DomainError::Validation(
                "start_date must not be after end_date".into(),
            ));
        }
    }

    let created_before = match query.end_date {
        Some(end) => Some(
            end.checked_add_days(Days::new(1))
                .map(start_of_day)
                .ok_or_else(|| DomainError::Validation("end_date is out of range".into()))?,
        ),
        None => None,
    };

    Ok(SubmissionFilter {
        tenant_id: ctx.tenant_id,
        form_id: query.form_id,
        search: query.search.as_deref().and_then(SearchTerm::parse),
        created_from: query.start_date.map(start_of_day),
        created_before,
        limit: None,
        offset: 0,
    })
}

/// A submission with its reconciled logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionWithLogs {
    #[serde(flatten)]
    pub submission: Submission,
    pub logs: Vec<DisplayLog>,
}

/// Newest first; ties on timestamp broken by submission then type name.
fn log_feed_order(a: &DisplayLog, b: &DisplayLog) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.submission_id.cmp(&a.submission_id))
        .then_with(|| {
            a.notification_type
                .as_str()
                .cmp(b.notification_type.as_str())
        })
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Clone)]
pub struct SubmissionQueryService {
    store: Arc<dyn FormStore>,
}

impl SubmissionQueryService {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    /// Fails with `NotFound` unless the form belongs to the tenant.
    async fn ensure_form_owned(&self, ctx: &RequestContext, form_id: Uuid) -> Result<(), DomainError> {
        match self.store.find_form(form_id).await? {
            Some(form) if form.tenant_id == ctx.tenant_id => Ok(()),
            _ => Err(DomainError::NotFound("Form")),
        }
    }

    async fn contexts_for(
        &self,
        ctx: &RequestContext,
        form_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, NotificationContext>, DomainError> {
        let global_settings = self.store.find_global_settings(ctx.tenant_id).await?;
        let mut contexts = HashMap::new();

        for form_id in form_ids {
            if contexts.contains_key(&form_id) {
                continue;
            }
            let email_settings: Option<EmailSettings> =
                self.store.find_email_settings(form_id).await?;
            contexts.insert(
                form_id,
                NotificationContext {
                    email_settings,
                    global_settings: global_settings.clone(),
                    entitlements: ctx.entitlements(),
                    tenant_email: ctx.email.clone(),
                },
            );
        }

        Ok(contexts)
    }

    async fn with_logs(
        &self,
        ctx: &RequestContext,
        submissions: Vec<Submission>,
    ) -> Result<Vec<SubmissionWithLogs>, DomainError> {
        let ids: Vec<Uuid> = submissions.iter().map(|s| s.id).collect();
        let persisted = if ids.is_empty() {
            Vec::new()
        } else {
            self.store.find_notification_logs_for(&ids).await?
        };

        let mut by_submission: HashMap<Uuid, Vec<_>> = HashMap::new();
        for log in persisted {
            by_submission.entry(log.submission_id).or_default().push(log);
        }

        let form_ids: Vec<Uuid> = submissions.iter().map(|s| s.form_id).collect();
        let contexts = self.contexts_for(ctx, form_ids).await?;

        Ok(submissions
            .into_iter()
            .filter_map(|submission| {
                let notification_ctx = contexts.get(&submission.form_id)?;
                let persisted = by_submission
                    .get(&submission.id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let logs = reconcile(&submission, persisted, notification_ctx);
                Some(SubmissionWithLogs { submission, logs })
            })
            .collect())
    }

    async fn owned_filter(
        &self,
        ctx: &RequestContext,
        query: &SubmissionQuery,
    ) -> Result<SubmissionFilter, DomainError> {
        let filter = resolve_filter(ctx, query)?;
        if let Some(form_id) = filter.form_id {
            self.ensure_form_owned(ctx, form_id).await?;
        }
        Ok(filter)
    }

    /// All matching submissions, newest first, unpaginated.
    async fn load(
        &self,
        ctx: &RequestContext,
        query: &SubmissionQuery,
    ) -> Result<Vec<SubmissionWithLogs>, DomainError> {
        let filter = self.owned_filter(ctx, query).await?;

        let submissions = self.store.list_submissions(&filter).await?;
        let mut items = self.with_logs(ctx, submissions).await?;

        if query.filters_logs() {
            items.retain(|item| item.logs.iter().any(|log| query.log_matches(log)));
        }

        debug!(
            tenant_id = %ctx.tenant_id,
            matched = items.len(),
            "Loaded submissions"
        );

        Ok(items)
    }

    pub async fn query(
        &self,
        ctx: &RequestContext,
        query: &SubmissionQuery,
        pagination: Pagination,
    ) -> Result<Page<SubmissionWithLogs>, DomainError> {
        // Log filters need reconciled logs, so only the store can window
        // queries without them.
        if query.filters_logs() {
            let items = self.load(ctx, query).await?;
            return Ok(Page::from_ordered(items, pagination));
        }

        let filter = self
            .owned_filter(ctx, query)
            .await?
            .windowed(pagination.limit(), pagination.offset());
        let total = self.store.count_submissions(&filter).await?;
        let submissions = self.store.list_submissions(&filter).await?;
        let items = self.with_logs(ctx, submissions).await?;

        Ok(Page::from_window(
            items,
            u64::try_from(total).unwrap_or_default(),
            pagination,
        ))
    }

    /// Flattened reconciled logs, one row per log, newest first.
    pub async fn query_logs(
        &self,
        ctx: &RequestContext,
        query: &SubmissionQuery,
        pagination: Pagination,
    ) -> Result<Page<DisplayLog>, DomainError> {
        let mut logs: Vec<DisplayLog> = self
            .load(ctx, query)
            .await?
            .into_iter()
            .flat_map(|item| item.logs)
            .filter(|log| query.log_matches(log))
            .collect();
        logs.sort_by(log_feed_order);

        Ok(Page::from_ordered(logs, pagination))
    }

    /// Search-only query returning the first page.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        term: &str,
    ) -> Result<Page<SubmissionWithLogs>, DomainError> {
        self.query(ctx, &SubmissionQuery::search_only(term), Pagination::default())
            .await
    }

    /// Every matching submission with its logs.
    pub async fn export(
        &self,
        ctx: &RequestContext,
        query: &SubmissionQuery,
    ) -> Result<Vec<SubmissionWithLogs>, DomainError> {
        self.load(ctx, query).await
    }

    pub async fn logs_for_submission(
        &self,
        ctx: &RequestContext,
        submission_id: Uuid,
    ) -> Result<Vec<DisplayLog>, DomainError> {
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .ok_or(DomainError::NotFound("Submission"))?;
        self.ensure_form_owned(ctx, submission.form_id)
            .await
            .map_err(|_| DomainError::NotFound("Submission"))?;

        let mut items = self.with_logs(ctx, vec![submission]).await?;
        Ok(items.pop().map(|item| item.logs).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanTier;
    use chrono::TimeZone;

    fn ctx(plan: PlanTier) -> RequestContext {
        RequestContext {
            tenant_id: Uuid::new_v4(),
            plan,
            email: "owner@acme.io".into(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_filters_restricted_below_pro() {
        for plan in [PlanTier::Free, PlanTier::Standard] {
            let query = SubmissionQuery {
                start_date: Some(date(2024, 1, 1)),
                ..Default::default()
            };
            let err = resolve_filter(&ctx(plan), &query).unwrap_err();
            assert!(matches!(
                err,
                DomainError::PlanRestricted {
                    required: PlanTier::Pro,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_end_date_inclusive() {
        let query = SubmissionQuery {
            start_date: Some(date(2024, 1, 1)),
            end_date: Some(date(2024, 1, 31)),
            ..Default::default()
        };
        let filter = resolve_filter(&ctx(PlanTier::Pro), &query).unwrap();
        assert_eq!(
            filter.created_from,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            filter.created_before,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_start_after_end_rejected() {
        let query = SubmissionQuery {
            start_date: Some(date(2024, 2, 1)),
            end_date: Some(date(2024, 1, 1)),
            ..Default::default()
        };
        assert!(matches!(
            resolve_filter(&ctx(PlanTier::Pro), &query),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_filter_carries_search_and_form() {
        let form_id = Uuid::new_v4();
        let c = ctx(PlanTier::Free);
        let query = SubmissionQuery {
            search: Some("@abc".into()),
            form_id: Some(form_id),
            ..Default::default()
        };
        let filter = resolve_filter(&c, &query).unwrap();
        assert_eq!(filter.tenant_id, c.tenant_id);
        assert_eq!(filter.form_id, Some(form_id));
        assert_eq!(filter.search, Some(SearchTerm::IdFragment("abc".into())));
        assert_eq!(filter.created_from, None);
    }

    #[test]
    fn test_query_deserializes_type_field() {
        let query: SubmissionQuery = serde_json::from_value(serde_json::json!({
            "type": "DEVELOPER_NOTIFICATION",
            "status": "SKIPPED"
        }))
        .unwrap();
        assert_eq!(
            query.notification_type,
            Some(NotificationType::DeveloperNotification)
        );
        assert_eq!(query.status, Some(NotificationStatus::Skipped));
    }
}
