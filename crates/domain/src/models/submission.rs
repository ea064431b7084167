//! Submission domain models and list filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Reserved top-level key written by the analytics enricher.
pub const META_KEY: &str = "_meta";

/// One end-user submission against a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub form_id: Uuid,
    /// Submitted payload plus the `_meta` object.
    pub data: JsonValue,
    /// Normalized copy of `data.email`, indexed for search and uniqueness.
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Raw `email` field of the payload, if it is a string.
    pub fn data_email(&self) -> Option<&str> {
        self.data.get("email").and_then(JsonValue::as_str)
    }

    /// Email address to confirm, when the payload carries a plausible one.
    pub fn submitter_email(&self) -> Option<String> {
        self.data_email()
            .filter(|email| shared::validation::is_plausible_email(email))
            .map(|email| email.trim().to_string())
    }
}

/// Input for inserting a submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_id: Uuid,
    pub data: JsonValue,
    pub email: Option<String>,
}

impl NewSubmission {
    pub fn new(form_id: Uuid, data: JsonValue) -> Self {
        let email = data
            .get("email")
            .and_then(JsonValue::as_str)
            .map(shared::validation::normalize_email)
            .filter(|email| !email.is_empty());

        Self {
            form_id,
            data,
            email,
        }
    }
}

/// Free-text search over submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    /// `@`-prefixed search: substring of the submission id.
    IdFragment(String),
    /// Case-insensitive substring of the submitter email.
    Email(String),
}

impl SearchTerm {
    /// Parses raw search input; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(fragment) = raw.strip_prefix('@') {
            let fragment = fragment.trim().to_lowercase();
            return (!fragment.is_empty()).then_some(SearchTerm::IdFragment(fragment));
        }
        (!raw.is_empty()).then(|| SearchTerm::Email(raw.to_lowercase()))
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        match self {
            SearchTerm::IdFragment(fragment) => submission.id.to_string().contains(fragment.as_str()),
            SearchTerm::Email(needle) => {
                let in_column = submission
                    .email
                    .as_deref()
                    .is_some_and(|email| email.to_lowercase().contains(needle.as_str()));
                let in_data = submission
                    .data_email()
                    .is_some_and(|email| email.to_lowercase().contains(needle.as_str()));
                in_column || in_data
            }
        }
    }

    /// SQL `ILIKE` pattern for the term.
    pub fn like_pattern(&self) -> String {
        let escaped = match self {
            SearchTerm::IdFragment(s) | SearchTerm::Email(s) => s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_"),
        };
        format!("%{}%", escaped)
    }
}

/// Store-level submission filter, always scoped to one tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionFilter {
    pub tenant_id: Uuid,
    pub form_id: Option<Uuid>,
    pub search: Option<SearchTerm>,
    /// Inclusive lower bound.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub created_before: Option<DateTime<Utc>>,
    /// Page window applied after ordering; `None` returns every match.
    pub limit: Option<u32>,
    pub offset: u64,
}

impl SubmissionFilter {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            form_id: None,
            search: None,
            created_from: None,
            created_before: None,
            limit: None,
            offset: 0,
        }
    }

    /// Restricts the listing to one page of the ordered matches.
    pub fn windowed(mut self, limit: u32, offset: u64) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Checks everything except tenant ownership, which needs the form.
    /// The page window is not part of matching.
    pub fn matches(&self, submission: &Submission) -> bool {
        if self.form_id.is_some_and(|id| id != submission.form_id) {
            return false;
        }
        if self.created_from.is_some_and(|from| submission.created_at < from) {
            return false;
        }
        if self
            .created_before
            .is_some_and(|before| submission.created_at >= before)
        {
            return false;
        }
        self.search.as_ref().map_or(true, |term| term.matches(submission))
    }
}

/// Newest first, ties broken by id.
pub fn newest_first(a: &Submission, b: &Submission) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
