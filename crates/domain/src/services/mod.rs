//! Domain services for the form backend.
//!
//! Services contain the business logic of the intake and notification
//! pipeline. Everything except the quota ledger and the query service is
//! pure and store-free.

pub mod enrichment;
pub mod mail;
pub mod notification;
pub mod query;
pub mod quota;
pub mod reconcile;
pub mod template;

pub use enrichment::{enrich, RequestMetadata, SubmissionMeta};
pub use mail::{MailError, MailMessage, MailTransport, MockMailTransport};
pub use notification::{decide, ChannelDecision, NotificationContext, NotificationPlan};
pub use query::{resolve_filter, SubmissionQuery, SubmissionQueryService, SubmissionWithLogs};
pub use quota::{check_quota, month_start, QuotaDecision, QuotaKind, QuotaLedger};
pub use reconcile::reconcile;
pub use template::{render_confirmation, render_developer_notice};
