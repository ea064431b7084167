//! Outbound mail abstraction.

use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    #[error("Mail transport rejected the message: {0}")]
    Rejected(String),

    #[error("Mail transport unavailable: {0}")]
    Unavailable(String),

    #[error("Mail send timed out after {0}s")]
    Timeout(u64),
}

/// Send capability used by the delivery executor.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;

    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;
}

/// Recording transport for tests and local development.
#[derive(Debug, Default)]
pub struct MockMailTransport {
    /// Fail every send.
    pub simulate_failure: bool,
    /// Fail sends to this recipient only.
    pub fail_recipient: Option<String>,
    sent: Mutex<Vec<MailMessage>>,
}

impl MockMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that fails every send.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// A transport that fails only for `recipient`.
    pub fn failing_for(recipient: impl Into<String>) -> Self {
        Self {
            fail_recipient: Some(recipient.into()),
            ..Self::default()
        }
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let targeted = self
            .fail_recipient
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(&message.to));

        if self.simulate_failure || targeted {
            tracing::warn!(to = %message.to, "Mock mail transport simulating failure");
            return Err(MailError::Unavailable("Simulated failure".to_string()));
        }

        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Mock: Would send email"
        );
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
