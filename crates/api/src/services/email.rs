//! Mail transport adapters.
//!
//! Supported providers:
//! - `console`: logs messages instead of sending them (development)
//! - `http`: posts to a Resend-compatible `POST /emails` API

use async_trait::async_trait;
use domain::services::{MailError, MailMessage, MailTransport};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::EmailConfig;

/// Logs every message at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleMailTransport;

#[async_trait]
impl MailTransport for ConsoleMailTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            reply_to = ?message.reply_to,
            "Email (console provider)"
        );
        debug!(html_length = message.html.len(), "Email body");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Sends through an HTTP email API.
#[derive(Debug, Clone)]
pub struct HttpMailTransport {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpMailTransport {
    pub fn new(config: &EmailConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Request body for the provider API.
fn api_payload(message: &MailMessage) -> JsonValue {
    let mut body = json!({
        "from": message.from,
        "to": [message.to],
        "subject": message.subject,
        "html": message.html,
    });
    if let Some(reply_to) = &message.reply_to {
        body["reply_to"] = json!(reply_to);
    }
    body
}

/// Client errors mean the provider refused this message; anything else is
/// treated as the provider being unavailable.
fn classify_failure(status: StatusCode, body: &str) -> MailError {
    let detail = format!("{} {}", status.as_u16(), body.trim());
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        MailError::Rejected(detail)
    } else {
        MailError::Unavailable(detail)
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&api_payload(message))
            .send()
            .await
            .map_err(|e| MailError::Unavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(to = %message.to, status = status.as_u16(), "Email provider returned an error");
        Err(classify_failure(status, &body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Builds the transport named by `email.provider`.
pub fn build_transport(config: &EmailConfig) -> Result<Arc<dyn MailTransport>, reqwest::Error> {
    match config.provider.as_str() {
        "http" => Ok(Arc::new(HttpMailTransport::new(config)?)),
        "console" => Ok(Arc::new(ConsoleMailTransport)),
        other => {
            warn!(provider = %other, "Unknown email provider, falling back to console");
            Ok(Arc::new(ConsoleMailTransport))
        }
    }
}
