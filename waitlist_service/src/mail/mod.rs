// Mail module for the waitlist service
//
// Outbound confirmation mail goes through the `Mailer` capability. The
// production implementation talks to the Resend HTTP API; the log mailer is a
// stand-in for local development that never leaves the process.

use crate::error::{Result, WaitlistError};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

/// Default Resend endpoint for sending a single message
pub const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com/emails";

/// A fully rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
}

/// Mail delivery capability.
///
/// One call is one delivery attempt; implementations must not retry.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or report why it was not accepted
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Mailer backed by the Resend REST API
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl ResendMailer {
    /// Create a new Resend mailer
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        debug!("Sending confirmation mail via {}", self.api_url);

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(WaitlistError::Mail(format!(
            "Resend send failed (status={status}): {body}"
        )))
    }
}

/// Mailer that only logs what it would have sent
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!(
            subject = %email.subject,
            "Mail delivery disabled, confirmation mail not sent"
        );
        debug!(to = %email.to, html = %email.html, "Suppressed confirmation mail");
        Ok(())
    }
}

/// Escape text for use inside an HTML attribute or element
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
