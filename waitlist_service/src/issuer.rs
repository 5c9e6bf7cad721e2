// Waitlist issuer
//
// Turns a signup submission into a signed confirmation link and hands it to
// the mailer. Nothing is stored; the link itself is the only record.

use crate::config::{IssuerSettings, MailSettings};
use crate::crypto::{ConfirmationClaims, Hs256Signer, TokenSigner};
use crate::error::{Result, WaitlistError};
use crate::mail::{escape_html, LogMailer, Mailer, OutgoingEmail, ResendMailer};
use crate::validation::is_valid_email;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};
use url::Url;
use uuid::Uuid;

/// Subject line of the confirmation mail
pub const CONFIRMATION_SUBJECT: &str = "Confirm your email";

/// Path of the confirmation endpoint, relative to the application base URL
pub const CONFIRM_PATH: &str = "confirm";

/// Body of `POST /api/waitlist`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WaitlistSubmission {
    /// Address to confirm
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the terms were accepted
    #[serde(default)]
    pub consent: Option<bool>,
}

/// Issues confirmation links for waitlist signups
pub struct Issuer {
    signer: Arc<dyn TokenSigner>,
    mailer: Arc<dyn Mailer>,
    base_url: Url,
    sender: String,
    token_ttl: Duration,
    strict_email_format: bool,
}

impl Issuer {
    /// Create an issuer over explicit signing and mail capabilities
    pub fn new(
        settings: &IssuerSettings,
        signer: Arc<dyn TokenSigner>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            signer,
            mailer,
            base_url: settings.base_url.clone(),
            sender: settings.sender.clone(),
            token_ttl: settings.token_ttl,
            strict_email_format: settings.strict_email_format,
        }
    }

    /// Create an issuer with the HS256 signer and the configured mail backend
    pub fn from_settings(settings: &IssuerSettings) -> Self {
        let signer: Arc<dyn TokenSigner> = Arc::new(Hs256Signer::new(settings.secret.clone()));
        let mailer: Arc<dyn Mailer> = match &settings.mail {
            MailSettings::Resend { api_key, api_url } => {
                Arc::new(ResendMailer::new(api_key.clone(), api_url.clone()))
            }
            MailSettings::Log => Arc::new(LogMailer),
        };
        Self::new(settings, signer, mailer)
    }

    /// Check a submission and return the address to confirm.
    ///
    /// Only presence is required unless strict email checking is enabled.
    pub fn validate<'a>(&self, submission: &'a WaitlistSubmission) -> Result<&'a str> {
        let email = match submission.email.as_deref() {
            Some(email) if !email.is_empty() => email,
            _ => return Err(WaitlistError::InvalidInput("email is required".to_string())),
        };

        if submission.consent != Some(true) {
            return Err(WaitlistError::InvalidInput("consent is required".to_string()));
        }

        if self.strict_email_format && !is_valid_email(email) {
            return Err(WaitlistError::InvalidInput(
                "email is not a valid address".to_string(),
            ));
        }

        Ok(email)
    }

    /// Mint a confirmation credential for `email`, valid from `now`
    pub fn mint(&self, email: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = ConfirmationClaims::new(email, now, self.token_ttl)?;
        self.signer.sign(&claims)
    }

    /// Link the recipient follows to confirm
    pub fn confirmation_url(&self, token: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WaitlistError::Config("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(CONFIRM_PATH);
        url.set_query(None);
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    /// Mint a credential and return the full confirmation link
    pub fn confirmation_link(&self, email: &str, now: DateTime<Utc>) -> Result<Url> {
        let token = self.mint(email, now)?;
        self.confirmation_url(&token)
    }

    /// Render the confirmation mail for `email`
    pub fn compose(&self, email: &str, link: &Url) -> OutgoingEmail {
        OutgoingEmail {
            from: self.sender.clone(),
            to: email.to_string(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            html: format!(
                "<p>Please <a href=\"{}\">confirm your email</a> to join the waitlist.</p>",
                escape_html(link.as_str())
            ),
        }
    }

    /// Validate a submission, mint its credential and send exactly one
    /// confirmation mail. Delivery is never retried.
    pub async fn submit(&self, submission: &WaitlistSubmission, now: DateTime<Utc>) -> Result<()> {
        let submission_id = Uuid::new_v4();
        let span = info_span!("submission", %submission_id);

        async move {
            let email = self.validate(submission).map_err(|e| {
                info!("Rejected submission: {}", e);
                e
            })?;
            debug!(%email, "Accepted submission");

            let link = self.confirmation_link(email, now).map_err(|e| {
                error!("Failed to mint confirmation link: {}", e);
                e
            })?;

            let message = self.compose(email, &link);
            self.mailer.send(&message).await.map_err(|e| {
                error!("Confirmation mail delivery failed: {}", e);
                e
            })?;

            info!("Confirmation mail sent");
            Ok::<(), WaitlistError>(())
        }
        .instrument(span)
        .await
    }
}
