// Confirmation verifier
//
// Checks the credential carried by a confirmation link. Verification has no
// side effects: there is no redemption record, so a link keeps confirming
// until it expires.

use crate::config::VerifierSettings;
use crate::crypto::{ConfirmationClaims, Hs256Signer, TokenSigner};
use crate::error::{Result, WaitlistError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Verifies confirmation credentials
pub struct Verifier {
    signer: Arc<dyn TokenSigner>,
}

impl Verifier {
    /// Create a verifier over an explicit signing capability
    pub fn new(signer: Arc<dyn TokenSigner>) -> Self {
        Self { signer }
    }

    /// Create a verifier with the HS256 signer
    pub fn from_settings(settings: &VerifierSettings) -> Self {
        Self::new(Arc::new(Hs256Signer::new(settings.secret.clone())))
    }

    /// Confirm the credential from a link, if one was supplied
    pub fn confirm(&self, token: Option<&str>, now: DateTime<Utc>) -> Result<ConfirmationClaims> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => {
                debug!("Confirmation request without token");
                return Err(WaitlistError::MissingToken);
            }
        };

        match self.signer.verify(token, now) {
            Ok(claims) => {
                info!("Confirmation credential accepted");
                Ok(claims)
            }
            Err(WaitlistError::InvalidToken(reason)) => {
                info!("Confirmation credential rejected: {}", reason);
                Err(WaitlistError::InvalidToken(reason))
            }
            // Anything else a signer reports is still a bad credential from the caller's view.
            Err(other) => {
                info!("Confirmation credential rejected: {}", other);
                Err(WaitlistError::InvalidToken(other.to_string()))
            }
        }
    }
}
