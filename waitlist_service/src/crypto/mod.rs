// Crypto module for the waitlist service
//
// Confirmation credentials are compact HS256 JWTs bound to an email address and
// an expiry. The same shared secret signs and verifies them; nothing about an
// issued credential is stored anywhere.

use crate::error::{Result, WaitlistError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

/// Shared HMAC key used by both the issuer and the verifier.
///
/// The key bytes are wiped on drop and never printed.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    /// Wrap a configured secret. Empty secrets are rejected.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = secret.as_ref();
        if bytes.is_empty() {
            return Err(WaitlistError::Config(
                "signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    /// Generate a fresh 32-byte secret, hex encoded for configuration files
    pub fn generate_hex() -> String {
        let mut bytes = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut *bytes);
        hex::encode(&*bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Payload carried by a confirmation credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationClaims {
    /// Email address the credential confirms
    pub email: String,

    /// Issued-at, seconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiry, seconds since epoch
    pub exp: i64,
}

impl ConfirmationClaims {
    /// Claims for `email` issued at `issued_at` and valid for `ttl`.
    ///
    /// Fails with [`WaitlistError::Signing`] when the expiry is not a representable time.
    pub fn new(email: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Result<Self> {
        let expires = issued_at.checked_add_signed(ttl).ok_or_else(|| {
            WaitlistError::Signing(format!("expiry overflows: {}s after issue", ttl.num_seconds()))
        })?;
        Ok(Self {
            email: email.into(),
            iat: Some(issued_at.timestamp()),
            exp: expires.timestamp(),
        })
    }

    /// Expiry as a timestamp, if representable
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// A credential stops being valid at the exact second of its expiry
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Signing capability used by the issuer and the verifier.
pub trait TokenSigner: Send + Sync {
    /// Mint a credential for the given claims
    fn sign(&self, claims: &ConfirmationClaims) -> Result<String>;

    /// Check signature and expiry, returning the embedded claims.
    ///
    /// Every failure is reported as [`WaitlistError::InvalidToken`].
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ConfirmationClaims>;
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// HS256 JWT signer keyed by the shared secret
#[derive(Debug, Clone)]
pub struct Hs256Signer {
    secret: SigningSecret,
}

impl Hs256Signer {
    /// Create a signer over the shared secret
    pub fn new(secret: SigningSecret) -> Self {
        Self { secret }
    }

    fn mac(&self) -> std::result::Result<HmacSha256, hmac::digest::InvalidLength> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
    }
}

impl TokenSigner for Hs256Signer {
    fn sign(&self, claims: &ConfirmationClaims) -> Result<String> {
        let header = JwtHeader {
            alg: ALGORITHM.to_string(),
            typ: Some(TOKEN_TYPE.to_string()),
        };

        let header_json = serde_json::to_vec(&header)
            .map_err(|e| WaitlistError::Signing(format!("Failed to serialize header: {e}")))?;
        let claims_json = serde_json::to_vec(claims)
            .map_err(|e| WaitlistError::Signing(format!("Failed to serialize claims: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let mut mac = self
            .mac()
            .map_err(|e| WaitlistError::Signing(format!("Invalid HMAC key: {e}")))?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ConfirmationClaims> {
        let invalid = |reason: &str| WaitlistError::InvalidToken(reason.to_string());

        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("malformed token"));
        };

        let header_raw = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| invalid("malformed header encoding"))?;
        let header: JwtHeader =
            serde_json::from_slice(&header_raw).map_err(|_| invalid("malformed header"))?;
        let typ_ok = header
            .typ
            .as_deref()
            .map_or(true, |typ| typ.eq_ignore_ascii_case(TOKEN_TYPE));
        if header.alg != ALGORITHM || !typ_ok {
            return Err(invalid("unsupported header"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| invalid("malformed signature encoding"))?;
        let mut mac = self.mac().map_err(|_| invalid("unusable key"))?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| invalid("signature mismatch"))?;

        let claims_raw = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| invalid("malformed claims encoding"))?;
        let claims: ConfirmationClaims =
            serde_json::from_slice(&claims_raw).map_err(|_| invalid("malformed claims"))?;

        if claims.is_expired_at(now) {
            debug!("Rejecting credential expired at {}", claims.exp);
            return Err(invalid("expired"));
        }

        Ok(claims)
    }
}
