// Configuration module for the waitlist service
//
// Configuration is loaded once at process start from an optional TOML file,
// then overlaid with environment variables. The issuer and the verifier each
// pull the subset they need out of it and fail fast on anything missing.

use crate::crypto::SigningSecret;
use crate::error::{Result, WaitlistError};
use crate::mail::DEFAULT_RESEND_API_URL;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use url::Url;

/// Prefix for structured environment overrides, e.g. `WAITLIST__API__BIND_ADDRESS`
pub const ENV_PREFIX: &str = "WAITLIST";

/// Deployment variables honoured directly, mapped onto config keys
const DEPLOYMENT_ENV: &[(&str, &str)] = &[
    ("JWT_SECRET", "token.signing_secret"),
    ("APP_URL", "app.base_url"),
    ("RESEND_API_KEY", "mail.api_key"),
    ("EMAIL_FROM", "mail.sender"),
];

/// Seven days, the lifetime of a confirmation link
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Waitlist service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API configuration
    pub api: ApiConfig,
    /// Public application settings
    pub app: AppConfig,
    /// Confirmation token settings
    pub token: TokenConfig,
    /// Mail delivery settings
    pub mail: MailConfig,
    /// Issuer behaviour
    pub issuer: IssuerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
}

/// Public application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL confirmation links are built on
    pub base_url: Option<String>,
}

/// Confirmation token settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Shared HMAC secret for signing and verification
    pub signing_secret: Option<String>,
    /// Token lifetime in seconds
    pub ttl_secs: u64,
}

/// Which mail backend delivers confirmation mail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    /// Resend HTTP API
    Resend,
    /// Log only, nothing is delivered
    Log,
}

/// Mail delivery settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Mail backend
    pub provider: MailProvider,
    /// Provider API key
    pub api_key: Option<String>,
    /// Sender address
    pub sender: Option<String>,
    /// Provider endpoint
    pub api_url: String,
}

/// Issuer behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Reject submissions whose email fails the signup form's shape check
    pub strict_email_format: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

// Default values
fn default_bind_address() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: MailProvider::Resend,
            api_key: None,
            sender: None,
            api_url: DEFAULT_RESEND_API_URL.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "Some(<redacted>)"
    } else {
        "None"
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_secret", &redacted(&self.signing_secret))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("provider", &self.provider)
            .field("api_key", &redacted(&self.api_key))
            .field("sender", &self.sender)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Everything the verifier needs
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// Shared secret
    pub secret: SigningSecret,
}

/// Resolved mail delivery settings
#[derive(Debug, Clone)]
pub enum MailSettings {
    /// Deliver through Resend
    Resend {
        /// Provider API key
        api_key: String,
        /// Provider endpoint
        api_url: String,
    },
    /// Log instead of delivering
    Log,
}

/// Everything the issuer needs
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    /// Shared secret
    pub secret: SigningSecret,
    /// Base URL confirmation links are built on
    pub base_url: Url,
    /// Lifetime of a confirmation link
    pub token_ttl: Duration,
    /// Sender address
    pub sender: String,
    /// Mail backend
    pub mail: MailSettings,
    /// Enforce the signup form's email shape check
    pub strict_email_format: bool,
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(WaitlistError::Config(format!("{key} is required"))),
    }
}

impl Config {
    /// Load configuration from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(path, &env)
    }

    /// Load configuration from an optional file and an explicit environment map
    pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(WaitlistError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(::config::File::from(path));
        }

        for (var, key) in DEPLOYMENT_ENV {
            if let Some(value) = env.get(*var) {
                builder = builder.set_override(*key, value.as_str())?;
            }
        }

        // Structured overrides win over the deployment variables.
        let prefix = format!("{ENV_PREFIX}__");
        let mut structured: Vec<(&String, &String)> = env
            .iter()
            .filter(|(var, _)| var.starts_with(&prefix))
            .collect();
        structured.sort();
        for (var, value) in structured {
            let key = var[prefix.len()..].to_ascii_lowercase().replace("__", ".");
            builder = builder.set_override(key, value.as_str())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;

        fs::write(path, config_str)
            .map_err(|e| WaitlistError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Default configuration with a freshly generated signing secret
    pub fn generate() -> Self {
        let mut config = Config::default();
        config.token.signing_secret = Some(SigningSecret::generate_hex());
        config
    }

    /// Settings for the confirmation endpoint. Only the secret is required.
    pub fn verifier_settings(&self) -> Result<VerifierSettings> {
        let secret = required(&self.token.signing_secret, "token.signing_secret")?;
        Ok(VerifierSettings {
            secret: SigningSecret::new(secret)?,
        })
    }

    /// Settings for the signup endpoint. Secret, base URL and sender are
    /// always required; the API key only when mail is actually delivered.
    pub fn issuer_settings(&self) -> Result<IssuerSettings> {
        let VerifierSettings { secret } = self.verifier_settings()?;

        let base_url = required(&self.app.base_url, "app.base_url")?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| WaitlistError::Config(format!("app.base_url is not a URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(WaitlistError::Config(
                "app.base_url cannot be used as a base URL".to_string(),
            ));
        }

        // Links minted now must still carry a representable expiry.
        let token_ttl = i64::try_from(self.token.ttl_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
            .ok_or_else(|| WaitlistError::Config("token.ttl_secs is out of range".to_string()))?;

        let sender = required(&self.mail.sender, "mail.sender")?;

        let mail = match self.mail.provider {
            MailProvider::Resend => MailSettings::Resend {
                api_key: required(&self.mail.api_key, "mail.api_key")?,
                api_url: self.mail.api_url.clone(),
            },
            MailProvider::Log => MailSettings::Log,
        };

        Ok(IssuerSettings {
            secret,
            base_url,
            token_ttl,
            sender,
            mail,
            strict_email_format: self.issuer.strict_email_format,
        })
    }
}

/// Write a default configuration with a random secret, refusing to overwrite
pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if path.exists() {
        return Err(WaitlistError::Config(format!(
            "refusing to overwrite existing config file {}",
            path.display()
        )));
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                WaitlistError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
    }

    let config = Config::generate();
    config.to_file(path)?;
    Ok(config)
}
