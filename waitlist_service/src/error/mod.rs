// Error handling module for the waitlist service
//
// This module defines the error taxonomy shared by the issuer and verifier and
// its mapping onto HTTP responses. Client-correctable errors keep their fixed
// public message; everything else collapses into an opaque server error.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::io;
use std::result;
use thiserror::Error;

/// Result type for waitlist service operations
pub type Result<T> = result::Result<T, WaitlistError>;

/// Public body for rejected submissions
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request";

/// Public body for any internal failure
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

/// Public body when the confirmation link carries no token
pub const MISSING_TOKEN_MESSAGE: &str = "Missing token";

/// Public body when the confirmation token does not verify
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

/// Error type for waitlist service operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitlistError {
    /// Submission is missing the email or consent
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Confirmation request carried no token
    #[error("Missing token")]
    MissingToken,

    /// Token failed signature, structure or expiry checks
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token could not be minted
    #[error("Signing error: {0}")]
    Signing(String),

    /// Mail provider rejected or failed the delivery
    #[error("Mail error: {0}")]
    Mail(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl WaitlistError {
    /// HTTP status the error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            WaitlistError::InvalidInput(_)
            | WaitlistError::MissingToken
            | WaitlistError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Implement IntoResponse for WaitlistError so it can be returned directly from handlers
///
/// Submission errors answer with a JSON body, confirmation errors with plain text.
/// Internal detail never leaves the process.
impl IntoResponse for WaitlistError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            WaitlistError::MissingToken => plain_text(status, MISSING_TOKEN_MESSAGE),
            WaitlistError::InvalidToken(_) => plain_text(status, INVALID_TOKEN_MESSAGE),
            WaitlistError::InvalidInput(_) => {
                let body = Json(serde_json::json!({ "error": INVALID_REQUEST_MESSAGE }));
                (status, body).into_response()
            }
            _ => {
                let body = Json(serde_json::json!({ "error": SERVER_ERROR_MESSAGE }));
                (status, body).into_response()
            }
        }
    }
}

fn plain_text(status: StatusCode, message: &'static str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        message,
    )
        .into_response()
}

// Implement conversion from io::Error to WaitlistError
impl From<io::Error> for WaitlistError {
    fn from(err: io::Error) -> Self {
        WaitlistError::Io(err.to_string())
    }
}

// Implement conversion from reqwest error to WaitlistError
impl From<reqwest::Error> for WaitlistError {
    fn from(err: reqwest::Error) -> Self {
        WaitlistError::Mail(err.to_string())
    }
}

// Implement conversion from config error to WaitlistError
impl From<::config::ConfigError> for WaitlistError {
    fn from(err: ::config::ConfigError) -> Self {
        WaitlistError::Config(err.to_string())
    }
}

// Implement conversion from toml serialization error to WaitlistError
impl From<toml::ser::Error> for WaitlistError {
    fn from(err: toml::ser::Error) -> Self {
        WaitlistError::Config(err.to_string())
    }
}

// Implement conversion from toml deserialization error to WaitlistError
impl From<toml::de::Error> for WaitlistError {
    fn from(err: toml::de::Error) -> Self {
        WaitlistError::Config(err.to_string())
    }
}

// Implement conversion from serde_json::Error to WaitlistError
impl From<serde_json::Error> for WaitlistError {
    fn from(err: serde_json::Error) -> Self {
        WaitlistError::Json(err.to_string())
    }
}
