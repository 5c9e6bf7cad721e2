// API handlers for the waitlist service
//
// This module implements the route handlers for signup and confirmation.

use crate::api::AppState;
use crate::error::{Result, WaitlistError};
use crate::issuer::WaitlistSubmission;
use crate::page::{render_confirmation_page, Language};
use axum::{
    body::Bytes,
    extract::{Json, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error};

/// Query parameters understood by the confirmation endpoint
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfirmParams {
    /// Confirmation credential
    pub token: Option<String>,
    /// Preferred page language
    pub lang: Option<String>,
}

impl ConfirmParams {
    /// Parse a raw query string. The first occurrence of a parameter wins.
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = ConfirmParams::default();
        let Some(query) = query else {
            return params;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "token" if params.token.is_none() => params.token = Some(value.into_owned()),
                "lang" if params.lang.is_none() => params.lang = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "ok": true,
            "service": "waitlist",
        })),
    )
}

/// Waitlist signup handler
///
/// The body is read raw so that unreadable JSON is reported with the same
/// `Invalid request` answer as a missing field. Only a JSON object counts as a
/// submission.
#[axum::debug_handler]
pub async fn join_waitlist(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let submission = parse_submission(&body)?;

    let Some(issuer) = state.issuer.as_ref() else {
        error!("Signup received but the issuer is not configured");
        return Err(WaitlistError::Config("issuer is not configured".into()));
    };

    issuer.submit(&submission, Utc::now()).await?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "ok": true }))))
}

/// Decode a signup body, which must be a JSON object
pub fn parse_submission(body: &[u8]) -> Result<WaitlistSubmission> {
    let unreadable = |e: &dyn std::fmt::Display| {
        debug!("Unreadable submission body: {}", e);
        WaitlistError::InvalidInput(format!("unreadable body: {e}"))
    };

    let value: Value = serde_json::from_slice(body).map_err(|e| unreadable(&e))?;
    if !value.is_object() {
        return Err(unreadable(&"not a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| unreadable(&e))
}

/// Confirmation link handler
#[axum::debug_handler]
pub async fn confirm(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    let params = ConfirmParams::parse(query.as_deref());

    state.verifier.confirm(params.token.as_deref(), Utc::now())?;

    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());
    let lang = Language::negotiate(params.lang.as_deref(), accept_language);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=UTF-8")],
        render_confirmation_page(lang),
    )
        .into_response())
}
