// API module for the waitlist service
//
// This module implements the HTTP API: the signup endpoint served by the
// issuer and the confirmation endpoint served by the verifier.
//
// # API Endpoints
//
// * `POST /api/waitlist` - submit `{ email, consent }`, sends a confirmation mail
// * `GET /confirm?token=...` - confirm an emailed link
// * `GET /health` - liveness probe
//
// # Example
//
// ```bash
// curl -X POST http://localhost:8787/api/waitlist \
//   -H 'Content-Type: application/json' \
//   -d '{"email":"test@example.com","consent":true}'
// ```

use crate::error::{Result, WaitlistError};
use crate::issuer::Issuer;
use crate::verifier::Verifier;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod handlers;

pub use handlers::*;

/// Application state shared with all routes.
///
/// Both services are immutable once built, so handlers share them without locking.
#[derive(Clone)]
pub struct AppState {
    /// Signup issuer; absent when only the verifier is configured
    pub issuer: Option<Arc<Issuer>>,
    /// Confirmation verifier
    pub verifier: Arc<Verifier>,
}

impl AppState {
    /// State serving both endpoints
    pub fn new(issuer: Issuer, verifier: Verifier) -> Self {
        Self {
            issuer: Some(Arc::new(issuer)),
            verifier: Arc::new(verifier),
        }
    }

    /// State serving confirmations only
    pub fn verifier_only(verifier: Verifier) -> Self {
        Self {
            issuer: None,
            verifier: Arc::new(verifier),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/waitlist", post(handlers::join_waitlist))
        .route("/confirm", get(handlers::confirm))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// API Server
pub struct ApiServer {
    /// Shared handler state
    state: AppState,
    /// Server bind address
    bind_address: String,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(state: AppState, bind_address: String) -> Self {
        Self {
            state,
            bind_address,
        }
    }

    /// Start the API server
    pub async fn start(&self) -> Result<()> {
        let app = create_router(self.state.clone());

        // Parse the bind address
        let addr: SocketAddr = self
            .bind_address
            .parse()
            .map_err(|e| WaitlistError::Config(format!("Invalid bind address: {}", e)))?;

        if self.state.issuer.is_none() {
            warn!("Issuer not configured, signups will be answered with a server error");
        }
        info!("Starting API server on {}", addr);

        axum::Server::try_bind(&addr)
            .map_err(|e| WaitlistError::Config(format!("Failed to bind {}: {}", addr, e)))?
            .serve(app.into_make_service())
            .await
            .map_err(|e| WaitlistError::Io(format!("Server error: {}", e)))?;

        Ok(())
    }
}
