// Waitlist Service
//
// This crate implements the backend of a waitlist landing page: a signup
// endpoint that mails a signed confirmation link, and a confirmation endpoint
// that checks it. Both halves are stateless and share nothing but a signing
// secret.
//
// # Architecture
//
// * **API Layer**: axum routes for signup, confirmation and health
// * **Issuer**: validates submissions, mints credentials, sends mail
// * **Verifier**: checks credential signature and expiry
// * **Crypto**: HS256 credential encoding behind the `TokenSigner` trait
// * **Mail**: delivery behind the `Mailer` trait
//
// # Usage
//
// ```rust,no_run
// use waitlist_service::api::{ApiServer, AppState};
// use waitlist_service::config::Config;
// use waitlist_service::issuer::Issuer;
// use waitlist_service::verifier::Verifier;
//
// async fn example() -> Result<(), Box<dyn std::error::Error>> {
//     let config = Config::load(None)?;
//     let issuer = Issuer::from_settings(&config.issuer_settings()?);
//     let verifier = Verifier::from_settings(&config.verifier_settings()?);
//
//     let server = ApiServer::new(AppState::new(issuer, verifier), config.api.bind_address);
//     server.start().await?;
//     Ok(())
// }
// ```

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod issuer;
pub mod mail;
pub mod page;
pub mod validation;
pub mod verifier;

pub use error::{Result, WaitlistError};
