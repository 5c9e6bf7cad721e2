// End-to-end checks of the HTTP surface: signup, confirmation and the error
// answers clients see, driven through the router without binding a socket.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use url::Url;
use waitlist_service::api::{create_router, AppState};
use waitlist_service::config::{IssuerSettings, MailSettings};
use waitlist_service::crypto::{ConfirmationClaims, Hs256Signer, SigningSecret, TokenSigner};
use waitlist_service::issuer::Issuer;
use waitlist_service::mail::{Mailer, OutgoingEmail};
use waitlist_service::verifier::Verifier;
use waitlist_service::{Result, WaitlistError};

const SECRET: &str = "integration-secret";

/// Mailer that records every message and optionally reports failure
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        if self.fail {
            return Err(WaitlistError::Mail(
                "Resend send failed (status=500): upstream secret detail".to_string(),
            ));
        }
        Ok(())
    }
}

fn secret() -> SigningSecret {
    SigningSecret::new(SECRET).unwrap()
}

fn issuer_settings() -> IssuerSettings {
    IssuerSettings {
        secret: secret(),
        base_url: Url::parse("http://example.com").unwrap(),
        token_ttl: Duration::days(7),
        sender: "from@example.com".to_string(),
        mail: MailSettings::Log,
        strict_email_format: false,
    }
}

fn router_with(mailer: Arc<RecordingMailer>) -> Router {
    let signer: Arc<dyn TokenSigner> = Arc::new(Hs256Signer::new(secret()));
    let issuer = Issuer::new(&issuer_settings(), signer.clone(), mailer);
    create_router(AppState::new(issuer, Verifier::new(signer)))
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/waitlist")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_body(response: axum::response::Response) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn token_from_mail(mail: &OutgoingEmail) -> String {
    let start = mail.html.find("href=\"").unwrap() + "href=\"".len();
    let end = start + mail.html[start..].find('"').unwrap();
    let link = Url::parse(&mail.html[start..end].replace("&amp;", "&")).unwrap();
    link.query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn signup_without_consent_is_rejected_without_mail() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = router_with(mailer.clone());

    let response = app
        .oneshot(post_json(r#"{"email":"test@example.com"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_body(response).await, r#"{"error":"Invalid request"}"#);
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn valid_signup_sends_exactly_one_mail() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = router_with(mailer.clone());

    let response = app
        .oneshot(post_json(r#"{"email":"test@example.com","consent":true}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, r#"{"ok":true}"#);

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "test@example.com");
    assert_eq!(sent[0].from, "from@example.com");
    assert!(sent[0].html.contains("http://example.com/confirm?token="));
}

#[tokio::test]
async fn unreadable_body_is_a_client_error() {
    let mailer = Arc::new(RecordingMailer::default());

    for body in [
        "not json",
        "",
        r#"{"email":"test@example.com","consent":"yes"}"#,
        r#"["test@example.com", true]"#,
        r#""test@example.com""#,
        "true",
        "null",
    ] {
        let response = router_with(mailer.clone())
            .oneshot(post_json(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body:?}");
        assert_eq!(read_body(response).await, r#"{"error":"Invalid request"}"#);
    }
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mail_failure_is_a_generic_server_error() {
    let mailer = Arc::new(RecordingMailer {
        fail: true,
        ..Default::default()
    });
    let app = router_with(mailer.clone());

    let response = app
        .oneshot(post_json(r#"{"email":"test@example.com","consent":true}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_body(response).await;
    assert_eq!(body, r#"{"error":"Server error"}"#);
    assert!(!body.contains("upstream"));
    assert_eq!(mailer.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn signup_without_issuer_is_a_server_error() {
    let verifier = Verifier::new(Arc::new(Hs256Signer::new(secret())));
    let app = create_router(AppState::verifier_only(verifier));

    let response = app
        .oneshot(post_json(r#"{"email":"test@example.com","consent":true}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_body(response).await, r#"{"error":"Server error"}"#);
}

#[tokio::test]
async fn unreadable_body_without_issuer_is_still_a_client_error() {
    let verifier = Verifier::new(Arc::new(Hs256Signer::new(secret())));
    let app = create_router(AppState::verifier_only(verifier));

    let response = app.oneshot(post_json("not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_body(response).await, r#"{"error":"Invalid request"}"#);
}

#[tokio::test]
async fn confirm_without_token() {
    let app = router_with(Arc::new(RecordingMailer::default()));

    for uri in ["/confirm", "/confirm?token=", "/confirm?lang=en"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
        assert_eq!(read_body(response).await, "Missing token");
    }
}

#[tokio::test]
async fn confirm_with_garbage_token() {
    let app = router_with(Arc::new(RecordingMailer::default()));

    let response = app.oneshot(get("/confirm?token=garbage")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_body(response).await, "Invalid token");
}

#[tokio::test]
async fn emailed_link_confirms() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = router_with(mailer.clone());

    let response = app
        .clone()
        .oneshot(post_json(r#"{"email":"test@example.com","consent":true}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = token_from_mail(&mailer.sent.lock().unwrap()[0]);
    let uri = format!("/confirm?token={token}");

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=UTF-8"
    );
    assert_eq!(
        read_body(response).await,
        "<!DOCTYPE html><html lang=\"ja\"><meta charset=\"utf-8\" /><body>登録完了</body></html>"
    );

    // No redemption record: the same link confirms again.
    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn confirmation_page_language() {
    let signer = Hs256Signer::new(secret());
    let token = signer
        .sign(&ConfirmationClaims::new(
            "test@example.com",
            Utc::now(),
            Duration::days(7),
        )
        .unwrap())
        .unwrap();
    let app = router_with(Arc::new(RecordingMailer::default()));

    let response = app
        .clone()
        .oneshot(get(&format!("/confirm?token={token}&lang=en")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_body(response).await.contains("Registration complete"));

    let request = Request::builder()
        .uri(format!("/confirm?token={token}"))
        .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(read_body(response).await.contains("lang=\"en\""));
}

#[tokio::test]
async fn expired_token_is_invalid() {
    let signer = Hs256Signer::new(secret());
    let issued = Utc::now() - Duration::days(8);
    let token = signer
        .sign(&ConfirmationClaims::new(
            "test@example.com",
            issued,
            Duration::days(7),
        )
        .unwrap())
        .unwrap();
    let app = router_with(Arc::new(RecordingMailer::default()));

    let response = app
        .oneshot(get(&format!("/confirm?token={token}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_body(response).await, "Invalid token");
}

#[tokio::test]
async fn token_from_another_secret_is_invalid() {
    let other = Hs256Signer::new(SigningSecret::new("some-other-secret").unwrap());
    let token = other
        .sign(&ConfirmationClaims::new(
            "test@example.com",
            Utc::now(),
            Duration::days(7),
        )
        .unwrap())
        .unwrap();
    let app = router_with(Arc::new(RecordingMailer::default()));

    let response = app
        .oneshot(get(&format!("/confirm?token={token}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_body(response).await, "Invalid token");
}

#[tokio::test]
async fn health_endpoint() {
    let app = router_with(Arc::new(RecordingMailer::default()));

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
    assert_eq!(body["ok"], true);
}
