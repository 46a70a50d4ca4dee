#![allow(clippy::unwrap_used)]
// Integration tests for `PlatformClient` using wiremock.

use serde_json::json;
use tokio_test::assert_ok;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use softline_api::{AuthenticateReply, Error, PlatformClient, ProfileReply};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PlatformClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = PlatformClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn secret(s: &str) -> secrecy::SecretString {
    s.to_string().into()
}

// ── Credential exchange ─────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_issues_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/permission/apitoken/"))
        .and(body_json(json!({
            "email": "alice@example.com",
            "password": "hunter2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "api_token": "tok-123",
        })))
        .mount(&server)
        .await;

    let reply = assert_ok!(
        client
            .authenticate("alice@example.com", &secret("hunter2"), None)
            .await
    );

    match reply {
        AuthenticateReply::Issued { api_token } => assert_eq!(api_token, "tok-123"),
        other => panic!("expected Issued, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_sends_second_factor() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/permission/apitoken/"))
        .and(body_json(json!({
            "email": "alice@example.com",
            "password": "hunter2",
            "two_factor_token": "123456",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "api_token": "tok-2fa",
        })))
        .mount(&server)
        .await;

    let reply = client
        .authenticate("alice@example.com", &secret("hunter2"), Some("123456"))
        .await
        .unwrap();

    assert!(matches!(reply, AuthenticateReply::Issued { .. }));
}

#[tokio::test]
async fn test_authenticate_field_errors() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/permission/apitoken/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "apitoken": {
                "email": ["invalid credentials"],
                "password": ["invalid credentials"],
            },
        })))
        .mount(&server)
        .await;

    let reply = client
        .authenticate("alice@example.com", &secret("wrong"), None)
        .await
        .unwrap();

    match reply {
        AuthenticateReply::Rejected(rejection) => {
            assert_eq!(rejection.status, 400);
            let errors = rejection.field_errors.unwrap();
            assert!(!errors.email.is_empty());
            assert!(errors.two_factor_token.is_empty());
        }
        other => panic!("expected Rejected, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_error_message() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/permission/apitoken/"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Te veel mislukte pogingen, probeer opnieuw om 12:30" },
        })))
        .mount(&server)
        .await;

    let reply = client
        .authenticate("alice@example.com", &secret("hunter2"), None)
        .await
        .unwrap();

    match reply {
        AuthenticateReply::Rejected(rejection) => {
            assert_eq!(rejection.status, 429);
            assert!(rejection.error_message.unwrap().ends_with("12:30"));
        }
        other => panic!("expected Rejected, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_unrecognized_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/permission/apitoken/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let reply = client
        .authenticate("alice@example.com", &secret("hunter2"), None)
        .await
        .unwrap();

    match reply {
        AuthenticateReply::Rejected(rejection) => {
            assert_eq!(rejection.status, 500);
            assert!(rejection.field_errors.is_none());
            assert!(rejection.error_message.is_none());
        }
        other => panic!("expected Rejected, got: {other:?}"),
    }
}

// ── Profile fetch ───────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_profile_sends_auth_header() {
    let (server, client) = setup().await;
    client.set_auth("alice@example.com", secret("tok-123"));

    Mock::given(method("GET"))
        .and(path("/api/permission/systemuser/profile/"))
        .and(header("authorization", "Token alice@example.com:tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client": "/api/apprelation/client/540111/",
            "id": 500911,
            "first_name": "Alice",
            "preposition": "van",
            "last_name": "Dijk",
            "token": "sip-secret",
        })))
        .mount(&server)
        .await;

    let reply = client.fetch_profile().await.unwrap();

    match reply {
        ProfileReply::Profile(profile) => {
            assert_eq!(profile.id, 500911);
            assert_eq!(profile.first_name, "Alice");
            assert_eq!(profile.token.as_deref(), Some("sip-secret"));
            assert!(profile.selected_account.is_none());
        }
        other => panic!("expected Profile, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_profile_partner_user() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/permission/systemuser/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let reply = client.fetch_profile().await.unwrap();
    assert!(matches!(reply, ProfileReply::NotEntitled));
}

#[tokio::test]
async fn test_fetch_profile_without_client_reference() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/permission/systemuser/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 500911,
            "first_name": "Paula",
            "last_name": "Partner",
        })))
        .mount(&server)
        .await;

    let reply = client.fetch_profile().await.unwrap();
    assert!(matches!(reply, ProfileReply::NotEntitled));
}

#[tokio::test]
async fn test_fetch_profile_password_change_sentinel() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/permission/systemuser/profile/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("\"You need to change your password in the portal\""),
        )
        .mount(&server)
        .await;

    let reply = client.fetch_profile().await.unwrap();
    assert!(matches!(reply, ProfileReply::PasswordChangeRequired));
}

// ── Autologin token ─────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_autologin_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/autologin/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "portal-tok",
        })))
        .mount(&server)
        .await;

    let token = assert_ok!(client.fetch_autologin_token().await);
    assert_eq!(token, "portal-tok");
}

#[tokio::test]
async fn test_fetch_autologin_token_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/autologin/token/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.fetch_autologin_token().await;
    assert!(matches!(result, Err(Error::Unauthorized)));
}

// ── Account selection ───────────────────────────────────────────────

#[tokio::test]
async fn test_select_account() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/plugin/user/selected_account/"))
        .and(body_json(json!({ "account": 42 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account": {
                "id": 42,
                "internal_number": 201,
                "description": "Support desk",
                "account_id": 170001234,
                "password": "account-secret",
            },
        })))
        .mount(&server)
        .await;

    let account = assert_ok!(client.select_account(42).await);

    assert_eq!(account.id, 42);
    assert_eq!(account.internal_number, 201);
    assert_eq!(account.description, "Support desk");
    assert_eq!(account.account_id, 170_001_234);
    assert_eq!(account.password.as_deref(), Some("account-secret"));
}

#[tokio::test]
async fn test_select_account_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/plugin/user/selected_account/"))
        .respond_with(ResponseTemplate::new(400).set_body_string("no such account"))
        .mount(&server)
        .await;

    let result = client.select_account(42).await;

    match result {
        Err(Error::Api { status, ref message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("no such account"));
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}
