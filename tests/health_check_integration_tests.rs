//! End-to-end health-check scenarios against a mock provider.
//!
//! Each test wires the full router (auth middleware, orchestrator, repos)
//! over an in-memory SQLite database and a wiremock provider serving the
//! token, identity and privileges endpoints.

mod test_utils;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine as _;
use chrono::{Duration, Utc};
use marketplace_connect::models::{oauth_token, sync_log};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{Value, json};
use test_utils::{
    ADMIN_TOKEN, TEST_RU_NAME, insert_account, insert_app_credentials, insert_token,
    insert_token_raw, legacy_refresh_token_json, setup_app, setup_app_with, test_cipher,
};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

const TOKEN_PATH: &str = "/identity/v1/oauth2/token";
const IDENTITY_PATH: &str = "/commerce/identity/v1/user/";
const PRIVILEGES_PATH: &str = "/sell/account/v1/privilege";

async fn call_health_check(
    app: &Router,
    account_id: Uuid,
    bearer: &str,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/health-check?account_id={}", account_id))
                .header("Authorization", format!("Bearer {}", bearer))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn audit_records(db: &DatabaseConnection) -> Vec<sync_log::Model> {
    sync_log::Entity::find().all(db).await.unwrap()
}

async fn current_token(db: &DatabaseConnection, account_id: Uuid) -> oauth_token::Model {
    oauth_token::Entity::find()
        .filter(oauth_token::Column::AccountId.eq(account_id))
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

fn mock_identity_ok() -> Mock {
    Mock::given(method("GET"))
        .and(path(IDENTITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "seller-123",
            "username": "test_seller"
        })))
}

fn mock_privileges_ok() -> Mock {
    Mock::given(method("GET"))
        .and(path(PRIVILEGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sellingLimit": { "amount": { "value": "5000.0", "currency": "USD" } }
        })))
}

fn mock_refresh_grant(new_access: &str, rotated_refresh: Option<&str>) -> Mock {
    let mut body = json!({
        "access_token": new_access,
        "expires_in": 7200,
        "token_type": "Bearer"
    });
    if let Some(rotated) = rotated_refresh {
        body["refresh_token"] = json!(rotated);
    }

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

#[tokio::test]
async fn happy_path_returns_ok_with_zero_retries() {
    let server = MockServer::start().await;
    mock_identity_ok().expect(1).mount(&server).await;
    mock_privileges_ok().expect(1).mount(&server).await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("valid-access-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        Some("https://api.ebay.com/oauth/api_scope sell.account"),
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["environment"], json!("sandbox"));
    assert_eq!(body["identity"]["username"], json!("test_seller"));
    assert!(body["privileges"].is_object());
    assert!(
        body["scopes"]
            .as_str()
            .unwrap()
            .contains("sell.account")
    );

    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].operation, "health_check");
    assert_eq!(logs[0].outcome, "ok");
    assert_eq!(logs[0].http_status, Some(200));
    assert_eq!(logs[0].retry_count, 0);
    assert_eq!(logs[0].provider, "ebay");
}

#[tokio::test]
async fn expired_token_is_refreshed_before_probe() {
    let server = MockServer::start().await;
    // The refresh grant must authenticate with Basic auth and carry the
    // redirect identifier plus the default scope (stored scope is blank).
    mock_refresh_grant("fresh-access-token", None)
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(IDENTITY_PATH))
        .and(header("authorization", "Bearer fresh-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "s"})))
        .expect(1)
        .mount(&server)
        .await;
    mock_privileges_ok().expect(1).mount(&server).await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("stale-access-token"),
        Some(Utc::now() - Duration::minutes(10)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();
    let before = current_token(&db, account_id).await;

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));

    // New generation persisted: fresh access token and pushed-out expiry,
    // old refresh token kept because the provider did not rotate it.
    let after = current_token(&db, account_id).await;
    assert_eq!(after.access_token.as_deref(), Some("fresh-access-token"));
    assert!(after.expires_at.unwrap().with_timezone(&Utc) > Utc::now());
    assert_eq!(
        after.refresh_token_ciphertext,
        before.refresh_token_ciphertext
    );
    assert_eq!(after.encryption_iv, before.encryption_iv);

    // One refresh, zero probe retries
    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, "ok");
    assert_eq!(logs[0].retry_count, 1);
}

#[tokio::test]
async fn refresh_grant_sends_credentials_ru_name_and_default_scope() {
    let server = MockServer::start().await;
    let expected_basic = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD
            .encode("fallback-client-id:fallback-client-secret")
    );
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("authorization", expected_basic.as_str()))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(TEST_RU_NAME))
        .and(body_string_contains("api_scope"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "expires_in": 7200,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mock_identity_ok().mount(&server).await;
    mock_privileges_ok().mount(&server).await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        None,
        Some(Utc::now() - Duration::minutes(10)),
        Some("refresh-plaintext"),
        Some("   "),
    )
    .await
    .unwrap();

    let (status, _) = call_health_check(&app, account_id, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted_encrypted() {
    let server = MockServer::start().await;
    mock_refresh_grant("fresh-access-token", Some("rotated-refresh"))
        .expect(1)
        .mount(&server)
        .await;
    mock_identity_ok().mount(&server).await;
    mock_privileges_ok().mount(&server).await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("stale"),
        Some(Utc::now() - Duration::minutes(10)),
        Some("old-refresh"),
        None,
    )
    .await
    .unwrap();
    let before = current_token(&db, account_id).await;

    let (status, _) = call_health_check(&app, account_id, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);

    let after = current_token(&db, account_id).await;
    assert_ne!(
        after.refresh_token_ciphertext,
        before.refresh_token_ciphertext
    );
    // A rotated token gets a fresh IV, never a reused one
    assert_ne!(after.encryption_iv, before.encryption_iv);

    let plaintext = test_cipher()
        .decrypt(
            after.refresh_token_ciphertext.as_ref().unwrap(),
            after.encryption_iv.as_ref().unwrap(),
        )
        .expect("persisted ciphertext decrypts");
    assert_eq!(plaintext, b"rotated-refresh");
}

#[tokio::test]
async fn mid_probe_401_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    // First identity call rejects the nominally valid token
    Mock::given(method("GET"))
        .and(path(IDENTITY_PATH))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_refresh_grant("fresh-access-token", None)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(IDENTITY_PATH))
        .and(header("authorization", "Bearer fresh-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "s"})))
        .expect(1)
        .mount(&server)
        .await;
    mock_privileges_ok().expect(1).mount(&server).await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("nominally-valid-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));

    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, "ok");
    assert_eq!(logs[0].retry_count, 1);
}

#[tokio::test]
async fn persistent_401_consumes_exactly_one_refresh() {
    let server = MockServer::start().await;
    // Provider rejects every bearer token on both endpoints
    Mock::given(method("GET"))
        .and(path(IDENTITY_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRIVILEGES_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(0)
        .mount(&server)
        .await;
    // The single allowed refresh; a second call would fail the expectation
    mock_refresh_grant("fresh-access-token", None)
        .expect(1)
        .mount(&server)
        .await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("rejected-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    // Second 401 after the retry is a hard failure, not a refresh loop
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], json!("PROVIDER_ERROR"));

    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, "fail");
    assert_eq!(logs[0].http_status, Some(502));
    assert_eq!(logs[0].retry_count, 1);
}

#[tokio::test]
async fn privileges_403_is_reported_as_soft_failure() {
    let server = MockServer::start().await;
    mock_identity_ok().expect(1).mount(&server).await;
    Mock::given(method("GET"))
        .and(path(PRIVILEGES_PATH))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("valid-access-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    // Still HTTP 200: the grant works, it just lacks the privilege scope
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["reason"], json!("insufficient_permissions"));
    assert_eq!(body["environment"], json!("sandbox"));

    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, "soft_fail");
    assert_eq!(logs[0].retry_count, 0);
}

#[tokio::test]
async fn privileges_401_after_retry_is_soft_failure() {
    let server = MockServer::start().await;
    mock_identity_ok().mount(&server).await;
    Mock::given(method("GET"))
        .and(path(PRIVILEGES_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    mock_refresh_grant("fresh-access-token", None)
        .expect(1)
        .mount(&server)
        .await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("valid-access-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["reason"], json!("insufficient_permissions"));

    let logs = audit_records(&db).await;
    assert_eq!(logs[0].outcome, "soft_fail");
    assert_eq!(logs[0].retry_count, 1);
}

#[tokio::test]
async fn legacy_record_is_migrated_then_refreshed() {
    let server = MockServer::start().await;
    // The grant must receive the plaintext recovered from the legacy
    // encoding, proving migration happened before the refresh.
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("legacy-refresh-plaintext"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "expires_in": 7200,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mock_identity_ok().mount(&server).await;
    mock_privileges_ok().mount(&server).await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token_raw(
        &db,
        account_id,
        Some("stale"),
        Some(Utc::now() - Duration::minutes(10)),
        Some(legacy_refresh_token_json("legacy-refresh-plaintext")),
        None,
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));

    // Subsequent reads use the modern encoding
    let after = current_token(&db, account_id).await;
    let iv = after.encryption_iv.as_ref().expect("iv column populated");
    assert!(!iv.is_empty());
    let plaintext = test_cipher()
        .decrypt(after.refresh_token_ciphertext.as_ref().unwrap(), iv)
        .expect("migrated ciphertext decrypts");
    assert_eq!(plaintext, b"legacy-refresh-plaintext");
}

#[tokio::test]
async fn corrupt_legacy_record_is_unrecoverable_and_untouched() {
    let server = MockServer::start().await;
    // No provider call may happen at all
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut raw = legacy_refresh_token_json("legacy-refresh-plaintext");
    let pos = raw.windows(7).position(|w| w == b"\"data\":").unwrap() + 8;
    raw[pos] = if raw[pos] == b'0' { b'1' } else { b'0' };

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token_raw(
        &db,
        account_id,
        Some("stale"),
        Some(Utc::now() - Duration::minutes(10)),
        Some(raw.clone()),
        None,
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
    assert_eq!(body["code"], json!("TOKEN_UNRECOVERABLE"));

    // Byte-for-byte unchanged
    let after = current_token(&db, account_id).await;
    assert_eq!(after.refresh_token_ciphertext.as_deref(), Some(raw.as_slice()));
    assert!(after.encryption_iv.is_none());
}

#[tokio::test]
async fn unknown_account_is_404_and_audited() {
    let server = MockServer::start().await;
    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("ACCOUNT_NOT_FOUND"));

    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, "fail");
    assert_eq!(logs[0].http_status, Some(404));
}

#[tokio::test]
async fn inactive_account_is_404() {
    let server = MockServer::start().await;
    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", false).await.unwrap();

    let (status, _) = call_health_check(&app, account_id, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_token_record_is_424() {
    let server = MockServer::start().await;
    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
    assert_eq!(body["code"], json!("TOKEN_MISSING"));
}

#[tokio::test]
async fn expired_token_without_refresh_token_is_424() {
    let server = MockServer::start().await;
    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("stale"),
        Some(Utc::now() - Duration::minutes(10)),
        None,
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
    assert_eq!(body["code"], json!("TOKEN_UNRECOVERABLE"));

    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, "fail");
    assert_eq!(logs[0].http_status, Some(424));
}

#[tokio::test]
async fn non_admin_caller_is_403_and_audited() {
    let server = MockServer::start().await;
    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();

    let (status, body) = call_health_check(&app, account_id, "not-an-admin").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!("FORBIDDEN"));

    let logs = audit_records(&db).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, "fail");
    assert_eq!(logs[0].http_status, Some(403));
}

#[tokio::test]
async fn rejected_refresh_grant_maps_to_502_with_provider_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("stale"),
        Some(Utc::now() - Duration::minutes(10)),
        Some("revoked-refresh"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], json!("PROVIDER_ERROR"));
    // The provider's OAuth error code is surfaced for operators
    assert_eq!(body["details"]["error"], json!("invalid_grant"));
    assert_eq!(body["details"]["status"], json!(400));

    let logs = audit_records(&db).await;
    assert_eq!(logs[0].outcome, "fail");
    assert_eq!(logs[0].http_status, Some(502));
    assert_eq!(logs[0].retry_count, 1);
}

#[tokio::test]
async fn identity_5xx_maps_to_502() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(IDENTITY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("valid-access-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], json!("PROVIDER_ERROR"));
}

#[tokio::test]
async fn unresolvable_credentials_are_a_configuration_error() {
    let server = MockServer::start().await;
    let (app, db) = setup_app_with(&server.uri(), |config| {
        config.marketplace.fallback_client_id = None;
        config.marketplace.fallback_client_secret = None;
    })
    .await
    .unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("valid-access-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("CONFIGURATION_MISSING"));

    let logs = audit_records(&db).await;
    assert_eq!(logs[0].outcome, "fail");
    assert_eq!(logs[0].http_status, Some(500));
}

#[tokio::test]
async fn missing_redirect_identifier_is_a_configuration_error() {
    let server = MockServer::start().await;
    let (app, db) = setup_app_with(&server.uri(), |config| {
        config.marketplace.sandbox.ru_name = None;
    })
    .await
    .unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_token(
        &db,
        account_id,
        Some("valid-access-token"),
        Some(Utc::now() + Duration::hours(1)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, body) = call_health_check(&app, account_id, ADMIN_TOKEN).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("CONFIGURATION_MISSING"));
}

#[tokio::test]
async fn encrypted_app_credentials_row_wins_over_fallback() {
    let server = MockServer::start().await;
    let expected_basic = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("row-client-id:row-client-secret")
    );
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("authorization", expected_basic.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "expires_in": 7200,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mock_identity_ok().mount(&server).await;
    mock_privileges_ok().mount(&server).await;

    let (app, db) = setup_app(&server.uri()).await.unwrap();
    let account_id = Uuid::new_v4();
    insert_account(&db, account_id, "sandbox", true).await.unwrap();
    insert_app_credentials(&db, "sandbox", "row-client-id", "row-client-secret")
        .await
        .unwrap();
    insert_token(
        &db,
        account_id,
        Some("stale"),
        Some(Utc::now() - Duration::minutes(10)),
        Some("refresh-plaintext"),
        None,
    )
    .await
    .unwrap();

    let (status, _) = call_health_check(&app, account_id, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
}
