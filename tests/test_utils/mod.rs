//! Test utilities for database and application testing.
//!
//! This module provides helpers for setting up in-memory SQLite databases
//! with migrations applied, inserting fixture rows for the four tables, and
//! building an application router pointed at a mock provider.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use marketplace_connect::config::{AppConfig, MarketplaceConfig, MarketplaceEnvConfig};
use marketplace_connect::crypto::{MasterKey, TokenCipher};
use marketplace_connect::models::{marketplace_account, oauth_token, provider_app_credentials};
use marketplace_connect::server::{AppState, create_app};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use uuid::Uuid;

#[allow(dead_code)]
pub const ADMIN_TOKEN: &str = "admin-test-token";
#[allow(dead_code)]
pub const TEST_RU_NAME: &str = "Test_App-Test_RuName";

/// The fixed master key used across integration tests
#[allow(dead_code)]
pub fn test_key_bytes() -> Vec<u8> {
    vec![42u8; 32]
}

/// Cipher over the test master key
#[allow(dead_code)]
pub fn test_cipher() -> TokenCipher {
    TokenCipher::new(MasterKey::new(test_key_bytes()).expect("valid test key"))
}

/// Sets up an in-memory SQLite database with all migrations applied.
#[allow(dead_code)]
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Configuration pointing every provider endpoint at the given mock server
#[allow(dead_code)]
pub fn test_config(mock_uri: &str) -> AppConfig {
    AppConfig {
        admin_tokens: vec![ADMIN_TOKEN.to_string()],
        crypto_key: Some(test_key_bytes()),
        marketplace: MarketplaceConfig {
            sandbox: MarketplaceEnvConfig {
                api_base: mock_uri.to_string(),
                auth_base: mock_uri.to_string(),
                ru_name: Some(TEST_RU_NAME.to_string()),
            },
            production: MarketplaceEnvConfig {
                api_base: mock_uri.to_string(),
                auth_base: mock_uri.to_string(),
                ru_name: Some(TEST_RU_NAME.to_string()),
            },
            fallback_client_id: Some("fallback-client-id".to_string()),
            fallback_client_secret: Some("fallback-client-secret".to_string()),
            ..MarketplaceConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Builds the application router over a fresh database and the mock provider
#[allow(dead_code)]
pub async fn setup_app(mock_uri: &str) -> Result<(axum::Router, DatabaseConnection)> {
    setup_app_with(mock_uri, |_| {}).await
}

/// Like [`setup_app`], with a hook to adjust the configuration first
#[allow(dead_code)]
pub async fn setup_app_with(
    mock_uri: &str,
    adjust: impl FnOnce(&mut AppConfig),
) -> Result<(axum::Router, DatabaseConnection)> {
    let db = setup_test_db().await?;
    let mut config = test_config(mock_uri);
    adjust(&mut config);
    let state = AppState::new(Arc::new(config), db.clone())?;
    Ok((create_app(state), db))
}

/// Inserts a marketplace account row
#[allow(dead_code)]
pub async fn insert_account(
    db: &DatabaseConnection,
    id: Uuid,
    environment: &str,
    is_active: bool,
) -> Result<()> {
    let now = Utc::now();
    marketplace_account::ActiveModel {
        id: Set(id),
        provider: Set("ebay".to_string()),
        environment: Set(environment.to_string()),
        display_name: Set(Some("Test Seller".to_string())),
        is_active: Set(is_active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Inserts a token record with a modern-encoded refresh token
#[allow(clippy::too_many_arguments)]
#[allow(dead_code)]
pub async fn insert_token(
    db: &DatabaseConnection,
    account_id: Uuid,
    access_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    refresh_token_plaintext: Option<&str>,
    scope: Option<&str>,
) -> Result<Uuid> {
    let (ciphertext, iv) = match refresh_token_plaintext {
        Some(plaintext) => {
            let (ct, iv) = test_cipher()
                .encrypt(plaintext.as_bytes())
                .expect("encryption succeeds");
            (Some(ct), Some(iv))
        }
        None => (None, None),
    };

    insert_token_raw(db, account_id, access_token, expires_at, ciphertext, iv, scope).await
}

/// Inserts a token record with raw refresh-token bytes (for legacy fixtures)
#[allow(clippy::too_many_arguments)]
#[allow(dead_code)]
pub async fn insert_token_raw(
    db: &DatabaseConnection,
    account_id: Uuid,
    access_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    refresh_token_ciphertext: Option<Vec<u8>>,
    encryption_iv: Option<Vec<u8>>,
    scope: Option<&str>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    oauth_token::ActiveModel {
        id: Set(id),
        account_id: Set(account_id),
        access_token: Set(access_token.map(str::to_string)),
        expires_at: Set(expires_at.map(Into::into)),
        refresh_token_ciphertext: Set(refresh_token_ciphertext),
        encryption_iv: Set(encryption_iv),
        scope: Set(scope.map(str::to_string)),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;
    Ok(id)
}

/// Inserts an encrypted provider app credentials row
#[allow(dead_code)]
pub async fn insert_app_credentials(
    db: &DatabaseConnection,
    environment: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<()> {
    let cipher = test_cipher();
    // Both ciphertexts of a row share one IV
    let (id_ct, iv) = cipher.encrypt(client_id.as_bytes()).expect("encrypts");
    let secret_ct = {
        use aes_gcm::{
            Aes256Gcm, Key, Nonce,
            aead::{Aead, KeyInit},
        };
        let key_bytes = test_key_bytes();
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Aes256Gcm::new(key)
            .encrypt(Nonce::from_slice(&iv), client_secret.as_bytes())
            .expect("encrypts")
    };

    let now = Utc::now();
    provider_app_credentials::ActiveModel {
        id: Set(Uuid::new_v4()),
        provider: Set("ebay".to_string()),
        environment: Set(environment.to_string()),
        client_id_ciphertext: Set(id_ct),
        client_secret_ciphertext: Set(secret_ct),
        encryption_iv: Set(iv),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Builds the legacy JSON encoding for a refresh token plaintext
#[allow(dead_code)]
pub fn legacy_refresh_token_json(plaintext: &str) -> Vec<u8> {
    let (ciphertext, iv) = test_cipher()
        .encrypt(plaintext.as_bytes())
        .expect("encryption succeeds");
    let (data, tag) = ciphertext.split_at(ciphertext.len() - 16);
    serde_json::to_vec(&serde_json::json!({
        "iv": hex::encode(iv),
        "data": hex::encode(data),
        "tag": hex::encode(tag),
    }))
    .expect("serializes")
}
