//! # Token Refresh
//!
//! Executes the OAuth2 refresh-token grant for a marketplace account and
//! persists the resulting token generation. Persistence is compare-and-swap
//! guarded and runs in a spawned task: once the provider has rotated a
//! refresh token, losing it would strand the account, so the write must
//! survive caller cancellation and concurrent invocations.

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::credentials::ClientCredentials;
use crate::crypto::TokenCipher;
use crate::marketplace::{Environment, MarketplaceClient, MarketplaceError};
use crate::models::{marketplace_account, oauth_token};
use crate::repositories::token::{CasOutcome, NewTokenSet};
use crate::repositories::TokenRepository;

/// Lifecycle state of a stored token generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Access token present and not yet expired
    Valid,
    /// Expired (or no usable access token) but a refresh token is stored
    Expired,
    /// Expired with no refresh token; only human re-consent can recover
    Unrecoverable,
}

/// Classify a token record at a point in time
pub fn token_state(record: &oauth_token::Model, now: DateTime<Utc>) -> TokenState {
    let access_valid = record.access_token.as_deref().is_some_and(|t| !t.is_empty())
        && record
            .expires_at
            .is_some_and(|expires_at| now < expires_at.with_timezone(&Utc));

    if access_valid {
        return TokenState::Valid;
    }

    if record
        .refresh_token_ciphertext
        .as_ref()
        .is_some_and(|ct| !ct.is_empty())
    {
        TokenState::Expired
    } else {
        TokenState::Unrecoverable
    }
}

/// Terminal refresh failures for one invocation.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No refresh token is stored; re-consent required
    #[error("no refresh token stored for this account")]
    Unrecoverable,
    /// The stored refresh token could not be decrypted.
    ///
    /// Deliberately carries no detail; the caller collapses this to a
    /// generic server error so nothing about key material or ciphertext
    /// structure leaks.
    #[error("stored refresh token could not be recovered")]
    Crypto,
    /// The provider rejected the grant; `code` is the provider's OAuth error
    #[error("provider rejected the refresh grant: {code}")]
    Grant { status: u16, code: String },
    /// The provider was unreachable or timed out
    #[error("provider unreachable during refresh: {0}")]
    Network(String),
    /// A concurrent invocation advanced the token row and its generation is
    /// unusable for this call; the caller may retry the health check
    #[error("concurrent refresh conflict")]
    Conflict,
    /// The persistence task failed
    #[error("failed to persist refreshed tokens")]
    Persistence(#[source] anyhow::Error),
}

/// Performs refresh grants and installs new token generations.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    repo: TokenRepository,
    cipher: TokenCipher,
    client: MarketplaceClient,
}

impl TokenRefresher {
    pub fn new(repo: TokenRepository, cipher: TokenCipher, client: MarketplaceClient) -> Self {
        Self {
            repo,
            cipher,
            client,
        }
    }

    /// Refresh the account's token generation and return the persisted record.
    ///
    /// The new generation is committed to the store before this function
    /// returns, so the refreshed access token is never used downstream ahead
    /// of its refresh token being durable.
    #[instrument(skip_all, fields(account_id = %account.id))]
    pub async fn refresh(
        &self,
        account: &marketplace_account::Model,
        environment: Environment,
        record: &oauth_token::Model,
        credentials: &ClientCredentials,
        ru_name: &str,
    ) -> Result<oauth_token::Model, RefreshError> {
        let refresh_start = std::time::Instant::now();
        counter!("marketplace_token_refresh_attempts_total").increment(1);

        let refresh_token = self.decrypt_refresh_token(record)?;

        let scope = record
            .scope
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.client.default_scope());

        let grant = self
            .client
            .refresh_grant(environment, credentials, &refresh_token, ru_name, scope)
            .await
            .map_err(|err| {
                counter!("marketplace_token_refresh_failure_total").increment(1);
                match err {
                    MarketplaceError::Grant { status, code } => {
                        RefreshError::Grant { status, code }
                    }
                    other => RefreshError::Network(other.to_string()),
                }
            })?;

        let expires_at = Utc::now() + Duration::seconds(grant.expires_in);

        // Some refresh responses omit the refresh token, meaning the old one
        // remains valid; only a rotated token is re-encrypted and persisted.
        let (refresh_token_ciphertext, encryption_iv) = match grant.refresh_token.as_deref() {
            Some(rotated) => {
                let (ciphertext, iv) = self
                    .cipher
                    .encrypt(rotated.as_bytes())
                    .map_err(|_| RefreshError::Crypto)?;
                (Some(ciphertext), Some(iv))
            }
            None => (None, None),
        };

        let new_tokens = NewTokenSet {
            access_token: grant.access_token,
            expires_at,
            refresh_token_ciphertext,
            encryption_iv,
        };

        // Persist inside a spawned task: a disconnecting caller must not be
        // able to drop the future between grant and commit.
        let repo = self.repo.clone();
        let observed = record.clone();
        let cas = tokio::spawn(async move { repo.persist_refreshed(&observed, &new_tokens).await })
            .await
            .map_err(|join_err| RefreshError::Persistence(anyhow::anyhow!(join_err)))?
            .map_err(RefreshError::Persistence)?;

        let current = self
            .repo
            .find_current(account.id)
            .await
            .map_err(RefreshError::Persistence)?
            .ok_or(RefreshError::Conflict)?;

        match cas {
            CasOutcome::Committed => {
                histogram!("marketplace_token_refresh_latency_ms")
                    .record(refresh_start.elapsed().as_secs_f64() * 1_000.0);
                counter!("marketplace_token_refresh_success_total").increment(1);
                info!(
                    account_id = %account.id,
                    environment = environment.as_str(),
                    "Refreshed marketplace token generation"
                );
                Ok(current)
            }
            CasOutcome::Lost => {
                // A concurrent invocation won the race. Providers may
                // invalidate a refresh token on first use, so the stored
                // generation wins; adopt it if it is usable.
                counter!("marketplace_token_refresh_conflict_total").increment(1);
                warn!(
                    account_id = %account.id,
                    "Concurrent refresh detected, adopting stored token generation"
                );
                if token_state(&current, Utc::now()) == TokenState::Valid {
                    Ok(current)
                } else {
                    Err(RefreshError::Conflict)
                }
            }
        }
    }

    fn decrypt_refresh_token(&self, record: &oauth_token::Model) -> Result<String, RefreshError> {
        let ciphertext = record
            .refresh_token_ciphertext
            .as_ref()
            .filter(|ct| !ct.is_empty())
            .ok_or(RefreshError::Unrecoverable)?;
        let iv = record
            .encryption_iv
            .as_ref()
            .filter(|iv| !iv.is_empty())
            .ok_or(RefreshError::Unrecoverable)?;

        self.cipher
            .decrypt_string(ciphertext, iv)
            .map_err(|_| RefreshError::Crypto)
    }
}
