//! OAuth client credential resolution
//!
//! The refresh grant authenticates with the provider app's client id and
//! secret. Two sources are legitimate: an encrypted per-provider row in
//! `provider_app_credentials`, and an operator-configured plaintext pair for
//! deployments that never provisioned the encrypted row. The resolver tries
//! the encrypted row first and falls back, failing only when neither source
//! yields a complete pair.

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::TokenCipher;
use crate::models::provider_app_credentials;

/// A resolved OAuth client identity.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Credential resolution errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no OAuth client credentials resolvable for this provider")]
    Missing,
}

/// Resolves the OAuth client identity for one provider+environment.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    fallback_client_id: Option<String>,
    fallback_client_secret: Option<String>,
}

impl CredentialResolver {
    pub fn new(
        fallback_client_id: Option<String>,
        fallback_client_secret: Option<String>,
    ) -> Self {
        Self {
            fallback_client_id,
            fallback_client_secret,
        }
    }

    /// Resolve credentials from the encrypted row, then the operator fallback.
    ///
    /// A row that fails decryption is treated the same as an absent row; the
    /// failure is logged without ciphertext detail.
    pub fn resolve(
        &self,
        cipher: &TokenCipher,
        row: Option<&provider_app_credentials::Model>,
    ) -> Result<ClientCredentials, CredentialError> {
        if let Some(row) = row {
            match self.decrypt_row(cipher, row) {
                Some(credentials) => return Ok(credentials),
                None => {
                    tracing::warn!(
                        provider = %row.provider,
                        environment = %row.environment,
                        "Stored app credentials failed decryption, trying operator fallback"
                    );
                }
            }
        }

        self.fallback().ok_or(CredentialError::Missing)
    }

    fn decrypt_row(
        &self,
        cipher: &TokenCipher,
        row: &provider_app_credentials::Model,
    ) -> Option<ClientCredentials> {
        let client_id = cipher
            .decrypt_string(&row.client_id_ciphertext, &row.encryption_iv)
            .ok()?;
        let client_secret = cipher
            .decrypt_string(&row.client_secret_ciphertext, &row.encryption_iv)
            .ok()?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(ClientCredentials {
            client_id,
            client_secret,
        })
    }

    fn fallback(&self) -> Option<ClientCredentials> {
        let client_id = self.fallback_client_id.clone().filter(|s| !s.is_empty())?;
        let client_secret = self
            .fallback_client_secret
            .clone()
            .filter(|s| !s.is_empty())?;

        Some(ClientCredentials {
            client_id,
            client_secret,
        })
    }
}
