//! Legacy refresh-token encoding migration
//!
//! Early deployments stored the encrypted refresh token as a JSON document
//! with separate hex-encoded `iv`, `data` and `tag` fields and left the
//! `encryption_iv` column empty. The modern layout stores raw bytes with the
//! GCM tag appended to the ciphertext and the IV in its own column. This
//! module detects the old encoding and rewrites it in place.

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::TokenCipher;
use crate::models::oauth_token;

const LEGACY_IV_LEN: usize = 12;
const LEGACY_TAG_LEN: usize = 16;

/// A successfully re-encoded refresh token, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedToken {
    /// Ciphertext with the authentication tag appended
    pub refresh_token_ciphertext: Vec<u8>,
    /// IV for the `encryption_iv` column
    pub encryption_iv: Vec<u8>,
}

/// Reasons a record was left untouched.
///
/// Skipping is not an error for the caller: the health check proceeds as if
/// no migration had been attempted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationSkipped {
    #[error("record already uses the current encoding")]
    NotLegacy,
    #[error("legacy ciphertext failed verification")]
    Undecryptable,
}

/// Structural shape of the legacy encoding: three hex strings.
///
/// Detection deliberately deserializes into this struct instead of substring
/// sniffing; a modern ciphertext that merely contains the bytes `"iv"` can
/// never satisfy the typed parse plus the field-length checks below.
#[derive(Debug, Deserialize)]
struct LegacyCiphertext {
    iv: String,
    data: String,
    tag: String,
}

impl LegacyCiphertext {
    fn decode(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let iv = hex::decode(&self.iv).ok()?;
        let data = hex::decode(&self.data).ok()?;
        let tag = hex::decode(&self.tag).ok()?;

        if iv.len() != LEGACY_IV_LEN || tag.len() != LEGACY_TAG_LEN {
            return None;
        }

        // Modern layout expects data || tag as one buffer
        let mut ciphertext = data;
        ciphertext.extend_from_slice(&tag);
        Some((ciphertext, iv))
    }
}

/// Detect whether a token record still carries the legacy encoding
pub fn is_legacy_record(record: &oauth_token::Model) -> bool {
    if record
        .encryption_iv
        .as_ref()
        .is_some_and(|iv| !iv.is_empty())
    {
        return false;
    }

    record
        .refresh_token_ciphertext
        .as_ref()
        .and_then(|raw| serde_json::from_slice::<LegacyCiphertext>(raw).ok())
        .is_some_and(|legacy| legacy.decode().is_some())
}

/// Re-encode a legacy record into the modern layout.
///
/// The candidate ciphertext is trial-decrypted before it is reported as
/// migratable; a corrupt or partially-written legacy row is left untouched
/// rather than replaced with garbage.
pub fn migrate(
    cipher: &TokenCipher,
    record: &oauth_token::Model,
) -> Result<MigratedToken, MigrationSkipped> {
    if record
        .encryption_iv
        .as_ref()
        .is_some_and(|iv| !iv.is_empty())
    {
        return Err(MigrationSkipped::NotLegacy);
    }

    let raw = record
        .refresh_token_ciphertext
        .as_ref()
        .ok_or(MigrationSkipped::NotLegacy)?;

    let legacy: LegacyCiphertext =
        serde_json::from_slice(raw).map_err(|_| MigrationSkipped::NotLegacy)?;

    let (ciphertext, iv) = legacy.decode().ok_or(MigrationSkipped::NotLegacy)?;

    if cipher.decrypt(&ciphertext, &iv).is_err() {
        tracing::warn!(
            token_id = %record.id,
            account_id = %record.account_id,
            "Legacy refresh token failed verification, leaving record untouched"
        );
        return Err(MigrationSkipped::Undecryptable);
    }

    Ok(MigratedToken {
        refresh_token_ciphertext: ciphertext,
        encryption_iv: iv,
    })
}
